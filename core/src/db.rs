use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{
    Difficulty, FavoriteRecipe, MarketListItem, NewFavorite, NewMarketListItem, NewRecipe, Recipe,
    RecipeSource, Session, User, placeholder_image_url, renumber_instructions,
};

/// Stored credentials for one account.
pub struct UserCredentials {
    pub user: User,
    /// PHC-format PBKDF2 string; carries its own salt and iteration count.
    pub password_hash: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id TEXT PRIMARY KEY,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    access_token TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS favorites (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    recipe_id TEXT NOT NULL,
                    source TEXT NOT NULL,
                    title TEXT NOT NULL,
                    image TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    UNIQUE (user_id, source, recipe_id)
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    image_url TEXT NOT NULL,
                    prep_time TEXT,
                    cook_time TEXT,
                    servings TEXT,
                    difficulty TEXT NOT NULL DEFAULT 'Medium',
                    category TEXT,
                    ingredients TEXT NOT NULL,
                    instructions TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS market_list_items (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    amount TEXT NOT NULL DEFAULT '',
                    checked INTEGER NOT NULL DEFAULT 0,
                    from_recipe TEXT,
                    category TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);
                CREATE INDEX IF NOT EXISTS idx_recipes_user ON recipes(user_id);
                CREATE INDEX IF NOT EXISTS idx_market_list_user ON market_list_items(user_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS generated_recipes (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    payload TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    fn favorite_from_row(row: &rusqlite::Row) -> rusqlite::Result<FavoriteRecipe> {
        let source: String = row.get(3)?;
        Ok(FavoriteRecipe {
            id: row.get(0)?,
            user_id: row.get(1)?,
            recipe_id: row.get(2)?,
            source: parse_column(3, &source)?,
            title: row.get(4)?,
            image: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn market_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<MarketListItem> {
        Ok(MarketListItem {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            amount: row.get(3)?,
            checked: row.get(4)?,
            from_recipe: row.get(5)?,
            category: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    // Expects columns:
    // 0: id, 1: name, 2: description, 3: image_url, 4: prep_time, 5: cook_time,
    // 6: servings, 7: difficulty, 8: category, 9: ingredients, 10: instructions
    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        let difficulty: String = row.get(7)?;
        let ingredients: String = row.get(9)?;
        let instructions: String = row.get(10)?;
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            image_url: row.get(3)?,
            prep_time: row.get(4)?,
            cook_time: row.get(5)?,
            servings: row.get(6)?,
            difficulty: Some(parse_column(7, &difficulty)?),
            category: row.get(8)?,
            ingredients: json_column(9, &ingredients)?,
            instructions: json_column(10, &instructions)?,
            source: RecipeSource::Kobiri,
            is_curated: Some(true),
        })
    }

    // --- Users & sessions ---

    pub fn insert_user(&self, email: &str, password_hash: &str) -> Result<User> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, email, password_hash, now],
        )?;
        self.get_user(&id)
    }

    pub fn get_user(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, email, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .context("User not found")
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_credentials(&self, email: &str) -> Result<Option<UserCredentials>> {
        let creds = self
            .conn
            .query_row(
                "SELECT id, email, created_at, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserCredentials {
                        user: Self::user_from_row(row)?,
                        password_hash: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(creds)
    }

    pub fn insert_session(&self, user: &User) -> Result<Session> {
        let now = Local::now().to_rfc3339();
        let token = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO sessions (access_token, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![token, user.id, now],
        )?;
        Ok(Session {
            access_token: token,
            user: user.clone(),
            created_at: now,
        })
    }

    pub fn get_session(&self, access_token: &str) -> Result<Option<Session>> {
        let session = self
            .conn
            .query_row(
                "SELECT s.access_token, s.created_at, u.id, u.email, u.created_at
                 FROM sessions s JOIN users u ON s.user_id = u.id
                 WHERE s.access_token = ?1",
                params![access_token],
                |row| {
                    Ok(Session {
                        access_token: row.get(0)?,
                        created_at: row.get(1)?,
                        user: User {
                            id: row.get(2)?,
                            email: row.get(3)?,
                            created_at: row.get(4)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, access_token: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sessions WHERE access_token = ?1",
            params![access_token],
        )?;
        Ok(rows > 0)
    }

    // --- Favorites ---

    pub fn insert_favorite(&self, user_id: &str, favorite: &NewFavorite) -> Result<FavoriteRecipe> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO favorites (id, user_id, recipe_id, source, title, image, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                user_id,
                favorite.recipe_id,
                favorite.source.as_str(),
                favorite.title,
                favorite.image,
                now,
            ],
        )?;
        self.conn
            .query_row(
                "SELECT id, user_id, recipe_id, source, title, image, created_at
                 FROM favorites WHERE id = ?1",
                params![id],
                Self::favorite_from_row,
            )
            .context("Favorite not found")
    }

    pub fn delete_favorite(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM favorites WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Favorites in the order they were saved.
    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteRecipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, recipe_id, source, title, image, created_at
             FROM favorites WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let favorites = stmt
            .query_map(params![user_id], Self::favorite_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    // --- User recipes ---

    pub fn insert_recipe(&self, user_id: &str, recipe: &NewRecipe) -> Result<Recipe> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        let name = recipe.name.trim();
        let mut instructions = recipe.instructions.clone();
        renumber_instructions(&mut instructions);
        let difficulty = recipe.difficulty.unwrap_or(Difficulty::Medium);
        self.conn.execute(
            "INSERT INTO recipes (id, user_id, name, description, image_url, prep_time, cook_time,
                                  servings, difficulty, category, ingredients, instructions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                id,
                user_id,
                name,
                recipe.description,
                placeholder_image_url(name),
                recipe.prep_time,
                recipe.cook_time,
                recipe.servings,
                difficulty.to_string(),
                recipe.category,
                serde_json::to_string(&recipe.ingredients)?,
                serde_json::to_string(&instructions)?,
                now,
            ],
        )?;
        self.get_recipe(user_id, &id)?.context("Recipe not found")
    }

    /// Only the owner can read a user recipe.
    pub fn get_recipe(&self, user_id: &str, id: &str) -> Result<Option<Recipe>> {
        let recipe = self
            .conn
            .query_row(
                "SELECT id, name, description, image_url, prep_time, cook_time, servings,
                        difficulty, category, ingredients, instructions
                 FROM recipes WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::recipe_from_row,
            )
            .optional()?;
        Ok(recipe)
    }

    /// Newest first.
    pub fn list_user_recipes(&self, user_id: &str) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, image_url, prep_time, cook_time, servings,
                    difficulty, category, ingredients, instructions
             FROM recipes WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let recipes = stmt
            .query_map(params![user_id], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    // --- Market list ---

    pub fn insert_market_item(
        &self,
        user_id: &str,
        item: &NewMarketListItem,
    ) -> Result<MarketListItem> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO market_list_items (id, user_id, name, amount, checked, from_recipe, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                user_id,
                item.name,
                item.amount,
                item.checked,
                item.from_recipe,
                item.category,
                now,
            ],
        )?;
        self.get_market_item(user_id, &id)?
            .context("Market list item not found")
    }

    pub fn get_market_item(&self, user_id: &str, id: &str) -> Result<Option<MarketListItem>> {
        let item = self
            .conn
            .query_row(
                "SELECT id, user_id, name, amount, checked, from_recipe, category, created_at
                 FROM market_list_items WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::market_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Items in insertion order.
    pub fn list_market_items(&self, user_id: &str) -> Result<Vec<MarketListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, amount, checked, from_recipe, category, created_at
             FROM market_list_items WHERE user_id = ?1 ORDER BY created_at, rowid",
        )?;
        let items = stmt
            .query_map(params![user_id], Self::market_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Write back amount and provenance after a merge.
    pub fn update_market_item_merge(&self, item: &MarketListItem) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE market_list_items SET amount = ?1, from_recipe = ?2 WHERE id = ?3 AND user_id = ?4",
            params![item.amount, item.from_recipe, item.id, item.user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_market_item_checked(&self, user_id: &str, id: &str, checked: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE market_list_items SET checked = ?1 WHERE id = ?2 AND user_id = ?3",
            params![checked, id, user_id],
        )?;
        Ok(rows > 0)
    }

    /// Apply `(item id, category)` pairs in one transaction. Returns how many
    /// of the user's items were updated.
    pub fn set_market_item_categories(
        &self,
        user_id: &str,
        assignments: &[(String, String)],
    ) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE market_list_items SET category = ?1 WHERE id = ?2 AND user_id = ?3",
            )?;
            for (id, category) in assignments {
                updated += stmt.execute(params![category, id, user_id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    pub fn delete_market_item(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM market_list_items WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn clear_market_items(&self, user_id: &str) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM market_list_items WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(rows)
    }

    // --- Generated recipes ---

    pub fn save_generated_recipe(&self, user_id: &str, recipe: &Recipe) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO generated_recipes (id, user_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![recipe.id, user_id, serde_json::to_string(recipe)?, now],
        )?;
        Ok(())
    }

    pub fn get_generated_recipe(&self, user_id: &str, id: &str) -> Result<Option<Recipe>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM generated_recipes WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).context("Corrupt generated recipe"))
            .transpose()
    }
}

fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value.parse().map_err(|e: anyhow::Error| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn json_column<T: serde::de::DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
