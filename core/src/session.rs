//! Per-user application state: the auth session plus the favorites and market
//! list that hang off it. All mutations go through here so the in-memory view
//! is always re-read from the store after a write.

use anyhow::Result;
use tracing::{debug, warn};

use crate::auth::{Auth, OAuthConfig};
use crate::db::Database;
use crate::error::KobiriError;
use crate::market::{self, MergePlan, MergeReport};
use crate::models::{
    CategoryGroups, FavoriteRecipe, MarketListItem, NewFavorite, NewRecipe, Recipe, RecipeSource,
    RecipeSummary, Session, User, favorite_key, validate_new_recipe,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteToggle {
    Added(FavoriteRecipe),
    Removed(FavoriteRecipe),
}

impl FavoriteToggle {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Added(f) => format!("Added \"{}\" to your cookbook.", f.title),
            Self::Removed(f) => format!("Removed \"{}\" from your cookbook.", f.title),
        }
    }
}

pub struct AppSession {
    auth: Auth,
    favorites: Vec<FavoriteRecipe>,
    market_list: Vec<MarketListItem>,
    loading: bool,
}

impl AppSession {
    #[must_use]
    pub fn new(oauth: Option<OAuthConfig>) -> Self {
        Self {
            auth: Auth::new(oauth),
            favorites: Vec::new(),
            market_list: Vec::new(),
            loading: true,
        }
    }

    /// Resume `access_token` if given and load the user's data. Loading is
    /// finished afterwards whether or not a session was found.
    pub fn initialize(&mut self, db: &Database, access_token: Option<&str>) -> Result<()> {
        if let Some(token) = access_token {
            self.auth.restore(db, token)?;
        }
        self.reload(db)?;
        self.loading = false;
        Ok(())
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn auth_mut(&mut self) -> &mut Auth {
        &mut self.auth
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.auth.get_session()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user().is_some()
    }

    fn require_user(&self, action: &str) -> Result<String> {
        self.user()
            .map(|u| u.id.clone())
            .ok_or_else(|| KobiriError::NotSignedIn(action.to_string()).into())
    }

    // --- Auth ---

    pub fn sign_up(&mut self, db: &Database, email: &str, password: &str) -> Result<Session> {
        let session = self.auth.sign_up(db, email, password)?;
        self.reload(db)?;
        Ok(session)
    }

    pub fn sign_in_with_password(
        &mut self,
        db: &Database,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let session = self.auth.sign_in_with_password(db, email, password)?;
        self.reload(db)?;
        Ok(session)
    }

    pub fn sign_in_with_oauth(&self, provider: &str) -> Result<String> {
        self.auth.sign_in_with_oauth(provider)
    }

    pub fn sign_out(&mut self, db: &Database) -> Result<()> {
        self.auth.sign_out(db)?;
        self.favorites.clear();
        self.market_list.clear();
        Ok(())
    }

    /// Re-read favorites and the market list for the current user.
    pub fn reload(&mut self, db: &Database) -> Result<()> {
        match self.user().map(|u| u.id.clone()) {
            Some(user_id) => {
                self.favorites = db.list_favorites(&user_id)?;
                self.market_list = db.list_market_items(&user_id)?;
            }
            None => {
                self.favorites.clear();
                self.market_list.clear();
            }
        }
        Ok(())
    }

    // --- Favorites ---

    #[must_use]
    pub fn favorites(&self) -> &[FavoriteRecipe] {
        &self.favorites
    }

    #[must_use]
    pub fn is_favorite(&self, recipe_id: &str, source: RecipeSource) -> bool {
        let key = favorite_key(source, recipe_id);
        self.favorites.iter().any(|f| f.key() == key)
    }

    #[must_use]
    pub fn favorite(&self, recipe_id: &str, source: RecipeSource) -> Option<&FavoriteRecipe> {
        let key = favorite_key(source, recipe_id);
        self.favorites.iter().find(|f| f.key() == key)
    }

    pub fn toggle_favorite(&mut self, db: &Database, recipe: &RecipeSummary) -> Result<FavoriteToggle> {
        let user_id = self.require_user("save recipes")?;
        let toggle = if let Some(existing) = self.favorite(&recipe.id, recipe.source).cloned() {
            db.delete_favorite(&user_id, &existing.id)?;
            FavoriteToggle::Removed(existing)
        } else {
            let saved = db.insert_favorite(&user_id, &NewFavorite::from(recipe))?;
            FavoriteToggle::Added(saved)
        };
        self.favorites = db.list_favorites(&user_id)?;
        Ok(toggle)
    }

    // --- User recipes ---

    pub fn add_recipe(&self, db: &Database, recipe: &NewRecipe) -> Result<Recipe> {
        let user_id = self.require_user("add recipes")?;
        validate_new_recipe(recipe)?;
        db.insert_recipe(&user_id, recipe)
    }

    /// Keep generated recipes so they can be reopened and favorited later.
    pub fn remember_generated(&self, db: &Database, recipes: &[Recipe]) -> Result<()> {
        let Some(user) = self.user() else {
            debug!("not signed in, generated recipes are not cached");
            return Ok(());
        };
        for recipe in recipes {
            db.save_generated_recipe(&user.id, recipe)?;
        }
        Ok(())
    }

    // --- Market list ---

    #[must_use]
    pub fn market_list(&self) -> &[MarketListItem] {
        &self.market_list
    }

    #[must_use]
    pub fn is_recipe_on_list(&self, recipe_name: &str) -> bool {
        market::is_recipe_on_list(&self.market_list, recipe_name)
    }

    pub fn refresh_market_list(&mut self, db: &Database) -> Result<()> {
        let user_id = self.require_user("use the market list")?;
        self.market_list = db.list_market_items(&user_id)?;
        Ok(())
    }

    pub fn add_recipe_to_market_list(&mut self, db: &Database, recipe: &Recipe) -> Result<MergeReport> {
        let user_id = self.require_user("use the market list")?;
        // Merge against the stored list, not a possibly stale copy
        let current = db.list_market_items(&user_id)?;
        let plan = market::plan_recipe_merge(&current, recipe);
        let report = MergeReport {
            recipe_name: recipe.name.clone(),
            added: plan.inserts.len(),
            updated: plan.updates.len(),
        };
        let outcome = apply_plan(db, &user_id, &plan);
        self.market_list = db.list_market_items(&user_id)?;
        outcome?;
        Ok(report)
    }

    /// Add a typed-in item. Blank names are ignored and report `false`.
    pub fn add_manual_item(&mut self, db: &Database, name: &str) -> Result<bool> {
        let user_id = self.require_user("use the market list")?;
        let current = db.list_market_items(&user_id)?;
        let plan = market::plan_manual_item(&current, name);
        if plan.is_empty() {
            return Ok(false);
        }
        let outcome = apply_plan(db, &user_id, &plan);
        self.market_list = db.list_market_items(&user_id)?;
        outcome?;
        Ok(true)
    }

    /// Flip an item's checked flag. An item returning to the unchecked state
    /// folds into an existing unchecked item of the same name, if there is one.
    pub fn toggle_item_checked(&mut self, db: &Database, id: &str) -> Result<bool> {
        let user_id = self.require_user("use the market list")?;
        let Some(item) = db.get_market_item(&user_id, id)? else {
            return Ok(false);
        };

        if item.checked {
            let current = db.list_market_items(&user_id)?;
            if let Some(twin) = market::unchecked_twin(&current, &item) {
                let mut merged = twin.clone();
                market::fold_item(&mut merged, &item);
                db.update_market_item_merge(&merged)?;
                db.delete_market_item(&user_id, &item.id)?;
                debug!(item = %item.name, "folded unchecked item into existing entry");
                self.market_list = db.list_market_items(&user_id)?;
                return Ok(true);
            }
        }

        db.set_market_item_checked(&user_id, id, !item.checked)?;
        self.market_list = db.list_market_items(&user_id)?;
        Ok(true)
    }

    pub fn remove_item(&mut self, db: &Database, id: &str) -> Result<bool> {
        let user_id = self.require_user("use the market list")?;
        let removed = db.delete_market_item(&user_id, id)?;
        self.market_list = db.list_market_items(&user_id)?;
        Ok(removed)
    }

    pub fn clear_market_list(&mut self, db: &Database) -> Result<usize> {
        let user_id = self.require_user("use the market list")?;
        let removed = db.clear_market_items(&user_id)?;
        self.market_list.clear();
        Ok(removed)
    }

    /// Names to send to the organizer. Empty means there is nothing to organize.
    #[must_use]
    pub fn market_item_names(&self) -> Vec<String> {
        market::item_names(&self.market_list)
    }

    /// Store the organizer's answer in one transaction, then reload. A failed
    /// write leaves every category as it was.
    pub fn apply_categories(&mut self, db: &Database, groups: &CategoryGroups) -> Result<usize> {
        let user_id = self.require_user("use the market list")?;
        let current = db.list_market_items(&user_id)?;
        let assignments = market::assign_categories(&current, groups);
        let outcome = db.set_market_item_categories(&user_id, &assignments);
        self.market_list = db.list_market_items(&user_id)?;
        outcome
    }
}

/// Writes run one statement at a time; the first failure stops the rest.
fn apply_plan(db: &Database, user_id: &str, plan: &MergePlan) -> Result<()> {
    for item in &plan.updates {
        if !db.update_market_item_merge(item)? {
            warn!(item = %item.name, "market list item vanished before update");
        }
    }
    for new in &plan.inserts {
        db.insert_market_item(user_id, new)?;
    }
    Ok(())
}
