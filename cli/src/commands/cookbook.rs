use anyhow::Result;
use std::process;

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use kobiri_core::db::Database;
use kobiri_core::error::KobiriError;
use kobiri_core::models::{RecipeSource, RecipeSummary};
use kobiri_core::service;
use kobiri_core::session::{AppSession, FavoriteToggle};

use super::helpers::print_recipe_table;
use super::load_recipe;

pub(crate) fn cmd_cookbook(db: &Database, session: &AppSession, json: bool) -> Result<()> {
    let book = service::cookbook(db, session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&book)?);
        return Ok(());
    }

    if book.user_creations.is_empty() && book.favorites.is_empty() {
        eprintln!("Your cookbook is empty. Save recipes with: kobiri favorite toggle <source> <id>");
        process::exit(2);
    }

    println!("MY CREATIONS");
    if book.user_creations.is_empty() {
        println!("  (none yet, add one with: kobiri recipe add)");
    } else {
        let creations: Vec<RecipeSummary> = book
            .user_creations
            .iter()
            .map(|r| RecipeSummary {
                recipe: None,
                ..r.summary()
            })
            .collect();
        print_recipe_table(&creations);
    }

    println!("\nFAVORITES");
    if book.favorites.is_empty() {
        println!("  (none yet)");
    } else {
        print_recipe_table(&book.favorites);
    }
    Ok(())
}

pub(crate) fn cmd_favorite_list(session: &AppSession, json: bool) -> Result<()> {
    let favorites = session.favorites();
    if favorites.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No favorites saved");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(favorites)?);
    } else {
        let rows: Vec<RecipeSummary> = favorites
            .iter()
            .map(|f| RecipeSummary::new(&f.recipe_id, &f.title, &f.image, f.source))
            .collect();
        print_recipe_table(&rows);
    }
    Ok(())
}

pub(crate) async fn cmd_favorite_toggle(
    db: &Database,
    session: &mut AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    json: bool,
) -> Result<()> {
    if !session.is_logged_in() {
        return Err(KobiriError::NotSignedIn("save recipes".to_string()).into());
    }
    // Removing needs only the stored key; adding needs the title and image.
    let summary = match session.favorite(id, source) {
        Some(f) => RecipeSummary::new(&f.recipe_id, &f.title, &f.image, f.source),
        None => load_recipe(db, session, mealdb, gemini, source, id, json)
            .await
            .summary(),
    };
    let toggle = session.toggle_favorite(db, &summary)?;

    if json {
        let (action, favorite) = match &toggle {
            FavoriteToggle::Added(f) => ("added", f),
            FavoriteToggle::Removed(f) => ("removed", f),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "action": action,
                "favorite": favorite,
            }))?
        );
    } else {
        println!("{}", toggle.message());
    }
    Ok(())
}
