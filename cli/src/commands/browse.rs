use anyhow::Result;
use std::process;

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use crate::pages::home_page;
use kobiri_core::db::Database;
use kobiri_core::models::RecipeSource;
use kobiri_core::service;
use kobiri_core::session::AppSession;

use super::helpers::{print_category_table, print_recipe, print_recipe_table};
use super::load_recipe;

fn exit_empty(what: &str, json: bool) -> ! {
    if json {
        println!("[]");
    } else {
        eprintln!("{what}");
    }
    process::exit(2);
}

pub(crate) async fn cmd_home(
    db: &Database,
    session: &AppSession,
    mealdb: &MealDbClient,
    json: bool,
) -> Result<()> {
    let kobiri = service::visible_kobiri_recipes(db, session)?;
    let home = home_page(kobiri, mealdb).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&home)?);
        return Ok(());
    }

    println!("KOBIRI KITCHEN");
    print_recipe_table(&home.kobiri);
    println!("\nTASTES OF AFRICA");
    print_recipe_table(&home.african);
    println!("\nDISCOVER SOMETHING NEW");
    print_recipe_table(&home.random);
    println!("\nCATEGORIES");
    print_category_table(&home.categories);
    Ok(())
}

pub(crate) async fn cmd_categories(mealdb: &MealDbClient, json: bool) -> Result<()> {
    let categories = mealdb.categories().await;
    if categories.is_empty() {
        exit_empty("No categories found", json);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        print_category_table(&categories);
    }
    Ok(())
}

pub(crate) async fn cmd_category(mealdb: &MealDbClient, name: &str, json: bool) -> Result<()> {
    let recipes = mealdb.recipes_by_category(name).await;
    if recipes.is_empty() {
        exit_empty(&format!("No recipes found in '{name}'"), json);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
    } else {
        print_recipe_table(&recipes);
    }
    Ok(())
}

pub(crate) async fn cmd_search(mealdb: &MealDbClient, query: &str, json: bool) -> Result<()> {
    let recipes = mealdb.search(query).await;
    if recipes.is_empty() {
        exit_empty(&format!("No results found for '{query}'"), json);
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
    } else {
        print_recipe_table(&recipes);
    }
    Ok(())
}

pub(crate) async fn cmd_show(
    db: &Database,
    session: &AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    json: bool,
) -> Result<()> {
    let recipe = load_recipe(db, session, mealdb, gemini, source, id, json).await;
    let is_favorite = session.is_favorite(&recipe.id, recipe.source);

    if json {
        let on_list = session.is_recipe_on_list(&recipe.name);
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "recipe": recipe,
                "is_favorite": is_favorite,
                "on_market_list": on_list,
            }))?
        );
    } else {
        print_recipe(&recipe, is_favorite);
        if session.is_recipe_on_list(&recipe.name) {
            println!("\n  (ingredients are on your market list)");
        }
    }
    Ok(())
}
