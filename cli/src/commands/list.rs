use anyhow::Result;
use std::process;

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use kobiri_core::db::Database;
use kobiri_core::models::RecipeSource;
use kobiri_core::session::AppSession;

use super::helpers::{json_error, print_market_list};
use super::load_recipe;

fn exit_missing_item(id: &str, json: bool) -> ! {
    let message = format!("No market list item with id '{id}'");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn cmd_list_show(db: &Database, session: &mut AppSession, json: bool) -> Result<()> {
    session.refresh_market_list(db)?;
    let items = session.market_list();

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("Your market list is empty");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        print_market_list(items);
        let open = items.iter().filter(|i| !i.checked).count();
        println!("{open} of {} item(s) still to buy", items.len());
    }
    Ok(())
}

pub(crate) fn cmd_list_add(db: &Database, session: &mut AppSession, name: &str, json: bool) -> Result<()> {
    let added = session.add_manual_item(db, name)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.market_list())?);
    } else if added {
        println!("Added {} to your market list", name.trim());
    } else {
        eprintln!("Nothing to add");
    }
    Ok(())
}

pub(crate) async fn cmd_list_add_recipe(
    db: &Database,
    session: &mut AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    json: bool,
) -> Result<()> {
    session.refresh_market_list(db)?;
    let recipe = load_recipe(db, session, mealdb, gemini, source, id, json).await;
    let report = session.add_recipe_to_market_list(db, &recipe)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "report": report,
                "items": session.market_list(),
            }))?
        );
    } else {
        println!("{}", report.message());
    }
    Ok(())
}

pub(crate) fn cmd_list_check(db: &Database, session: &mut AppSession, id: &str, json: bool) -> Result<()> {
    if !session.toggle_item_checked(db, id)? {
        exit_missing_item(id, json);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(session.market_list())?);
    } else {
        match session.market_list().iter().find(|i| i.id == id) {
            Some(item) if item.checked => println!("Checked off {}", item.name),
            Some(item) => println!("Unchecked {}", item.name),
            None => println!("Item merged back into your list"),
        }
    }
    Ok(())
}

pub(crate) fn cmd_list_remove(db: &Database, session: &mut AppSession, id: &str, json: bool) -> Result<()> {
    if !session.remove_item(db, id)? {
        exit_missing_item(id, json);
    }
    if json {
        println!("{}", serde_json::json!({ "removed": id }));
    } else {
        println!("Removed item {id}");
    }
    Ok(())
}

pub(crate) fn cmd_list_clear(db: &Database, session: &mut AppSession, json: bool) -> Result<()> {
    let removed = session.clear_market_list(db)?;
    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Cleared {removed} item(s) from your market list");
    }
    Ok(())
}

/// Ask the AI chef to group the list, then store each item's category.
pub(crate) async fn cmd_list_organize(
    db: &Database,
    session: &mut AppSession,
    gemini: &GeminiClient,
    json: bool,
) -> Result<()> {
    session.refresh_market_list(db)?;
    let names = session.market_item_names();
    if names.is_empty() {
        if json {
            println!("{}", json_error("Your market list is empty"));
        } else {
            eprintln!("Your market list is empty, nothing to organize");
        }
        process::exit(2);
    }

    let groups = gemini.organize_shopping_list(&names).await?;
    let updated = session.apply_categories(db, &groups)?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.market_list())?);
    } else {
        print_market_list(session.market_list());
        println!("Organized {updated} item(s) into {} categories", groups.0.len());
    }
    Ok(())
}
