use anyhow::{Result, bail};
use std::process;

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use kobiri_core::db::Database;
use kobiri_core::gemini::generated_summaries;
use kobiri_core::models::{Recipe, RecipeSource};
use kobiri_core::session::AppSession;

use super::helpers::{print_recipe, print_recipe_table};
use super::load_recipe;

fn step_text(recipe: &Recipe, step: u32) -> Result<&str> {
    match recipe.instructions.iter().find(|i| i.step == step) {
        Some(inst) => Ok(&inst.description),
        None => bail!(
            "\"{}\" has no step {step} (it has {} step(s))",
            recipe.name,
            recipe.instructions.len()
        ),
    }
}

pub(crate) async fn cmd_chef_generate(
    db: &Database,
    session: &AppSession,
    gemini: &GeminiClient,
    ingredients: &str,
    json: bool,
) -> Result<()> {
    if ingredients.trim().is_empty() {
        bail!("List a few ingredients, e.g. \"rice, eggs, spring onions\"");
    }
    let recipes = gemini.generate_recipes(ingredients).await?;
    session.remember_generated(db, &recipes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&generated_summaries(&recipes))?);
        return Ok(());
    }

    for recipe in &recipes {
        print_recipe(recipe, false);
        println!();
    }
    print_recipe_table(&generated_summaries(&recipes));
    if session.is_logged_in() {
        println!("Open one again with: kobiri show ai <id>");
    } else {
        eprintln!("Sign in to keep generated recipes for later.");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_chef_ask(
    db: &Database,
    session: &AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    step: u32,
    question: &str,
    json: bool,
) -> Result<()> {
    let recipe = load_recipe(db, session, mealdb, gemini, source, id, json).await;
    let current = step_text(&recipe, step).unwrap_or_default();
    let answer = gemini.cooking_assistant(&recipe.name, current, question).await?;

    if json {
        println!("{}", serde_json::json!({ "question": question, "answer": answer }));
    } else {
        println!("{answer}");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_chef_enhance(
    db: &Database,
    session: &AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    step: u32,
    json: bool,
) -> Result<()> {
    let recipe = load_recipe(db, session, mealdb, gemini, source, id, json).await;
    let instruction = match step_text(&recipe, step) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{e}");
            process::exit(2);
        }
    };
    let enhanced = gemini.enhance_instruction(&recipe.name, instruction).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "step": step, "instruction": instruction, "enhanced": enhanced })
        );
    } else {
        println!("Step {step}: {instruction}\n");
        println!("{enhanced}");
    }
    Ok(())
}
