mod account;
mod browse;
mod chef;
mod cookbook;
mod helpers;
mod list;
mod recipe;

use anyhow::Result;
use std::process;

use crate::config::Config;
use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use crate::pages;
use kobiri_core::db::Database;
use kobiri_core::models::{Recipe, RecipeSource};
use kobiri_core::service;
use kobiri_core::session::AppSession;

use helpers::json_error;

pub(crate) use account::{cmd_login, cmd_logout, cmd_oauth, cmd_signup, cmd_whoami};
pub(crate) use browse::{cmd_categories, cmd_category, cmd_home, cmd_search, cmd_show};
pub(crate) use chef::{cmd_chef_ask, cmd_chef_enhance, cmd_chef_generate};
pub(crate) use cookbook::{cmd_cookbook, cmd_favorite_list, cmd_favorite_toggle};
pub(crate) use list::{
    cmd_list_add, cmd_list_add_recipe, cmd_list_check, cmd_list_clear, cmd_list_organize,
    cmd_list_remove, cmd_list_show,
};
pub(crate) use recipe::{RecipeDraft, cmd_recipe_add};

/// Session for the CLI user, resumed from the saved token. A token the store
/// no longer knows is discarded.
pub(crate) fn open_session(db: &Database, config: &Config) -> Result<AppSession> {
    let token = config.load_session_token()?;
    let mut session = AppSession::new(config.oauth.clone());
    session.initialize(db, token.as_deref())?;
    if token.is_some() && !session.is_logged_in() {
        config.clear_session_token()?;
    }
    Ok(session)
}

/// Resolve a recipe or exit 2 with a not-found message.
pub(super) async fn load_recipe(
    db: &Database,
    session: &AppSession,
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    source: RecipeSource,
    id: &str,
    json: bool,
) -> Recipe {
    let found = pages::recipe_detail(mealdb, gemini, session, source, id, || {
        service::stored_recipe(db, session, source, id)
    })
    .await;
    if let Some(recipe) = found {
        return recipe;
    }
    let message = format!("Recipe {source}/{id} not found");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}
