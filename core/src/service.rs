//! Recipe catalog queries that combine the curated set, the store and the
//! signed-in session.

use anyhow::Result;
use tracing::warn;

use crate::cookbook::{self, Cookbook};
use crate::curated;
use crate::db::Database;
use crate::error::KobiriError;
use crate::models::{Recipe, RecipeSource, TimeEstimate};
use crate::session::AppSession;

/// A Kobiri recipe by id: the curated set first, then the signed-in user's
/// own recipes. Anonymous callers only see curated ones.
pub fn kobiri_recipe(db: &Database, session: &AppSession, id: &str) -> Result<Option<Recipe>> {
    if let Some(recipe) = curated::curated_recipe(id) {
        return Ok(Some(recipe.clone()));
    }
    match session.user() {
        Some(user) => db.get_recipe(&user.id, id),
        None => Ok(None),
    }
}

/// Every Kobiri recipe the session can see: the user's own, then curated.
pub fn visible_kobiri_recipes(db: &Database, session: &AppSession) -> Result<Vec<Recipe>> {
    let own = match session.user() {
        Some(user) => db.list_user_recipes(&user.id)?,
        None => Vec::new(),
    };
    Ok(cookbook::all_kobiri_recipes(own))
}

pub fn cookbook(db: &Database, session: &AppSession) -> Result<Cookbook> {
    if !session.is_logged_in() {
        return Err(KobiriError::NotSignedIn("view your cookbook".to_string()).into());
    }
    let all = visible_kobiri_recipes(db, session)?;
    Ok(cookbook::build_cookbook(&all, session.favorites()))
}

/// Recipes held locally and visible to the session. `TheMealDB` recipes live
/// behind the lookup API and always return `None` here.
pub fn stored_recipe(
    db: &Database,
    session: &AppSession,
    source: RecipeSource,
    id: &str,
) -> Result<Option<Recipe>> {
    match source {
        RecipeSource::Kobiri => kobiri_recipe(db, session, id),
        RecipeSource::Ai => match session.user() {
            Some(user) => db.get_generated_recipe(&user.id, id),
            None => Ok(None),
        },
        RecipeSource::TheMealDb => Ok(None),
    }
}

/// Settle a detail lookup. A miss or a failure falls back to a minimal recipe
/// built from the user's saved favorite, if there is one.
pub fn resolve_detail(
    looked_up: Result<Option<Recipe>>,
    source: RecipeSource,
    id: &str,
    session: &AppSession,
) -> Option<Recipe> {
    match looked_up {
        Ok(Some(recipe)) => return Some(recipe),
        Ok(None) => {}
        Err(e) => warn!(%source, id, "recipe lookup failed: {e:#}"),
    }
    let fav = session
        .favorite(id, source)
        .filter(|f| !f.title.trim().is_empty())?;
    Some(Recipe::minimal(id, source, &fav.title, Some(&fav.image)))
}

pub fn apply_time_estimate(recipe: &mut Recipe, estimate: TimeEstimate) {
    recipe.prep_time = Some(estimate.prep_time);
    recipe.cook_time = Some(estimate.cook_time);
}
