use anyhow::Result;
use serde::Serialize;

use kobiri_core::models::{Category, Recipe, RecipeSource, RecipeSummary};
use kobiri_core::service;
use kobiri_core::session::AppSession;

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;

/// Full recipe for `/recipe/{source}/{id}`.
///
/// `stored` reads Kobiri and AI recipes from the local store and is only
/// called for those sources. A failed or empty lookup falls back to the
/// user's saved favorite, which is returned as is. Fetched recipes without
/// timings get AI estimates when the AI chef is configured.
pub async fn recipe_detail(
    mealdb: &MealDbClient,
    gemini: &GeminiClient,
    session: &AppSession,
    source: RecipeSource,
    id: &str,
    stored: impl FnOnce() -> Result<Option<Recipe>>,
) -> Option<Recipe> {
    let looked_up = match source {
        RecipeSource::TheMealDb => mealdb.recipe_details(id).await,
        RecipeSource::Kobiri | RecipeSource::Ai => stored(),
    };
    let fetched = matches!(looked_up, Ok(Some(_)));
    let mut recipe = service::resolve_detail(looked_up, source, id, session)?;
    if fetched && recipe.needs_time_estimate() && gemini.is_configured() {
        let estimate = gemini.estimate_times(&recipe).await;
        service::apply_time_estimate(&mut recipe, estimate);
    }
    Some(recipe)
}

#[derive(Serialize)]
pub struct HomePage {
    pub kobiri: Vec<RecipeSummary>,
    pub african: Vec<RecipeSummary>,
    pub random: Vec<RecipeSummary>,
    pub categories: Vec<Category>,
}

/// Everything the home page shows, with the lookups run concurrently.
pub async fn home_page(kobiri: Vec<Recipe>, mealdb: &MealDbClient) -> HomePage {
    let (random, african, categories) = tokio::join!(
        mealdb.random_recipes(),
        mealdb.african_recipes(),
        mealdb.categories()
    );
    HomePage {
        kobiri: kobiri.iter().map(summary_without_body).collect(),
        african,
        random,
        categories,
    }
}

fn summary_without_body(recipe: &Recipe) -> RecipeSummary {
    RecipeSummary {
        recipe: None,
        ..recipe.summary()
    }
}
