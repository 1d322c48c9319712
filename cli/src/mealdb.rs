use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use kobiri_core::mealdb::{
    AFRICAN_AREAS, AREA_SAMPLE_SIZE, CategoriesResponse, Meal, MealsResponse, RANDOM_SAMPLE_SIZE,
    category_from_wire, dedup_meals, fallback_african_recipes, fallback_categories,
    fallback_recipe_details, fallback_recipes, fallback_recipes_for_category, fallback_search,
    meal_to_area_summary, meal_to_recipe, meal_to_summary,
};
use kobiri_core::models::{Category, Recipe, RecipeSummary};

/// `TheMealDB` client. Listing calls fall back to bundled data when the API
/// cannot be reached.
#[derive(Clone)]
pub struct MealDbClient {
    client: reqwest::Client,
    base_url: String,
}

impl MealDbClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "kobiri/{} (recipe cookbook)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, ?query, "TheMealDB request");
        self.client
            .get(&url)
            .query(query)
            .send()
            .await
            .context("Failed to reach TheMealDB")?
            .error_for_status()
            .context("TheMealDB returned an error")?
            .json()
            .await
            .with_context(|| format!("Failed to parse TheMealDB {endpoint} response"))
    }

    async fn meals(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<Meal>> {
        let data: MealsResponse = self.get(endpoint, query).await?;
        Ok(data.meals.unwrap_or_default())
    }

    pub async fn categories(&self) -> Vec<Category> {
        match self.get::<CategoriesResponse>("categories.php", &[]).await {
            Ok(data) => data
                .categories
                .unwrap_or_default()
                .into_iter()
                .map(category_from_wire)
                .collect(),
            Err(e) => {
                warn!("using fallback categories: {e:#}");
                fallback_categories()
            }
        }
    }

    pub async fn recipes_by_category(&self, category: &str) -> Vec<RecipeSummary> {
        match self.meals("filter.php", &[("c", category)]).await {
            Ok(meals) => meals.iter().map(meal_to_summary).collect(),
            Err(e) => {
                warn!(category, "using fallback recipes: {e:#}");
                fallback_recipes_for_category(category)
            }
        }
    }

    /// Meals from one cuisine, tagged with the area as their category.
    pub async fn recipes_by_area(&self, area: &str) -> Result<Vec<RecipeSummary>> {
        let meals = self.meals("filter.php", &[("a", area)]).await?;
        Ok(meals.iter().map(|m| meal_to_area_summary(m, area)).collect())
    }

    pub async fn search(&self, query: &str) -> Vec<RecipeSummary> {
        match self.meals("search.php", &[("s", query)]).await {
            Ok(meals) => meals.iter().map(meal_to_summary).collect(),
            Err(e) => {
                warn!(query, "using fallback search: {e:#}");
                fallback_search(query)
            }
        }
    }

    /// A handful of random meals fetched concurrently, without repeats.
    pub async fn random_recipes(&self) -> Vec<RecipeSummary> {
        let mut tasks = JoinSet::new();
        for _ in 0..RANDOM_SAMPLE_SIZE {
            let client = self.clone();
            tasks.spawn(async move { client.meals("random.php", &[]).await });
        }

        let mut meals = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined.context("random recipe task panicked").and_then(|r| r) {
                Ok(batch) => meals.extend(batch),
                Err(e) => {
                    warn!("using fallback recipes: {e:#}");
                    return fallback_recipes();
                }
            }
        }
        dedup_meals(meals).iter().map(meal_to_summary).collect()
    }

    /// A few meals from each African area, tagged with the area and shuffled.
    pub async fn african_recipes(&self) -> Vec<RecipeSummary> {
        let mut tasks = JoinSet::new();
        for &area in AFRICAN_AREAS {
            let client = self.clone();
            tasks.spawn(async move {
                let mut recipes = client.recipes_by_area(area).await?;
                recipes.truncate(AREA_SAMPLE_SIZE);
                Ok::<_, anyhow::Error>(recipes)
            });
        }

        let mut recipes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined.context("area lookup task panicked").and_then(|r| r) {
                Ok(batch) => recipes.extend(batch),
                Err(e) => {
                    warn!("using fallback African recipes: {e:#}");
                    return fallback_african_recipes();
                }
            }
        }
        if recipes.is_empty() {
            return fallback_african_recipes();
        }
        recipes.shuffle(&mut rand::rng());
        recipes
    }

    /// Full recipe by id. When the API is unreachable only the bundled recipe
    /// can be served; other ids return the error.
    pub async fn recipe_details(&self, id: &str) -> Result<Option<Recipe>> {
        match self.meals("lookup.php", &[("i", id)]).await {
            Ok(meals) => Ok(meals.first().map(meal_to_recipe)),
            Err(e) => match fallback_recipe_details(id) {
                Some(recipe) => {
                    warn!(id, "using fallback recipe details: {e:#}");
                    Ok(Some(recipe))
                }
                None => Err(e),
            },
        }
    }
}
