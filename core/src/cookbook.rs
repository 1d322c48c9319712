use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::curated;
use crate::models::{FavoriteRecipe, Recipe, RecipeSource, RecipeSummary};

/// What the cookbook page shows: the user's own recipes and their saved favorites.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cookbook {
    pub user_creations: Vec<Recipe>,
    pub favorites: Vec<RecipeSummary>,
}

/// `all_kobiri` is every Kobiri recipe visible to the user, their own first and
/// the curated set after. Favorites keep their saved order; repeats of the same
/// `SOURCE-id` key are dropped.
#[must_use]
pub fn build_cookbook(all_kobiri: &[Recipe], favorites: &[FavoriteRecipe]) -> Cookbook {
    let by_id: HashMap<&str, &Recipe> = all_kobiri.iter().map(|r| (r.id.as_str(), r)).collect();

    let mut seen = HashSet::new();
    let mut summaries = Vec::new();
    for fav in favorites {
        if !seen.insert(fav.key()) {
            continue;
        }
        let summary = match (fav.source, by_id.get(fav.recipe_id.as_str())) {
            (RecipeSource::Kobiri, Some(recipe)) => RecipeSummary {
                id: fav.recipe_id.clone(),
                title: recipe.name.clone(),
                image: recipe.image_url.clone(),
                source: RecipeSource::Kobiri,
                is_curated: recipe.is_curated,
                category: recipe.category.clone(),
                recipe: Some(Box::new((*recipe).clone())),
            },
            _ => RecipeSummary::new(&fav.recipe_id, &fav.title, &fav.image, fav.source),
        };
        summaries.push(summary);
    }

    Cookbook {
        user_creations: all_kobiri
            .iter()
            .filter(|r| !curated::is_curated_id(&r.id))
            .cloned()
            .collect(),
        favorites: summaries,
    }
}

/// User recipes first, then the curated collection.
#[must_use]
pub fn all_kobiri_recipes(user_recipes: Vec<Recipe>) -> Vec<Recipe> {
    let mut all = user_recipes;
    all.extend(curated::curated_recipes().iter().cloned());
    all
}
