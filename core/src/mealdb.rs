//! TheMealDB wire format, transforms into app models, and the offline fallback
//! datasets served when the API cannot be reached.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    Category, Difficulty, Recipe, RecipeIngredient, RecipeInstruction, RecipeSource, RecipeSummary,
};

pub const DEFAULT_BASE_URL: &str = "https://www.themealdb.com/api/json/v1/1";

/// Areas browsed for the "African" home section.
pub const AFRICAN_AREAS: &[&str] = &["Nigerian", "Moroccan", "Kenyan", "Egyptian", "Tunisian"];

/// Meals taken from each African area.
pub const AREA_SAMPLE_SIZE: usize = 4;

/// Concurrent `random.php` calls for the home page.
pub const RANDOM_SAMPLE_SIZE: usize = 8;

const MAX_INGREDIENTS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct MealsResponse {
    pub meals: Option<Vec<Meal>>,
}

#[derive(Debug, Deserialize)]
pub struct CategoriesResponse {
    pub categories: Option<Vec<MealCategory>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCategory {
    pub id_category: String,
    pub str_category: String,
    #[serde(default)]
    pub str_category_thumb: String,
    #[serde(default)]
    pub str_category_description: String,
}

/// One meal. Filter endpoints return only id, name and thumbnail; lookup,
/// search and random return everything, including the numbered
/// `strIngredientN`/`strMeasureN` pairs captured in `extra`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id_meal: String,
    pub str_meal: String,
    #[serde(default)]
    pub str_meal_thumb: Option<String>,
    #[serde(default)]
    pub str_category: Option<String>,
    #[serde(default)]
    pub str_area: Option<String>,
    #[serde(default)]
    pub str_instructions: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Meal {
    fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

#[must_use]
pub fn meal_to_summary(meal: &Meal) -> RecipeSummary {
    RecipeSummary::new(
        &meal.id_meal,
        &meal.str_meal,
        meal.str_meal_thumb.as_deref().unwrap_or_default(),
        RecipeSource::TheMealDb,
    )
}

/// Summary for the African section: curated, categorized by area.
#[must_use]
pub fn meal_to_area_summary(meal: &Meal, area: &str) -> RecipeSummary {
    RecipeSummary {
        is_curated: Some(true),
        category: Some(area.to_string()),
        ..meal_to_summary(meal)
    }
}

#[must_use]
pub fn meal_to_recipe(meal: &Meal) -> Recipe {
    let ingredients = (1..=MAX_INGREDIENTS)
        .filter_map(|i| {
            let name = meal
                .extra_str(&format!("strIngredient{i}"))
                .filter(|n| !n.trim().is_empty())?;
            let amount = meal.extra_str(&format!("strMeasure{i}")).unwrap_or_default();
            Some(RecipeIngredient::new(name, amount))
        })
        .collect();

    let instructions = split_instructions(meal.str_instructions.as_deref().unwrap_or_default());
    let category = meal.str_category.clone().unwrap_or_default();
    let area = meal.str_area.as_deref().unwrap_or_default();

    Recipe {
        id: meal.id_meal.clone(),
        name: meal.str_meal.clone(),
        description: format!("A delicious {category} dish from {area} cuisine."),
        image_url: meal.str_meal_thumb.clone().unwrap_or_default(),
        prep_time: Some("N/A".to_string()),
        cook_time: Some("N/A".to_string()),
        servings: Some("1".to_string()),
        difficulty: Some(Difficulty::Medium),
        category: Some(category),
        ingredients,
        instructions,
        source: RecipeSource::TheMealDb,
        is_curated: Some(false),
    }
}

/// One step per non-blank line, numbered from 1.
#[must_use]
pub fn split_instructions(text: &str) -> Vec<RecipeInstruction> {
    (1..)
        .zip(text.lines().map(str::trim).filter(|l| !l.is_empty()))
        .map(|(step, line)| RecipeInstruction {
            step,
            description: line.to_string(),
        })
        .collect()
}

#[must_use]
pub fn category_from_wire(cat: MealCategory) -> Category {
    Category {
        id: cat.id_category,
        name: cat.str_category,
        thumbnail: cat.str_category_thumb,
        description: cat.str_category_description,
    }
}

// --- Fallback datasets ---

const IMG: &str = "https://www.themealdb.com/images/media/meals";

fn summary(id: &str, title: &str, image_file: &str) -> RecipeSummary {
    RecipeSummary::new(id, title, &format!("{IMG}/{image_file}"), RecipeSource::TheMealDb)
}

#[must_use]
pub fn fallback_categories() -> Vec<Category> {
    [
        ("1", "Beef", "beef", "Beef dishes"),
        ("2", "Chicken", "chicken", "Chicken dishes"),
        ("3", "Dessert", "dessert", "Desserts"),
        ("4", "Pasta", "pasta", "Pasta dishes"),
        ("5", "Seafood", "seafood", "Seafood dishes"),
    ]
    .into_iter()
    .map(|(id, name, slug, description)| Category {
        id: id.to_string(),
        name: name.to_string(),
        thumbnail: format!("https://www.themealdb.com/images/category/{slug}.png"),
        description: description.to_string(),
    })
    .collect()
}

#[must_use]
pub fn fallback_recipes() -> Vec<RecipeSummary> {
    vec![
        summary("52874", "Beef and Mustard Pie", "sytuqu1511553755.jpg"),
        summary("52878", "Beef and Oyster Pie", "wrssvt1511556563.jpg"),
        summary("52997", "Beef Dumpling Stew", "uyqrrv1511553350.jpg"),
        summary("52904", "Beef Bourguignon", "vtqxtu1511784197.jpg"),
    ]
}

/// Static list for a known category, otherwise the generic list.
#[must_use]
pub fn fallback_recipes_for_category(category: &str) -> Vec<RecipeSummary> {
    match category {
        "Beef" => vec![
            summary("52874", "Beef and Mustard Pie", "sytuqu1511553755.jpg"),
            summary("52878", "Beef and Oyster Pie", "wrssvt1511556563.jpg"),
            summary("52997", "Beef Dumpling Stew", "uyqrrv1511553350.jpg"),
        ],
        "Chicken" => vec![
            summary("52940", "Brown Stew Chicken", "sypxpx1515365095.jpg"),
            summary("52846", "Chicken & mushroom Hotpot", "uuuspp1511297945.jpg"),
        ],
        "Dessert" => vec![
            summary("52893", "Apple & Blackberry Crumble", "xvsurr1511719182.jpg"),
            summary("52768", "Apple Frangipan Tart", "wxywrq1468235067.jpg"),
        ],
        "Pasta" => vec![
            summary("52835", "Fettucine alfredo", "uquqtu1511178042.jpg"),
            summary("52829", "Grilled Mac and Cheese Sandwich", "xutquv1505330523.jpg"),
        ],
        "Seafood" => vec![
            summary("52959", "Baked salmon with fennel & tomatoes", "1548772327.jpg"),
            summary("52819", "Cajun spiced fish tacos", "uvuyxu1503067369.jpg"),
        ],
        _ => fallback_recipes(),
    }
}

#[must_use]
pub fn fallback_african_recipes() -> Vec<RecipeSummary> {
    [
        ("52950", "Ayam Percik", "020z181619788503.jpg", "Moroccan"),
        ("52952", "Beef and Oyster Pie", "wrssvt1511556563.jpg", "Nigerian"),
        ("52963", "Shakshuka", "g373701551450225.jpg", "Egyptian"),
        ("52964", "Kafteji", "1bsv1q1560459826.jpg", "Tunisian"),
    ]
    .into_iter()
    .map(|(id, title, image, area)| RecipeSummary {
        is_curated: Some(true),
        category: Some(area.to_string()),
        ..summary(id, title, image)
    })
    .collect()
}

/// Generic fallback recipes whose title contains `query`, case-insensitively.
#[must_use]
pub fn fallback_search(query: &str) -> Vec<RecipeSummary> {
    let query = query.to_lowercase();
    fallback_recipes()
        .into_iter()
        .filter(|r| r.title.to_lowercase().contains(&query))
        .collect()
}

/// The one recipe whose details are available offline.
#[must_use]
pub fn fallback_recipe_details(id: &str) -> Option<Recipe> {
    if id != "52874" {
        return None;
    }
    let ingredients = [
        ("Beef", "1kg"),
        ("Mustard", "2 tbsp"),
        ("Butter", "30g"),
        ("Onion", "1 large"),
        ("Carrots", "2"),
        ("Bay Leaf", "2"),
    ];
    let steps = [
        "Preheat the oven to 150C/300F/Gas 2.",
        "Toss the beef and flour together in a bowl with salt and black pepper.",
        "Heat the oil and butter in a large casserole and fry the beef until browned on all sides.",
        "Add the onions, carrots and bay leaves, and cook for 5 minutes.",
        "Add the mustard and stir to combine.",
    ];
    Some(Recipe {
        id: id.to_string(),
        name: "Beef and Mustard Pie".to_string(),
        description: "A delicious Beef dish from British cuisine.".to_string(),
        image_url: format!("{IMG}/sytuqu1511553755.jpg"),
        prep_time: Some("30 mins".to_string()),
        cook_time: Some("1 hour 45 mins".to_string()),
        servings: Some("4".to_string()),
        difficulty: Some(Difficulty::Medium),
        category: Some("Beef".to_string()),
        ingredients: ingredients
            .iter()
            .map(|(n, a)| RecipeIngredient::new(*n, *a))
            .collect(),
        instructions: (1..)
            .zip(steps)
            .map(|(step, d)| RecipeInstruction {
                step,
                description: d.to_string(),
            })
            .collect(),
        source: RecipeSource::TheMealDb,
        is_curated: Some(false),
    })
}

/// Keep the first occurrence of each meal id.
#[must_use]
pub fn dedup_meals(meals: Vec<Meal>) -> Vec<Meal> {
    let mut seen = std::collections::HashSet::new();
    meals
        .into_iter()
        .filter(|m| seen.insert(m.id_meal.clone()))
        .collect()
}
