//! The built-in Kobiri recipe collection.

use std::sync::LazyLock;

use crate::models::{
    Difficulty, Recipe, RecipeIngredient, RecipeInstruction, RecipeSource, placeholder_image_url,
};

struct Seed {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    prep_time: &'static str,
    cook_time: &'static str,
    servings: &'static str,
    difficulty: Difficulty,
    category: &'static str,
    ingredients: &'static [(&'static str, &'static str)],
    instructions: &'static [&'static str],
}

const SEEDS: &[Seed] = &[
    Seed {
        id: "kobiri-jollof-rice",
        name: "Party Jollof Rice",
        description: "Smoky West African rice simmered in a rich tomato and pepper base.",
        prep_time: "20 mins",
        cook_time: "45 mins",
        servings: "6",
        difficulty: Difficulty::Medium,
        category: "Rice",
        ingredients: &[
            ("Long grain rice", "3 cups"),
            ("Tomatoes", "4"),
            ("Red bell pepper", "2"),
            ("Scotch bonnet pepper", "1"),
            ("Onion", "2"),
            ("Tomato paste", "3 tbsp"),
            ("Chicken stock", "3 cups"),
            ("Vegetable oil", "1/3 cup"),
            ("Bay leaves", "2"),
            ("Curry powder", "1 tsp"),
            ("Dried thyme", "1 tsp"),
        ],
        instructions: &[
            "Blend the tomatoes, bell peppers, scotch bonnet and one onion until smooth.",
            "Fry the remaining sliced onion in oil, then add the tomato paste and fry for 5 minutes.",
            "Pour in the blended base and cook down until the oil rises to the top.",
            "Season with curry, thyme and bay leaves, then add the stock.",
            "Stir in the washed rice, cover tightly and cook on low heat until tender.",
            "Turn up the heat for the last few minutes to get the smoky party bottom.",
        ],
    },
    Seed {
        id: "kobiri-egusi-soup",
        name: "Egusi Soup",
        description: "Ground melon seed soup with leafy greens and assorted meat.",
        prep_time: "25 mins",
        cook_time: "40 mins",
        servings: "4",
        difficulty: Difficulty::Medium,
        category: "Soup",
        ingredients: &[
            ("Ground egusi", "2 cups"),
            ("Palm oil", "1/2 cup"),
            ("Assorted meat", "500g"),
            ("Stockfish", "1 piece"),
            ("Ground crayfish", "2 tbsp"),
            ("Spinach", "2 bunches"),
            ("Onion", "1"),
            ("Scotch bonnet pepper", "2"),
            ("Stock cubes", "2"),
        ],
        instructions: &[
            "Boil the meat and stockfish with onion and stock cubes until tender.",
            "Heat the palm oil and fry the ground egusi until it starts to clump.",
            "Add the meat stock, crayfish and pepper, then simmer for 15 minutes.",
            "Add the cooked meat and fish and simmer for another 10 minutes.",
            "Stir in the chopped spinach and cook for 3 minutes before serving.",
        ],
    },
    Seed {
        id: "kobiri-suya",
        name: "Spicy Grilled Chicken Suya Skewers",
        description: "Street-style skewers coated in a peanut and pepper spice rub.",
        prep_time: "30 mins",
        cook_time: "15 mins",
        servings: "4",
        difficulty: Difficulty::Easy,
        category: "Grill",
        ingredients: &[
            ("Chicken thighs", "800g"),
            ("Roasted peanuts", "1 cup"),
            ("Cayenne pepper", "1 tbsp"),
            ("Ginger powder", "1 tsp"),
            ("Garlic powder", "1 tsp"),
            ("Onion", "1"),
            ("Vegetable oil", "2 tbsp"),
        ],
        instructions: &[
            "Grind the peanuts with the cayenne, ginger and garlic to make the yaji spice.",
            "Cut the chicken into strips and thread onto soaked skewers.",
            "Brush with oil and press a generous coat of spice onto every side.",
            "Grill over high heat for 6 to 8 minutes per side.",
            "Serve with sliced onion and extra spice on the side.",
        ],
    },
    Seed {
        id: "kobiri-puff-puff",
        name: "Puff Puff",
        description: "Soft, lightly sweet fried dough balls.",
        prep_time: "1 hr 10 mins",
        cook_time: "20 mins",
        servings: "8",
        difficulty: Difficulty::Easy,
        category: "Snack",
        ingredients: &[
            ("All-purpose flour", "3 cups"),
            ("Sugar", "1/2 cup"),
            ("Instant yeast", "2 tsp"),
            ("Warm water", "1 1/2 cups"),
            ("Nutmeg", "1/2 tsp"),
            ("Salt", "1/2 tsp"),
            ("Vegetable oil", "for frying"),
        ],
        instructions: &[
            "Mix the flour, sugar, yeast, nutmeg and salt.",
            "Add the warm water and beat into a smooth, sticky batter.",
            "Cover and leave to rise for about an hour until doubled.",
            "Drop scoops of batter into hot oil and fry until golden all over.",
            "Drain on paper towels and serve warm.",
        ],
    },
];

static CURATED: LazyLock<Vec<Recipe>> = LazyLock::new(|| SEEDS.iter().map(seed_to_recipe).collect());

fn seed_to_recipe(seed: &Seed) -> Recipe {
    Recipe {
        id: seed.id.to_string(),
        name: seed.name.to_string(),
        description: seed.description.to_string(),
        image_url: placeholder_image_url(seed.name),
        prep_time: Some(seed.prep_time.to_string()),
        cook_time: Some(seed.cook_time.to_string()),
        servings: Some(seed.servings.to_string()),
        difficulty: Some(seed.difficulty),
        category: Some(seed.category.to_string()),
        ingredients: seed
            .ingredients
            .iter()
            .map(|(name, amount)| RecipeIngredient::new(*name, *amount))
            .collect(),
        instructions: (1..)
            .zip(seed.instructions)
            .map(|(step, description)| RecipeInstruction {
                step,
                description: (*description).to_string(),
            })
            .collect(),
        source: RecipeSource::Kobiri,
        is_curated: Some(true),
    }
}

#[must_use]
pub fn curated_recipes() -> &'static [Recipe] {
    &CURATED
}

#[must_use]
pub fn curated_recipe(id: &str) -> Option<&'static Recipe> {
    CURATED.iter().find(|r| r.id == id)
}

#[must_use]
pub fn is_curated_id(id: &str) -> bool {
    SEEDS.iter().any(|s| s.id == id)
}
