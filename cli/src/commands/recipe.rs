use anyhow::Result;

use kobiri_core::db::Database;
use kobiri_core::models::{Difficulty, NewRecipe};
use kobiri_core::session::AppSession;

use super::helpers::{parse_ingredient, print_recipe};

/// Recipe form fields as given on the command line.
#[derive(Debug, Default)]
pub(crate) struct RecipeDraft {
    pub name: String,
    pub description: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub servings: Option<String>,
    pub difficulty: Option<String>,
    pub category: Option<String>,
    /// `"name:amount"` pairs
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

impl RecipeDraft {
    fn into_new_recipe(self) -> Result<NewRecipe> {
        let difficulty = self
            .difficulty
            .as_deref()
            .map(str::parse::<Difficulty>)
            .transpose()?;

        let mut recipe = NewRecipe {
            name: self.name.trim().to_string(),
            description: self.description.unwrap_or_default(),
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            difficulty,
            category: self.category,
            ..NewRecipe::default()
        };
        for raw in &self.ingredients {
            recipe.ingredients.push(parse_ingredient(raw)?);
        }
        for step in &self.steps {
            recipe.push_instruction(step.trim());
        }
        Ok(recipe)
    }
}

pub(crate) fn cmd_recipe_add(
    db: &Database,
    session: &AppSession,
    draft: RecipeDraft,
    json: bool,
) -> Result<()> {
    let recipe = session.add_recipe(db, &draft.into_new_recipe()?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_recipe(&recipe, false);
        println!("\nSaved to your cookbook (id: {})", recipe.id);
    }
    Ok(())
}
