use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::error::KobiriError;

pub const PLACEHOLDER_IMAGE_BASE: &str = "https://placehold.co/600x400/F59E0B/FFFFFF?text=";

/// Category given to manual items and to anything the organizer did not place.
pub const DEFAULT_ITEM_CATEGORY: &str = "Other";

pub const AI_RECIPE_CATEGORY: &str = "AI Generated";

/// Where a recipe comes from. Part of the composite favorite key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecipeSource {
    #[serde(rename = "KOBIRI")]
    Kobiri,
    #[serde(rename = "THEMEALDB")]
    TheMealDb,
    #[serde(rename = "AI")]
    Ai,
}

impl RecipeSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kobiri => "KOBIRI",
            Self::TheMealDb => "THEMEALDB",
            Self::Ai => "AI",
        }
    }
}

impl fmt::Display for RecipeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "KOBIRI" => Ok(Self::Kobiri),
            "THEMEALDB" => Ok(Self::TheMealDb),
            "AI" => Ok(Self::Ai),
            _ => bail!("Invalid recipe source '{s}'. Must be one of: kobiri, themealdb, ai"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        })
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => bail!("Invalid difficulty '{s}'. Must be one of: easy, medium, hard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    #[serde(default)]
    pub amount: String,
}

impl RecipeIngredient {
    pub fn new(name: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeInstruction {
    pub step: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub instructions: Vec<RecipeInstruction>,
    pub source: RecipeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_curated: Option<bool>,
}

impl Recipe {
    /// Stand-in shown when only a stored title and image are known.
    #[must_use]
    pub fn minimal(id: &str, source: RecipeSource, title: &str, image: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            name: title.to_string(),
            description: "Recipe details could not be loaded.".to_string(),
            image_url: image
                .filter(|i| !i.is_empty())
                .map_or_else(|| placeholder_image_url("Recipe Not Found"), String::from),
            prep_time: Some("N/A".to_string()),
            cook_time: Some("N/A".to_string()),
            servings: Some("N/A".to_string()),
            difficulty: Some(Difficulty::Medium),
            category: Some("Unknown".to_string()),
            ingredients: Vec::new(),
            instructions: Vec::new(),
            source,
            is_curated: Some(false),
        }
    }

    #[must_use]
    pub fn summary(&self) -> RecipeSummary {
        RecipeSummary {
            id: self.id.clone(),
            title: self.name.clone(),
            image: self.image_url.clone(),
            source: self.source,
            is_curated: self.is_curated,
            category: self.category.clone(),
            recipe: Some(Box::new(self.clone())),
        }
    }

    /// Externally sourced recipes usually arrive without timings.
    #[must_use]
    pub fn needs_time_estimate(&self) -> bool {
        self.source != RecipeSource::Kobiri
            && self
                .prep_time
                .as_deref()
                .is_none_or(|t| t.trim().is_empty() || t == "N/A")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeSummary {
    pub id: String,
    pub title: String,
    pub image: String,
    pub source: RecipeSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_curated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Full recipe when it is already in hand, so detail views need no second fetch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Box<Recipe>>,
}

impl RecipeSummary {
    #[must_use]
    pub fn new(id: &str, title: &str, image: &str, source: RecipeSource) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            image: image.to_string(),
            source,
            is_curated: None,
            category: None,
            recipe: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub thumbnail: String,
    pub description: String,
}

/// User-submitted recipe before the store assigns id, image and source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub cook_time: Option<String>,
    #[serde(default)]
    pub servings: Option<String>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredient>,
    #[serde(default)]
    pub instructions: Vec<RecipeInstruction>,
}

impl NewRecipe {
    pub fn push_ingredient(&mut self, name: &str, amount: &str) {
        self.ingredients.push(RecipeIngredient::new(name, amount));
    }

    pub fn push_instruction(&mut self, description: &str) {
        push_instruction(&mut self.instructions, description);
    }

    pub fn remove_instruction(&mut self, index: usize) -> Option<RecipeInstruction> {
        remove_instruction(&mut self.instructions, index)
    }
}

/// A recipe needs a name, a first ingredient and a first instruction.
pub fn validate_new_recipe(recipe: &NewRecipe) -> Result<()> {
    let missing_ingredient = recipe
        .ingredients
        .first()
        .is_none_or(|i| i.name.trim().is_empty());
    let missing_instruction = recipe
        .instructions
        .first()
        .is_none_or(|i| i.description.trim().is_empty());
    if recipe.name.trim().is_empty() || missing_ingredient || missing_instruction {
        return Err(KobiriError::Validation(
            "Recipe name, at least one ingredient, and one instruction are required.".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Rewrite steps as the contiguous sequence 1..=N in their current order.
pub fn renumber_instructions(instructions: &mut [RecipeInstruction]) {
    for (idx, inst) in instructions.iter_mut().enumerate() {
        inst.step = idx as u32 + 1;
    }
}

pub fn push_instruction(instructions: &mut Vec<RecipeInstruction>, description: &str) {
    instructions.push(RecipeInstruction {
        step: instructions.len() as u32 + 1,
        description: description.to_string(),
    });
}

pub fn remove_instruction(
    instructions: &mut Vec<RecipeInstruction>,
    index: usize,
) -> Option<RecipeInstruction> {
    if index >= instructions.len() {
        return None;
    }
    let removed = instructions.remove(index);
    renumber_instructions(instructions);
    Some(removed)
}

/// Placeholder image carrying the recipe name. Long names of three or more
/// words are broken across two lines at the middle word.
#[must_use]
pub fn placeholder_image_url(name: &str) -> String {
    let plus = |s: &str| s.replace(char::is_whitespace, "+");
    let mut text = plus(name);
    if name.chars().count() > 20 {
        let words: Vec<&str> = name.split(' ').collect();
        if words.len() > 2 {
            let mid = words.len() / 2;
            let line1 = words[..mid].join(" ");
            let line2 = words[mid..].join(" ");
            text = format!("{}%0A{}", plus(&line1), plus(&line2));
        }
    }
    format!("{PLACEHOLDER_IMAGE_BASE}{text}")
}

// --- Favorites ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteRecipe {
    pub id: String,
    pub user_id: String,
    pub recipe_id: String,
    pub source: RecipeSource,
    pub title: String,
    pub image: String,
    pub created_at: String,
}

impl FavoriteRecipe {
    #[must_use]
    pub fn key(&self) -> String {
        favorite_key(self.source, &self.recipe_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFavorite {
    pub recipe_id: String,
    pub source: RecipeSource,
    pub title: String,
    pub image: String,
}

impl From<&RecipeSummary> for NewFavorite {
    fn from(summary: &RecipeSummary) -> Self {
        Self {
            recipe_id: summary.id.clone(),
            source: summary.source,
            title: summary.title.clone(),
            image: summary.image.clone(),
        }
    }
}

/// Composite favorite key, `SOURCE-recipe_id`.
#[must_use]
pub fn favorite_key(source: RecipeSource, recipe_id: &str) -> String {
    format!("{source}-{recipe_id}")
}

// --- Market list ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketListItem {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub amount: String,
    pub checked: bool,
    pub from_recipe: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMarketListItem {
    pub name: String,
    pub amount: String,
    pub checked: bool,
    pub from_recipe: Option<String>,
    pub category: Option<String>,
}

/// Merge key for list items: trimmed and lowercased.
#[must_use]
pub fn normalize_item_name(name: &str) -> String {
    name.trim().to_lowercase()
}

// --- Auth ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
    pub created_at: String,
}

// --- AI results ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub prep_time: String,
    pub cook_time: String,
}

impl Default for TimeEstimate {
    fn default() -> Self {
        Self {
            prep_time: "20 mins".to_string(),
            cook_time: "30 mins".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub name: String,
    pub items: Vec<String>,
}

/// Categories in the order the organizer returned them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryGroups(pub Vec<CategoryGroup>);

impl CategoryGroups {
    /// First category holding `item_name`. Names must match exactly apart
    /// from case.
    #[must_use]
    pub fn category_for(&self, item_name: &str) -> Option<&str> {
        let wanted = item_name.to_lowercase();
        self.0
            .iter()
            .find(|g| g.items.iter().any(|i| i.to_lowercase() == wanted))
            .map(|g| g.name.as_str())
    }
}
