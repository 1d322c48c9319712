//! Gemini `generateContent` wire format, the prompts Kobiri sends, and parsers
//! that turn the model's text back into typed results.

use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::KobiriError;
use crate::models::{
    AI_RECIPE_CATEGORY, CategoryGroup, CategoryGroups, Difficulty, Recipe, RecipeIngredient,
    RecipeInstruction, RecipeSource, RecipeSummary, TimeEstimate, placeholder_image_url,
    renumber_instructions,
};

pub const SERVICE: &str = "Gemini";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Recipes requested per generation.
pub const RECIPES_PER_REQUEST: usize = 3;

const ASSISTANT_PERSONA: &str = "You are an expert, friendly, and encouraging cooking assistant named Kobiri Chef. \
You are helping a user cook a dish. Your answers must be concise, helpful, directly related to the cooking question, \
and under 50 words. Be encouraging and patient. Do not start your response with phrases like 'Of course!' or \
'Great question!'. Get straight to the answer.";

const ENHANCE_PERSONA: &str = "You are an expert, world-class chef named Kobiri Chef. Your role is to help a home cook \
by clarifying a specific instruction from a recipe. You are patient, detailed, and encouraging. Your explanations \
should be easy for a beginner to understand. Use formatting like bullet points or numbered lists if it helps break \
down the step.";

// --- Wire types ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, or `None` when the model returned nothing.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn user_text(text: String) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part { text: Some(text) }],
    }
}

fn system_text(text: &str) -> Content {
    Content {
        role: None,
        parts: vec![Part {
            text: Some(text.to_string()),
        }],
    }
}

fn json_config(temperature: Option<f32>, no_thinking: bool) -> GenerationConfig {
    GenerationConfig {
        response_mime_type: Some("application/json".to_string()),
        temperature,
        thinking_config: no_thinking.then_some(ThinkingConfig { thinking_budget: 0 }),
    }
}

// --- Prompts ---

#[must_use]
pub fn generate_recipes_request(ingredients: &str) -> GenerateContentRequest {
    let prompt = format!(
        "You are a creative and expert chef. Based on the following ingredients: \"{ingredients}\", generate \
         {RECIPES_PER_REQUEST} unique and delicious recipe ideas. For each recipe, provide a 'name', a brief \
         'description', an estimated 'prepTime', 'cookTime', 'servings', a detailed list of 'ingredients' (with name \
         and amount), and step-by-step 'instructions'. The response MUST be a valid JSON array of objects. Do not \
         include any text outside of the JSON array. The JSON structure for each recipe object should be: \
         {{ \"name\": string, \"description\": string, \"prepTime\": string, \"cookTime\": string, \"servings\": \
         string, \"ingredients\": [{{ \"name\": string, \"amount\": string }}], \"instructions\": [{{ \"step\": number, \
         \"description\": string }}] }}"
    );
    GenerateContentRequest {
        contents: vec![user_text(prompt)],
        system_instruction: None,
        generation_config: Some(json_config(None, false)),
    }
}

#[must_use]
pub fn assistant_request(recipe_name: &str, current_step: &str, question: &str) -> GenerateContentRequest {
    let prompt = format!(
        "Context: The user is making \"{recipe_name}\". They are on the step: \"{current_step}\". \
         The user's question is: \"{question}\"."
    );
    GenerateContentRequest {
        contents: vec![user_text(prompt)],
        system_instruction: Some(system_text(ASSISTANT_PERSONA)),
        generation_config: Some(GenerationConfig {
            thinking_config: Some(ThinkingConfig { thinking_budget: 0 }),
            ..GenerationConfig::default()
        }),
    }
}

#[must_use]
pub fn enhance_instruction_request(recipe_name: &str, instruction: &str) -> GenerateContentRequest {
    let prompt = format!(
        "I am cooking \"{recipe_name}\". I need help with this step: \"{instruction}\". Please enhance this \
         instruction for me. Break it down into more manageable parts, explain any tricky techniques, and offer \
         tips for success. Do not just repeat the instruction."
    );
    GenerateContentRequest {
        contents: vec![user_text(prompt)],
        system_instruction: Some(system_text(ENHANCE_PERSONA)),
        generation_config: None,
    }
}

#[must_use]
pub fn estimate_times_request(
    recipe_name: &str,
    ingredients: &[RecipeIngredient],
    instructions: &[RecipeInstruction],
) -> GenerateContentRequest {
    let ingredients = ingredients
        .iter()
        .map(|i| format!("{} {}", i.amount, i.name).trim().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let instructions = instructions
        .iter()
        .map(|i| format!("Step {}: {}", i.step, i.description))
        .collect::<Vec<_>>()
        .join(" ");
    let prompt = format!(
        "You are a professional chef. Estimate the preparation time and cooking time for this recipe:\n\n\
         Recipe Name: {recipe_name}\nIngredients: {ingredients}\nInstructions: {instructions}\n\n\
         Return ONLY a JSON object with two properties: \"prepTime\" and \"cookTime\".\n\
         Both should be strings with time estimates like \"15 mins\", \"1 hour\", \"1 hour 30 mins\", etc.\n\
         Do not include any text outside of the JSON object."
    );
    GenerateContentRequest {
        contents: vec![user_text(prompt)],
        system_instruction: None,
        generation_config: Some(json_config(Some(0.3), true)),
    }
}

#[must_use]
pub fn organize_list_request(item_names: &[String]) -> GenerateContentRequest {
    let prompt = format!(
        "You are a helpful shopping assistant. Organize this list of food items into logical categories like \
         \"Produce\", \"Dairy\", \"Meat\", \"Grains\", \"Spices\", etc. Return ONLY a JSON object where each key is \
         a category and each value is an array of items belonging to that category. Items: {}",
        item_names.join(", ")
    );
    GenerateContentRequest {
        contents: vec![user_text(prompt)],
        system_instruction: None,
        generation_config: Some(json_config(Some(0.1), true)),
    }
}

// --- Parsers ---

/// Remove a surrounding Markdown code fence (with optional language tag).
#[must_use]
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    let body = inner
        .trim_start_matches(|c: char| c.is_alphanumeric() || c == '_')
        .trim();
    if body.is_empty() { trimmed } else { body }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedRecipe {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, deserialize_with = "lenient_string")]
    prep_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    cook_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    servings: Option<String>,
    #[serde(default)]
    ingredients: Vec<GeneratedIngredient>,
    #[serde(default)]
    instructions: Vec<GeneratedStep>,
}

#[derive(Debug, Deserialize)]
struct GeneratedIngredient {
    name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeneratedStep {
    #[serde(default)]
    description: String,
}

/// Accept strings or numbers; the model is inconsistent about `"4"` vs `4`.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Parse generated recipes. Each gets a fresh `ai-` id, a placeholder image,
/// the AI source and category, and steps renumbered from 1.
pub fn parse_generated_recipes(text: &str) -> Result<Vec<Recipe>> {
    let wire: Vec<GeneratedRecipe> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| KobiriError::malformed(SERVICE, format!("expected a JSON array of recipes: {e}")))?;

    let recipes: Vec<Recipe> = wire
        .into_iter()
        .filter(|r| !r.name.trim().is_empty())
        .map(generated_to_recipe)
        .collect();
    if recipes.is_empty() {
        return Err(KobiriError::malformed(SERVICE, "no recipes in response").into());
    }
    Ok(recipes)
}

fn generated_to_recipe(r: GeneratedRecipe) -> Recipe {
    let name = r.name.trim().to_string();
    let mut instructions: Vec<RecipeInstruction> = r
        .instructions
        .into_iter()
        .filter(|s| !s.description.trim().is_empty())
        .map(|s| RecipeInstruction {
            step: 0,
            description: s.description,
        })
        .collect();
    renumber_instructions(&mut instructions);

    Recipe {
        id: format!("ai-{}", Uuid::new_v4()),
        image_url: placeholder_image_url(&name),
        name,
        description: r.description,
        prep_time: r.prep_time,
        cook_time: r.cook_time,
        servings: r.servings,
        difficulty: Some(Difficulty::Medium),
        category: Some(AI_RECIPE_CATEGORY.to_string()),
        ingredients: r
            .ingredients
            .into_iter()
            .map(|i| RecipeIngredient::new(i.name, i.amount.unwrap_or_default()))
            .collect(),
        instructions,
        source: RecipeSource::Ai,
        is_curated: Some(false),
    }
}

/// Summaries carrying the full recipe, as shown on the AI chef page.
#[must_use]
pub fn generated_summaries(recipes: &[Recipe]) -> Vec<RecipeSummary> {
    recipes.iter().map(Recipe::summary).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTimes {
    #[serde(default, deserialize_with = "lenient_string")]
    prep_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    cook_time: Option<String>,
}

pub fn parse_time_estimate(text: &str) -> Result<TimeEstimate> {
    let wire: WireTimes = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| KobiriError::malformed(SERVICE, format!("expected prepTime/cookTime: {e}")))?;
    match (wire.prep_time, wire.cook_time) {
        (Some(prep_time), Some(cook_time)) => Ok(TimeEstimate {
            prep_time,
            cook_time,
        }),
        _ => Err(KobiriError::malformed(SERVICE, "missing prepTime or cookTime").into()),
    }
}

/// Parse `{ "Category": ["item", ...], ... }`, keeping the model's key order.
pub fn parse_category_groups(text: &str) -> Result<CategoryGroups> {
    let value: serde_json::Map<String, Value> = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| KobiriError::malformed(SERVICE, format!("expected a JSON object: {e}")))?;

    let mut groups = Vec::with_capacity(value.len());
    for (name, items) in value {
        let Value::Array(items) = items else {
            return Err(KobiriError::malformed(SERVICE, format!("category \"{name}\" is not a list")).into());
        };
        let items = items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect();
        groups.push(CategoryGroup { name, items });
    }
    Ok(CategoryGroups(groups))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  [1]  "), "[1]");
        assert_eq!(strip_code_fence("``````"), "``````");
    }

    #[test]
    fn test_response_text() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello "},{"text":"chef"}]}}]}"#;
        let resp: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.text().as_deref(), Some("Hello chef"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.text().is_none());
        let blank: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#).unwrap();
        assert!(blank.text().is_none());
    }

    #[test]
    fn test_request_serialization() {
        let req = estimate_times_request(
            "Stew",
            &[RecipeIngredient::new("Beef", "1kg")],
            &[RecipeInstruction {
                step: 1,
                description: "Brown the beef".to_string(),
            }],
        );
        let json = serde_json::to_value(&req).unwrap();
        let config = &json["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["thinkingConfig"]["thinkingBudget"], 0);
        let prompt = json["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("Ingredients: 1kg Beef"));
        assert!(prompt.contains("Step 1: Brown the beef"));
        assert!(json.get("systemInstruction").is_none());

        let ask = serde_json::to_value(assistant_request("Stew", "Brown", "How hot?")).unwrap();
        assert!(ask["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Kobiri Chef"));
    }

    #[test]
    fn test_parse_generated_recipes() {
        let text = r#"```json
[
  {"id":"ai-recipe-1","name":"Leftover Rice Cakes","description":"Crispy.","prepTime":"10 mins",
   "cookTime":"15 mins","servings":4,
   "ingredients":[{"name":"Rice","amount":"2 cups"},{"name":"Egg"}],
   "instructions":[{"step":3,"description":"Mix"},{"step":7,"description":"Fry"}]},
  {"name":"Fried Rice","ingredients":[],"instructions":[]},
  {"name":"   "}
]
```"#;
        let recipes = parse_generated_recipes(text).unwrap();
        assert_eq!(recipes.len(), 2);

        let first = &recipes[0];
        assert!(first.id.starts_with("ai-"));
        assert_ne!(first.id, "ai-recipe-1");
        assert_ne!(first.id, recipes[1].id);
        assert_eq!(first.source, RecipeSource::Ai);
        assert_eq!(first.servings.as_deref(), Some("4"));
        assert_eq!(first.category.as_deref(), Some("AI Generated"));
        assert_eq!(first.difficulty, Some(Difficulty::Medium));
        assert_eq!(first.is_curated, Some(false));
        assert_eq!(first.image_url, placeholder_image_url("Leftover Rice Cakes"));
        assert_eq!(first.ingredients[1], RecipeIngredient::new("Egg", ""));
        let steps: Vec<u32> = first.instructions.iter().map(|i| i.step).collect();
        assert_eq!(steps, vec![1, 2]);

        let summaries = generated_summaries(&recipes);
        assert_eq!(summaries[0].title, "Leftover Rice Cakes");
        assert!(summaries[0].recipe.is_some());
    }

    #[test]
    fn test_parse_generated_recipes_rejects_garbage() {
        for text in ["not json", "{}", "[]"] {
            let err = parse_generated_recipes(text).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<KobiriError>(),
                Some(KobiriError::MalformedResponse { .. })
            ));
        }
    }

    #[test]
    fn test_parse_time_estimate() {
        let t = parse_time_estimate(r#"{"prepTime":"15 mins","cookTime":"1 hour"}"#).unwrap();
        assert_eq!(t.prep_time, "15 mins");
        assert_eq!(t.cook_time, "1 hour");
        assert!(parse_time_estimate(r#"{"prepTime":"15 mins"}"#).is_err());
    }

    #[test]
    fn test_parse_category_groups_keeps_order() {
        let text = r#"{"Produce":["Tomato","Onion"],"Dairy":["Milk"],"Meat":["Beef"]}"#;
        let groups = parse_category_groups(text).unwrap();
        let names: Vec<&str> = groups.0.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Produce", "Dairy", "Meat"]);
        assert_eq!(groups.category_for("onion"), Some("Produce"));

        assert!(parse_category_groups(r#"{"Produce":"Tomato"}"#).is_err());
        assert!(parse_category_groups("[1,2]").is_err());
    }
}
