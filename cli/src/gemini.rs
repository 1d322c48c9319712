use anyhow::{Context, Result};
use tracing::{debug, warn};

use kobiri_core::error::KobiriError;
use kobiri_core::gemini::{
    API_BASE_URL, GenerateContentRequest, GenerateContentResponse, SERVICE, assistant_request,
    enhance_instruction_request, estimate_times_request, generate_recipes_request,
    organize_list_request, parse_category_groups, parse_generated_recipes, parse_time_estimate,
};
use kobiri_core::models::{CategoryGroups, Recipe, TimeEstimate};

/// Gemini `generateContent` client. Every call needs an API key.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: &str) -> Result<Self> {
        Self::with_base_url(api_key, model, API_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<String>, model: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "kobiri/{} (recipe cookbook)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| KobiriError::NotConfigured("The AI chef (Gemini API key)".to_string()))?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, "Gemini request");

        let resp: GenerateContentResponse = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .context("Failed to reach the Gemini API")?
            .error_for_status()
            .context("Gemini API returned an error")?
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        resp.text()
            .ok_or_else(|| KobiriError::malformed(SERVICE, "empty response").into())
    }

    pub async fn generate_recipes(&self, ingredients: &str) -> Result<Vec<Recipe>> {
        let text = self.generate(&generate_recipes_request(ingredients)).await?;
        parse_generated_recipes(&text)
    }

    pub async fn cooking_assistant(
        &self,
        recipe_name: &str,
        current_step: &str,
        question: &str,
    ) -> Result<String> {
        let text = self
            .generate(&assistant_request(recipe_name, current_step, question))
            .await?;
        Ok(text.trim().to_string())
    }

    pub async fn enhance_instruction(&self, recipe_name: &str, instruction: &str) -> Result<String> {
        let text = self
            .generate(&enhance_instruction_request(recipe_name, instruction))
            .await?;
        Ok(text.trim().to_string())
    }

    /// Prep and cook times for `recipe`, or the defaults when the call fails.
    pub async fn estimate_times(&self, recipe: &Recipe) -> TimeEstimate {
        let request = estimate_times_request(&recipe.name, &recipe.ingredients, &recipe.instructions);
        match self.generate(&request).await.and_then(|t| parse_time_estimate(&t)) {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(recipe = %recipe.name, "using default time estimate: {e:#}");
                TimeEstimate::default()
            }
        }
    }

    pub async fn organize_shopping_list(&self, item_names: &[String]) -> Result<CategoryGroups> {
        let text = self.generate(&organize_list_request(item_names)).await?;
        parse_category_groups(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let client = GeminiClient::new(Some("   ".to_string()), "gemini-2.5-flash").unwrap();
        assert!(!client.is_configured());

        let err = client.generate_recipes("rice, eggs").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KobiriError>(),
            Some(KobiriError::NotConfigured(_))
        ));
        assert!(client.organize_shopping_list(&["Rice".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn test_estimate_times_defaults_on_failure() {
        let client =
            GeminiClient::with_base_url(Some("key".to_string()), "gemini-2.5-flash", "http://127.0.0.1:9")
                .unwrap();
        let recipe = Recipe::minimal("1", kobiri_core::models::RecipeSource::TheMealDb, "Pie", None);
        assert_eq!(client.estimate_times(&recipe).await, TimeEstimate::default());
    }

    #[tokio::test]
    #[ignore = "hits the Gemini API, needs GEMINI_API_KEY"]
    async fn test_generate_recipes_live() {
        let client = GeminiClient::new(std::env::var("GEMINI_API_KEY").ok(), "gemini-2.5-flash").unwrap();
        let recipes = client.generate_recipes("rice, eggs, spring onions").await.unwrap();
        assert!(!recipes.is_empty());
        assert!(recipes.iter().all(|r| r.id.starts_with("ai-")));
    }
}
