use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::gemini::GeminiClient;
use crate::mealdb::MealDbClient;
use crate::pages::{self, HomePage};
use kobiri_core::auth::OAuthConfig;
use kobiri_core::cookbook::Cookbook;
use kobiri_core::db::Database;
use kobiri_core::error::KobiriError;
use kobiri_core::gemini::generated_summaries;
use kobiri_core::models::{
    Category, FavoriteRecipe, MarketListItem, NewRecipe, Recipe, RecipeSource, RecipeSummary,
    Session,
};
use kobiri_core::service;
use kobiri_core::session::{AppSession, FavoriteToggle};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    mealdb: Arc<MealDbClient>,
    gemini: Arc<GeminiClient>,
    oauth: Option<OAuthConfig>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Per-request view of the caller: user, favorites and market list.
    fn load_session(&self, db: &Database, token: Option<&str>) -> anyhow::Result<AppSession> {
        let mut session = AppSession::new(self.oauth.clone());
        session
            .auth_mut()
            .on_auth_state_change(Box::new(|event, current| {
                debug!(?event, user = current.map(|s| s.user.id.as_str()), "auth state changed");
            }));
        session.initialize(db, token)?;
        Ok(session)
    }
}

/// Bearer token of a request that passed `require_session`.
#[derive(Clone)]
struct AccessToken(String);

// --- Request / Response types ---

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Deserialize)]
struct CredentialsRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct AddItemRequest {
    name: String,
}

#[derive(Deserialize)]
struct RecipeRef {
    source: RecipeSource,
    id: String,
}

#[derive(Deserialize)]
struct GenerateRequest {
    ingredients: String,
}

#[derive(Deserialize)]
struct AskRequest {
    recipe_name: String,
    #[serde(default)]
    current_step: String,
    question: String,
}

#[derive(Deserialize)]
struct EnhanceRequest {
    recipe_name: String,
    instruction: String,
}

#[derive(Serialize)]
struct RecipeDetailResponse {
    recipe: Recipe,
    is_favorite: bool,
    on_market_list: bool,
}

#[derive(Serialize)]
struct ToggleFavoriteResponse {
    action: &'static str,
    favorite: FavoriteRecipe,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    BadGateway(String),
    Unavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<KobiriError>() {
            Some(
                e @ (KobiriError::NotSignedIn(_)
                | KobiriError::InvalidCredentials
                | KobiriError::InvalidSession),
            ) => Self::Unauthorized(e.to_string()),
            Some(e @ KobiriError::EmailTaken(_)) => Self::Conflict(e.to_string()),
            Some(e @ KobiriError::Validation(_)) => Self::BadRequest(e.to_string()),
            Some(e @ KobiriError::NotConfigured(_)) => Self::Unavailable(e.to_string()),
            Some(e @ KobiriError::MalformedResponse { .. }) => {
                warn!("{e}");
                Self::BadGateway("The AI chef returned an answer we could not use".to_string())
            }
            None => Self::Internal(err),
        }
    }
}

// --- Middleware ---

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(String::from)
}

async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = bearer_token(request.headers());
    let valid = match token.as_deref() {
        Some(token) => {
            let db = state.db();
            match db.get_session(token) {
                Ok(found) => found.is_some(),
                Err(e) => return ApiError::from(e).into_response(),
            }
        }
        None => false,
    };

    match token {
        Some(token) if valid => {
            request.extensions_mut().insert(AccessToken(token));
            next.run(request).await
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Sign in required".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Browse handlers ---

async fn get_home(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HomePage>, ApiError> {
    let kobiri = {
        let db = state.db();
        let session = state.load_session(&db, bearer_token(&headers).as_deref())?;
        service::visible_kobiri_recipes(&db, &session)?
    };
    Ok(Json(pages::home_page(kobiri, &state.mealdb).await))
}

async fn get_categories(State(state): State<AppState>) -> Json<Vec<Category>> {
    Json(state.mealdb.categories().await)
}

async fn get_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<Vec<RecipeSummary>> {
    Json(state.mealdb.recipes_by_category(&name).await)
}

async fn search_recipes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::BadRequest("Search query is required".to_string()));
    }
    Ok(Json(state.mealdb.search(q).await))
}

async fn lookup_recipe(
    state: &AppState,
    session: &AppSession,
    source: RecipeSource,
    id: &str,
) -> Result<Recipe, ApiError> {
    pages::recipe_detail(&state.mealdb, &state.gemini, session, source, id, || {
        service::stored_recipe(&state.db(), session, source, id)
    })
    .await
    .ok_or_else(|| ApiError::NotFound(format!("Recipe {source}/{id} not found")))
}

async fn get_recipe_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((source, id)): Path<(String, String)>,
) -> Result<Json<RecipeDetailResponse>, ApiError> {
    let source: RecipeSource = source
        .parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?;
    let session = {
        let db = state.db();
        state.load_session(&db, bearer_token(&headers).as_deref())?
    };
    let recipe = lookup_recipe(&state, &session, source, &id).await?;

    Ok(Json(RecipeDetailResponse {
        is_favorite: session.is_favorite(&recipe.id, recipe.source),
        on_market_list: session.is_recipe_on_list(&recipe.name),
        recipe,
    }))
}

// --- Cookbook handlers ---

async fn get_cookbook(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Cookbook>, ApiError> {
    let db = state.db();
    let session = state.load_session(&db, Some(&token))?;
    Ok(Json(service::cookbook(&db, &session)?))
}

async fn list_favorites(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Vec<FavoriteRecipe>>, ApiError> {
    let db = state.db();
    let session = state.load_session(&db, Some(&token))?;
    Ok(Json(session.favorites().to_vec()))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Json(recipe): Json<RecipeSummary>,
) -> Result<Json<ToggleFavoriteResponse>, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    let response = match session.toggle_favorite(&db, &recipe)? {
        FavoriteToggle::Added(favorite) => ToggleFavoriteResponse {
            action: "added",
            favorite,
        },
        FavoriteToggle::Removed(favorite) => ToggleFavoriteResponse {
            action: "removed",
            favorite,
        },
    };
    Ok(Json(response))
}

async fn create_recipe(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Json(recipe): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    let db = state.db();
    let session = state.load_session(&db, Some(&token))?;
    let created = session.add_recipe(&db, &recipe)?;
    Ok((StatusCode::CREATED, Json(created)))
}

// --- Market list handlers ---

async fn get_market_list(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Vec<MarketListItem>>, ApiError> {
    let db = state.db();
    let session = state.load_session(&db, Some(&token))?;
    Ok(Json(session.market_list().to_vec()))
}

async fn clear_market_list(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Value>, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    let removed = session.clear_market_list(&db)?;
    Ok(Json(json!({ "removed": removed })))
}

async fn add_market_item(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<Vec<MarketListItem>>, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Item name is required".to_string()));
    }
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    session.add_manual_item(&db, &req.name)?;
    Ok(Json(session.market_list().to_vec()))
}

async fn add_recipe_to_market_list(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Json(req): Json<RecipeRef>,
) -> Result<Json<Value>, ApiError> {
    let session = {
        let db = state.db();
        state.load_session(&db, Some(&token))?
    };
    let recipe = lookup_recipe(&state, &session, req.source, &req.id).await?;

    // Reload: the list may have changed while the recipe was fetched.
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    let report = session.add_recipe_to_market_list(&db, &recipe)?;
    Ok(Json(json!({
        "report": report,
        "message": report.message(),
        "items": session.market_list(),
    })))
}

async fn organize_market_list(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Value>, ApiError> {
    let names = {
        let db = state.db();
        state.load_session(&db, Some(&token))?.market_item_names()
    };
    if names.is_empty() {
        return Err(ApiError::BadRequest(
            "Your market list is empty, nothing to organize".to_string(),
        ));
    }

    let groups = state.gemini.organize_shopping_list(&names).await?;

    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    let updated = session.apply_categories(&db, &groups)?;
    Ok(Json(json!({
        "updated": updated,
        "categories": groups.0.len(),
        "items": session.market_list(),
    })))
}

async fn toggle_market_item(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MarketListItem>>, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    if !session.toggle_item_checked(&db, &id)? {
        return Err(ApiError::NotFound(format!("Market list item {id} not found")));
    }
    Ok(Json(session.market_list().to_vec()))
}

async fn delete_market_item(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    if session.remove_item(&db, &id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Market list item {id} not found")))
    }
}

// --- Auth handlers ---

async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, None)?;
    let created = session.sign_up(&db, &req.email, &req.password)?;
    info!(user = %created.user.id, "account created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Session>, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, None)?;
    Ok(Json(session.sign_in_with_password(&db, &req.email, &req.password)?))
}

async fn sign_out(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<StatusCode, ApiError> {
    let db = state.db();
    let mut session = state.load_session(&db, Some(&token))?;
    session.sign_out(&db)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_session(
    State(state): State<AppState>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> Result<Json<Session>, ApiError> {
    let db = state.db();
    let session = state.load_session(&db, Some(&token))?;
    session
        .session()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Sign in required".to_string()))
}

async fn oauth_sign_in(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = AppSession::new(state.oauth.clone());
    let url = session.sign_in_with_oauth(&provider)?;
    Ok(Json(json!({ "provider": provider, "url": url })))
}

// --- AI chef handlers ---

async fn generate_recipes(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Vec<RecipeSummary>>, ApiError> {
    if req.ingredients.trim().is_empty() {
        return Err(ApiError::BadRequest("List at least one ingredient".to_string()));
    }
    let recipes = state.gemini.generate_recipes(&req.ingredients).await?;
    {
        let db = state.db();
        let session = state.load_session(&db, bearer_token(&headers).as_deref())?;
        session.remember_generated(&db, &recipes)?;
    }
    Ok(Json(generated_summaries(&recipes)))
}

async fn ask_assistant(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("Question is required".to_string()));
    }
    let answer = state
        .gemini
        .cooking_assistant(&req.recipe_name, &req.current_step, &req.question)
        .await?;
    Ok(Json(json!({ "answer": answer })))
}

async fn enhance_instruction(
    State(state): State<AppState>,
    Json(req): Json<EnhanceRequest>,
) -> Result<Json<Value>, ApiError> {
    if req.instruction.trim().is_empty() {
        return Err(ApiError::BadRequest("Instruction is required".to_string()));
    }
    let enhanced = state
        .gemini
        .enhance_instruction(&req.recipe_name, &req.instruction)
        .await?;
    Ok(Json(json!({ "enhanced": enhanced })))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    let signed_in = Router::new()
        .route("/api/cookbook", get(get_cookbook))
        .route("/api/favorites", get(list_favorites))
        .route("/api/favorites/toggle", post(toggle_favorite))
        .route(
            "/api/market-list",
            get(get_market_list).delete(clear_market_list),
        )
        .route("/api/market-list/items", post(add_market_item))
        .route("/api/market-list/items/{id}", delete(delete_market_item))
        .route("/api/market-list/items/{id}/toggle", post(toggle_market_item))
        .route("/api/market-list/recipe", post(add_recipe_to_market_list))
        .route("/api/market-list/organize", post(organize_market_list))
        .route("/api/auth/logout", post(sign_out))
        .route("/api/auth/session", get(get_session))
        .route("/api/recipes", post(create_recipe))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/api/home", get(get_home))
        .route("/api/categories", get(get_categories))
        .route("/api/categories/{name}", get(get_category))
        .route("/api/search", get(search_recipes))
        .route("/api/recipe/{source}/{id}", get(get_recipe_detail))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/login", post(sign_in))
        .route("/api/auth/oauth/{provider}", post(oauth_sign_in))
        .route("/api/ai-chef/generate", post(generate_recipes))
        .route("/api/ai-chef/ask", post(ask_assistant))
        .route("/api/ai-chef/enhance", post(enhance_instruction))
        .merge(signed_in)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    db: Database,
    mealdb: MealDbClient,
    gemini: GeminiClient,
    oauth: Option<OAuthConfig>,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    if !gemini.is_configured() {
        warn!("No Gemini API key set; AI chef routes will answer 503");
    }
    if oauth.is_none() {
        info!("OAuth sign-in disabled");
    }
    if bind != "127.0.0.1" && bind != "localhost" {
        warn!("Listening on {bind}; any device on your network can reach this API");
    }

    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        mealdb: Arc::new(mealdb),
        gemini: Arc::new(gemini),
        oauth,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use kobiri_core::gemini::DEFAULT_MODEL;
    use tower::ServiceExt;

    const OFFLINE: &str = "http://127.0.0.1:9";

    fn test_state() -> AppState {
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            mealdb: Arc::new(MealDbClient::new(OFFLINE).unwrap()),
            gemini: Arc::new(GeminiClient::new(None, DEFAULT_MODEL).unwrap()),
            oauth: None,
        }
    }

    fn test_app() -> Router {
        build_router(test_state())
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn signed_up(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "email": email, "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/api/categories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            headers.get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn signed_in_routes_reject_missing_or_unknown_token() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/market-list", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Sign in required");

        let (status, _) = send(&app, "GET", "/api/cookbook", Some("not-a-token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn security_headers_on_auth_failure() {
        let app = test_app();

        let response = app
            .oneshot(
                axum::http::Request::get("/api/favorites")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn account_lifecycle() {
        let app = test_app();
        let token = signed_up(&app, "ada@example.com").await;

        let (status, body) = send(&app, "GET", "/api/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "ada@example.com");

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "email": "ada@example.com", "password": "another1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["access_token"].is_string());

        let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", "/api/auth/session", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signup_validation_returns_400() {
        let app = test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({ "email": "not-an-email", "password": "secret123" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("email"));
    }

    #[tokio::test]
    async fn recipe_detail_by_source() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/recipe/kobiri/kobiri-suya", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipe"]["source"], "KOBIRI");
        assert_eq!(body["is_favorite"], false);

        // Bundled fallback when TheMealDB is unreachable
        let (status, body) = send(&app, "GET", "/api/recipe/themealdb/52874", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipe"]["id"], "52874");

        let (status, _) = send(&app, "GET", "/api/recipe/KOBIRI/no-such-dish", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "GET", "/api/recipe/spoonacular/1", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid recipe source"));
    }

    #[tokio::test]
    async fn search_requires_query() {
        let app = test_app();

        let (status, _) = send(&app, "GET", "/api/search?q=%20", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/api/search?q=oyster", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_array());
    }

    #[tokio::test]
    async fn home_page_includes_curated_recipes() {
        let app = test_app();

        let (status, body) = send(&app, "GET", "/api/home", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kobiri"].as_array().unwrap().len(), 4);
        assert!(!body["categories"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn favorite_toggle_adds_then_removes() {
        let app = test_app();
        let token = signed_up(&app, "fav@example.com").await;
        let pie = json!({
            "id": "52874",
            "title": "Beef and Mustard Pie",
            "image": "https://example.com/pie.jpg",
            "source": "THEMEALDB",
        });

        let (status, body) = send(
            &app,
            "POST",
            "/api/favorites/toggle",
            Some(&token),
            Some(pie.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["action"], "added");

        let (_, body) = send(&app, "GET", "/api/favorites", Some(&token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (_, body) = send(&app, "GET", "/api/recipe/THEMEALDB/52874", Some(&token), None).await;
        assert_eq!(body["is_favorite"], true);

        let (_, body) = send(&app, "POST", "/api/favorites/toggle", Some(&token), Some(pie)).await;
        assert_eq!(body["action"], "removed");

        let (_, body) = send(&app, "GET", "/api/favorites", Some(&token), None).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn market_list_merges_repeated_recipe() {
        let app = test_app();
        let token = signed_up(&app, "cook@example.com").await;
        let jollof = json!({ "source": "KOBIRI", "id": "kobiri-jollof-rice" });

        let (status, body) = send(
            &app,
            "POST",
            "/api/market-list/recipe",
            Some(&token),
            Some(jollof.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"]["added"], 11);
        assert_eq!(body["report"]["updated"], 0);

        let (_, body) = send(
            &app,
            "POST",
            "/api/market-list/recipe",
            Some(&token),
            Some(jollof),
        )
        .await;
        assert_eq!(body["report"]["added"], 0);
        assert_eq!(body["report"]["updated"], 11);

        let (_, body) = send(&app, "GET", "/api/market-list", Some(&token), None).await;
        let items = body.as_array().unwrap();
        assert_eq!(items.len(), 11);
        let onion = items.iter().find(|i| i["name"] == "Onion").unwrap();
        assert_eq!(onion["amount"], "2, 2");
        assert_eq!(onion["from_recipe"], "Party Jollof Rice");

        let (_, body) = send(
            &app,
            "GET",
            "/api/recipe/KOBIRI/kobiri-jollof-rice",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["on_market_list"], true);
    }

    #[tokio::test]
    async fn market_list_item_lifecycle() {
        let app = test_app();
        let token = signed_up(&app, "shop@example.com").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/market-list/items",
            Some(&token),
            Some(json!({ "name": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/market-list/items",
            Some(&token),
            Some(json!({ "name": "Plantain" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body[0]["id"].as_str().unwrap().to_string();
        assert_eq!(body[0]["amount"], "1");
        assert_eq!(body[0]["category"], "Other");

        let toggle = format!("/api/market-list/items/{id}/toggle");
        let (_, body) = send(&app, "POST", &toggle, Some(&token), None).await;
        assert_eq!(body[0]["checked"], true);

        let item = format!("/api/market-list/items/{id}");
        let (status, _) = send(&app, "DELETE", &item, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &item, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "POST", &toggle, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(
            &app,
            "POST",
            "/api/market-list/items",
            Some(&token),
            Some(json!({ "name": "Garri" })),
        )
        .await;
        let (status, body) = send(&app, "DELETE", "/api/market-list", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], 1);
    }

    #[tokio::test]
    async fn market_lists_are_per_user() {
        let app = test_app();
        let first = signed_up(&app, "one@example.com").await;
        let second = signed_up(&app, "two@example.com").await;

        send(
            &app,
            "POST",
            "/api/market-list/items",
            Some(&first),
            Some(json!({ "name": "Yam" })),
        )
        .await;

        let (_, body) = send(&app, "GET", "/api/market-list", Some(&second), None).await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn organize_empty_list_skips_ai() {
        let app = test_app();
        let token = signed_up(&app, "tidy@example.com").await;

        let (status, body) = send(&app, "POST", "/api/market-list/organize", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn ai_routes_without_key_return_503() {
        let app = test_app();
        let token = signed_up(&app, "chef@example.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/ai-chef/generate",
            None,
            Some(json!({ "ingredients": "rice, eggs" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("not configured"));

        send(
            &app,
            "POST",
            "/api/market-list/items",
            Some(&token),
            Some(json!({ "name": "Pepper" })),
        )
        .await;
        let (status, _) = send(&app, "POST", "/api/market-list/organize", Some(&token), None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        // Categories stay untouched after a failed organize
        let (_, body) = send(&app, "GET", "/api/market-list", Some(&token), None).await;
        assert_eq!(body[0]["category"], "Other");

        let (status, _) = send(
            &app,
            "POST",
            "/api/ai-chef/ask",
            None,
            Some(json!({ "recipe_name": "Suya", "question": "How hot is the grill?" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn oauth_without_config_returns_503() {
        let app = test_app();

        let (status, _) = send(&app, "POST", "/api/auth/oauth/google", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn created_recipe_lands_in_cookbook() {
        let app = test_app();
        let token = signed_up(&app, "author@example.com").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(&token),
            Some(json!({ "name": "Moi Moi" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(&token),
            Some(json!({
                "name": "Moi Moi",
                "ingredients": [{ "name": "Beans", "amount": "2 cups" }],
                "instructions": [{ "step": 1, "description": "Blend and steam" }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["source"], "KOBIRI");
        let id = body["id"].as_str().unwrap().to_string();

        let (_, body) = send(&app, "GET", "/api/cookbook", Some(&token), None).await;
        assert_eq!(body["user_creations"][0]["id"], id);

        // Own recipes show up first in the Kobiri row
        let (_, body) = send(&app, "GET", "/api/home", Some(&token), None).await;
        assert_eq!(body["kobiri"][0]["id"], id);
    }

    #[tokio::test]
    async fn user_recipe_detail_visible_only_to_owner() {
        let app = test_app();
        let owner = signed_up(&app, "owner@example.com").await;
        let other = signed_up(&app, "other@example.com").await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/recipes",
            Some(&owner),
            Some(json!({
                "name": "Private Ofada Stew",
                "ingredients": [{ "name": "Locust beans", "amount": "2 tbsp" }],
                "instructions": [{ "step": 1, "description": "Fry the peppers" }],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/api/recipe/KOBIRI/{}", body["id"].as_str().unwrap());

        let (status, body) = send(&app, "GET", &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipe"]["name"], "Private Ofada Stew");

        let (status, _) = send(&app, "GET", &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app();

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/auth/signup")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/.kobiri/db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }

    #[test]
    fn kobiri_errors_map_to_status() {
        let status = |e: KobiriError| ApiError::from(anyhow::Error::from(e)).into_response().status();

        assert_eq!(status(KobiriError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(KobiriError::NotSignedIn("save recipes".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(KobiriError::EmailTaken("a@b.c".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(KobiriError::Validation("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(KobiriError::NotConfigured("OAuth sign-in".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(KobiriError::malformed("Gemini", "not json")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
