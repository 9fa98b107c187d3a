use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore as SessionStore, Session, SessionManagerLayer};

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::middleware::{make_span_with_request_id, request_id_middleware};
use crate::services::providers::MovieCatalog;

pub mod auth;
pub mod connections;
pub mod movies;

/// Session key holding the logged-in user's id
pub(crate) const SESSION_USER_KEY: &str = "user_id";
pub(crate) const SESSION_USERNAME_KEY: &str = "username";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub catalog: Arc<dyn MovieCatalog>,
}

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(SessionStore::default()).with_secure(false);

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .nest("/api/movies", movie_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(session_layer)
        .layer(cors_layer)
        .with_state(state)
}

/// Session-gated movie routes under /api/movies
fn movie_routes() -> Router<AppState> {
    Router::new()
        .route("/action", post(movies::register_action))
        .route("/random", get(movies::random_movie))
        .route("/matches", get(movies::get_matches))
        .route(
            "/check_and_create_matches",
            post(movies::check_and_create_matches),
        )
        .route("/connect", post(connections::connect_users))
        .route("/connections", get(connections::get_user_connections))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Resolves the logged-in user from the session
pub(crate) async fn require_user_id(session: &Session) -> AppResult<i64> {
    session
        .get::<i64>(SESSION_USER_KEY)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))
}

/// Accepts a JSON number or a numeric string, the way the clients send ids
pub(crate) fn parse_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
