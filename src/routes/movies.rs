use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::models::{DiscoveredMovie, ReactionKind};
use crate::routes::{parse_id, require_user_id, AppState};
use crate::services::discovery::{self, DiscoveryOutcome};
use crate::services::matching;

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub movie_id: Value,
    pub action: String,
}

#[derive(Serialize)]
struct DiscoverResponse {
    success: bool,
    #[serde(flatten)]
    movie: DiscoveredMovie,
}

/// Records the user's reaction and runs the incremental match check
pub async fn register_action(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ActionRequest>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&session).await?;

    let movie_id = parse_id(&req.movie_id)
        .ok_or_else(|| AppError::InvalidInput("movie_id must be a number".to_string()))?;
    let kind = ReactionKind::parse(&req.action)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown action '{}'", req.action)))?;

    let new_matches =
        matching::register_reaction(state.store.as_ref(), user_id, movie_id, kind).await?;

    Ok(Json(json!({
        "success": true,
        "action": kind.as_str(),
        "movie_id": movie_id,
        "new_matches": new_matches,
    })))
}

/// Serves one movie the user has not reacted to yet
pub async fn random_movie(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Response> {
    let user_id = require_user_id(&session).await?;

    let mut rng = StdRng::from_os_rng();
    let outcome = discovery::discover(
        state.store.as_ref(),
        state.catalog.as_ref(),
        &mut rng,
        user_id,
    )
    .await?;

    match outcome {
        DiscoveryOutcome::Found(movie) => Ok(Json(DiscoverResponse {
            success: true,
            movie,
        })
        .into_response()),
        DiscoveryOutcome::Exhausted { total_seen } => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "success": false,
                "error": "No more candidates to react to",
                "total_seen": total_seen,
            })),
        )
            .into_response()),
    }
}

/// Flattened match rows across the user's connections, newest match first
pub async fn get_matches(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&session).await?;
    let store = state.store.as_ref();

    let mut connections = store.list_active_connections(user_id).await?;
    connections.retain(|c| c.match_count > 0);
    connections.sort_by(|a, b| b.last_match_at.cmp(&a.last_match_at));

    let mut matches = Vec::new();
    for conn in &connections {
        let partner_id = conn.partner_of(user_id);
        let partner = store
            .find_user_by_id(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", partner_id)))?;

        for movie_id in &conn.matched_movies {
            matches.push(json!({
                "connection_id": conn.id,
                "movie_id": movie_id,
                "partner_id": partner_id,
                "partner_username": partner.username,
                "match_count": conn.match_count,
                "last_match_at": conn.last_match_at,
            }));
        }
    }

    Ok(Json(json!({
        "success": true,
        "total_matches": matches.len(),
        "matches": matches,
    })))
}

/// Bulk full recompute across the user's connections (the history view)
pub async fn check_and_create_matches(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&session).await?;

    let total_matches = matching::recompute_user_connections(state.store.as_ref(), user_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Matches checked",
        "total_matches": total_matches,
    })))
}
