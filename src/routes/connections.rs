use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::error::{AppError, AppResult};
use crate::routes::{parse_id, require_user_id, AppState};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub target_user_id: Value,
}

/// Connects the session user with another user
pub async fn connect_users(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<ConnectRequest>,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&session).await?;

    let target_id = parse_id(&req.target_user_id)
        .ok_or_else(|| AppError::InvalidInput("target_user_id must be a number".to_string()))?;

    if target_id == user_id {
        return Err(AppError::InvalidInput(
            "Cannot connect a user to themselves".to_string(),
        ));
    }

    let target = state
        .store
        .find_user_by_id(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let connection = state.store.create_connection(user_id, target_id).await?;

    tracing::info!(
        connection_id = connection.id,
        user_id,
        partner_id = target.id,
        "Connection created"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Connection established",
        "partner_id": target.id,
        "partner_username": target.username,
    })))
}

/// Active connections of the session user, newest first
pub async fn get_user_connections(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Value>> {
    let user_id = require_user_id(&session).await?;
    let store = state.store.as_ref();

    let mut connections = Vec::new();
    for conn in store.list_active_connections(user_id).await? {
        let partner_id = conn.partner_of(user_id);
        let partner_username = store
            .find_user_by_id(partner_id)
            .await?
            .map(|u| u.username)
            .unwrap_or_default();

        connections.push(json!({
            "connection_id": conn.id,
            "partner_id": partner_id,
            "partner_username": partner_username,
            "connected_at": conn.connected_at,
            "match_count": conn.match_count,
        }));
    }

    Ok(Json(json!({ "connections": connections })))
}
