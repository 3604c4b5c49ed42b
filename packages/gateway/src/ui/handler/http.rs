//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::ui::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDto {
    pub user_id: String,
    pub sessions: usize,
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Number of live sessions registered under a user
pub async fn get_presence(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PresenceDto>, StatusCode> {
    match state.get_presence_usecase.execute(user_id).await {
        Ok((user_id, sessions)) => Ok(Json(PresenceDto {
            user_id: user_id.into_string(),
            sessions,
        })),
        Err(e) => {
            tracing::warn!("Rejected presence lookup: {}", e);
            Err(StatusCode::BAD_REQUEST)
        }
    }
}
