//! Session ranking.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::state::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    /// Clamped to `1..=channels.top_limit_max`; defaults to the maximum.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /v1/sessions/top`: longest ended sessions.
pub async fn top(
    State(state): State<AppState>,
    Query(q): Query<TopQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = q.limit.unwrap_or(state.config.channels.top_limit_max);
    let sessions = state.maintenance.top_sessions(limit).await?;
    Ok(Json(serde_json::json!({
        "count": sessions.len(),
        "sessions": sessions,
    })))
}
