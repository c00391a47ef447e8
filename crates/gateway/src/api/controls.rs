//! Channel control panel actions forwarded by the connector.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;

use tv_domain::ids::{ChannelId, MemberId};
use tv_sessions::controls::{apply_control, ControlAction};
use tv_sessions::platform::ChannelEdit;

use crate::state::AppState;

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ControlBody {
    /// Member who pressed the control.
    pub actor_id: MemberId,
    pub action: ControlAction,
}

/// `POST /v1/channels/:id/controls`: returns the change that was applied.
pub async fn apply(
    State(state): State<AppState>,
    Path(channel_id): Path<ChannelId>,
    Json(body): Json<ControlBody>,
) -> Result<Json<ChannelEdit>, ApiError> {
    let edit = apply_control(
        &state.lifecycle,
        state.platform.as_ref(),
        channel_id,
        body.actor_id,
        &body.action,
    )
    .await?;
    Ok(Json(edit))
}
