//! Connector event intake.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use tv_domain::ids::GuildId;
use tv_sessions::events::{HandleReport, VoiceStateUpdate};
use tv_sessions::platform::GuildInfo;
use tv_sessions::reconcile::enforce_guild_allowed;

use crate::state::AppState;

use super::error::ApiError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/events/voice-state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn voice_state(
    State(state): State<AppState>,
    Json(update): Json<VoiceStateUpdate>,
) -> Result<Json<HandleReport>, ApiError> {
    let report = state.voice_events.handle(&update).await?;
    Ok(Json(report))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/events/guild-joined
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
pub struct GuildJoinedBody {
    pub guild_id: GuildId,
    #[serde(default)]
    pub name: String,
}

/// The bot was added to a guild; leave at once unless it is allowed.
pub async fn guild_joined(
    State(state): State<AppState>,
    Json(body): Json<GuildJoinedBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guild = GuildInfo {
        id: body.guild_id,
        name: body.name,
    };
    let left = enforce_guild_allowed(
        state.platform.as_ref(),
        &state.config.guilds.allowed,
        &guild,
    )
    .await?;
    Ok(Json(serde_json::json!({ "left": left })))
}
