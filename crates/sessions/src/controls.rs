//! Channel control panel: rename and user-limit actions.
//!
//! Only the channel's owner (the member who created it) may act.  An owner
//! that could not be determined denies everyone.

use serde::{Deserialize, Serialize};

use tv_domain::error::{Error, Result};
use tv_domain::ids::{ChannelId, MemberId};

use crate::lifecycle::LifecycleManager;
use crate::platform::{ChannelEdit, PlatformGateway};
use crate::session::Session;
use crate::store::SessionStore;

pub const MIN_USER_LIMIT: u32 = 1;
pub const MAX_USER_LIMIT: u32 = 99;
pub const MAX_NAME_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlAction {
    Rename { name: String },
    IncreaseLimit,
    DecreaseLimit,
    SetLimit { limit: u32 },
}

pub fn authorize(owner: Option<MemberId>, actor: MemberId) -> Result<()> {
    match owner {
        Some(owner) if owner == actor => Ok(()),
        _ => Err(Error::NotOwner),
    }
}

/// New user limit for a limit action.  `current` of 0 is "unlimited".
/// Returns `None` for actions that do not touch the limit.
pub fn next_user_limit(action: &ControlAction, current: u32) -> Option<u32> {
    match action {
        ControlAction::IncreaseLimit => Some(current.saturating_add(1).min(MAX_USER_LIMIT)),
        ControlAction::DecreaseLimit => Some(current.saturating_sub(1).max(MIN_USER_LIMIT)),
        ControlAction::SetLimit { limit } => Some((*limit).clamp(MIN_USER_LIMIT, MAX_USER_LIMIT)),
        ControlAction::Rename { .. } => None,
    }
}

/// Trim and length-check a new channel name.
pub fn validate_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "channel name must be 1-{MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Check ownership and apply `action` to a managed channel.
/// Returns the edit that was sent to the platform.
pub async fn apply_control(
    lifecycle: &LifecycleManager,
    platform: &dyn PlatformGateway,
    channel_id: ChannelId,
    actor: MemberId,
    action: &ControlAction,
) -> Result<ChannelEdit> {
    let session = lifecycle
        .store()
        .find_open(channel_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("channel {channel_id} is not a temporary channel")))?;

    let snapshot = platform
        .resolve_channel(channel_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("channel {channel_id} no longer exists")))?;

    let owner = owner_of(platform, &session, snapshot.guild_id).await?;
    authorize(owner, actor)?;

    let edit = match action {
        ControlAction::Rename { name } => ChannelEdit {
            name: Some(validate_name(name)?),
            user_limit: None,
        },
        other => ChannelEdit {
            name: None,
            user_limit: next_user_limit(other, snapshot.user_limit),
        },
    };

    platform.update_channel(channel_id, &edit).await?;
    tracing::info!(channel_id = %channel_id, actor = %actor, ?edit, "channel control applied");
    Ok(edit)
}

async fn owner_of(
    platform: &dyn PlatformGateway,
    session: &Session,
    fallback_guild: tv_domain::ids::GuildId,
) -> Result<Option<MemberId>> {
    if let Some(id) = session.creator_metadata.member_id {
        return Ok(Some(id));
    }
    let guild = session.guild_id.unwrap_or(fallback_guild);
    platform.find_member_by_name(guild, &session.created_by).await
}
