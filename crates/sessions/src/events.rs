//! Voice presence events.
//!
//! The connector forwards every raw voice-state change it sees.
//! [`normalize`] reduces one change to the logical events tempvoice acts on
//! and [`VoiceEventHandler`] carries them out against the lifecycle engine
//! and the platform.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use tv_domain::config::ChannelsConfig;
use tv_domain::error::{Error, Result};
use tv_domain::ids::{ChannelId, GuildId, MemberId};
use tv_domain::trace::TraceEvent;

use crate::lifecycle::{EndReason, LifecycleManager, MemberLeft};
use crate::platform::PlatformGateway;
use crate::session::{CreatorMetadata, NewSession};

/// Fallback when no configured name is usable.
const FALLBACK_CHANNEL_NAME: &str = "Voice Channel";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    #[serde(default)]
    pub category_id: Option<ChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub id: MemberId,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// One raw voice-state change: `member` moved from `before` to `after`.
/// `None` on either side means "not in a voice channel".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdate {
    pub guild_id: GuildId,
    pub member: MemberInfo,
    #[serde(default)]
    pub before: Option<ChannelRef>,
    #[serde(default)]
    pub after: Option<ChannelRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    EnteredCreationPoint {
        guild_id: GuildId,
        member: MemberInfo,
        category_id: Option<ChannelId>,
    },
    LeftChannel {
        channel_id: ChannelId,
    },
}

/// Reduce a raw update to logical events, creation first.
pub fn normalize(update: &VoiceStateUpdate, creation_points: &[ChannelId]) -> Vec<VoiceEvent> {
    let mut events = Vec::with_capacity(2);

    if let Some(after) = &update.after {
        if creation_points.contains(&after.id) {
            events.push(VoiceEvent::EnteredCreationPoint {
                guild_id: update.guild_id,
                member: update.member.clone(),
                category_id: after.category_id,
            });
        }
    }

    if let Some(before) = &update.before {
        let moved = update.after.as_ref().map(|a| a.id) != Some(before.id);
        if moved && !creation_points.contains(&before.id) {
            events.push(VoiceEvent::LeftChannel {
                channel_id: before.id,
            });
        }
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handler
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What one update changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HandleReport {
    pub created: Vec<ChannelId>,
    pub closed: Vec<ChannelId>,
    pub deleted: Vec<ChannelId>,
}

pub struct VoiceEventHandler {
    lifecycle: Arc<LifecycleManager>,
    platform: Arc<dyn PlatformGateway>,
    channels: ChannelsConfig,
}

impl VoiceEventHandler {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        platform: Arc<dyn PlatformGateway>,
        channels: ChannelsConfig,
    ) -> Self {
        Self {
            lifecycle,
            platform,
            channels,
        }
    }

    /// Apply every logical event in `update`.
    ///
    /// A failing event does not stop the next one; the first error is
    /// returned once all events were attempted.
    pub async fn handle(&self, update: &VoiceStateUpdate) -> Result<HandleReport> {
        let mut report = HandleReport::default();
        let mut first_err = None;

        for event in normalize(update, &self.channels.creation_points) {
            let outcome = match event {
                VoiceEvent::EnteredCreationPoint {
                    guild_id,
                    member,
                    category_id,
                } => {
                    self.on_entered(guild_id, &member, category_id, &mut report)
                        .await
                }
                VoiceEvent::LeftChannel { channel_id } => {
                    self.on_left(channel_id, &mut report).await
                }
            };
            if let Err(e) = outcome {
                tracing::error!(
                    guild_id = %update.guild_id,
                    member_id = %update.member.id,
                    error = %e,
                    "voice event failed"
                );
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    async fn on_entered(
        &self,
        guild_id: GuildId,
        member: &MemberInfo,
        category_id: Option<ChannelId>,
        report: &mut HandleReport,
    ) -> Result<()> {
        let name = self.pick_name();
        let channel_id = self
            .platform
            .create_voice_channel(guild_id, &name, category_id)
            .await?;
        report.created.push(channel_id);
        TraceEvent::ChannelCreated {
            guild_id: guild_id.get(),
            channel_id: channel_id.get(),
            name: name.clone(),
        }
        .emit();

        let new = NewSession {
            channel_id,
            guild_id: Some(guild_id),
            channel_name: name,
            created_by: member.username.clone(),
            creator_metadata: CreatorMetadata {
                member_id: Some(member.id),
                public_name: member.display_name.clone(),
                username: Some(member.username.clone()),
                avatar_url: member.avatar_url.clone(),
                ..CreatorMetadata::default()
            },
        };
        let started = match self.lifecycle.start_session(new.clone()).await {
            Err(Error::Conflict(msg)) => {
                tracing::warn!(channel_id = %channel_id, "{msg}; newer start wins");
                self.lifecycle.supersede_session(new).await.map(|_| ())
            }
            other => other.map(|_| ()),
        };
        if let Err(e) = started {
            // Nothing durable points at the channel, so it must not outlive this call.
            if self.delete(channel_id, "session could not be recorded").await {
                report.deleted.push(channel_id);
            }
            return Err(e);
        }

        if let Err(e) = self
            .platform
            .move_member(guild_id, member.id, channel_id)
            .await
        {
            tracing::warn!(
                channel_id = %channel_id,
                member_id = %member.id,
                error = %e,
                "creator could not be moved; removing channel"
            );
            if self
                .lifecycle
                .end_session(channel_id, EndReason::CreatorMissing)
                .await?
                .is_some()
            {
                report.closed.push(channel_id);
            }
            if self.delete(channel_id, "creator never joined").await {
                report.deleted.push(channel_id);
            }
            return Ok(());
        }

        if self.channels.control_surface_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.channels.control_surface_delay_ms)).await;
        }

        match self
            .platform
            .attach_control_surface(channel_id, Some(member.id))
            .await
        {
            Ok(()) => TraceEvent::ControlSurfaceAttached {
                channel_id: channel_id.get(),
                owner_resolved: true,
            }
            .emit(),
            Err(e) => tracing::error!(
                channel_id = %channel_id,
                error = %e,
                "failed to attach control surface"
            ),
        }
        Ok(())
    }

    async fn on_left(&self, channel_id: ChannelId, report: &mut HandleReport) -> Result<()> {
        match self
            .lifecycle
            .handle_member_left(channel_id, self.platform.as_ref())
            .await?
        {
            MemberLeft::Emptied(session) => {
                if session.is_some() {
                    report.closed.push(channel_id);
                }
                if self.delete(channel_id, "temporary channel empty").await {
                    report.deleted.push(channel_id);
                }
            }
            MemberLeft::Gone => {
                tracing::info!(
                    channel_id = %channel_id,
                    "managed channel no longer resolves; left for orphan repair"
                );
            }
            MemberLeft::StillOccupied { occupants } => {
                tracing::debug!(channel_id = %channel_id, occupants, "channel still occupied");
            }
            MemberLeft::Unmanaged => {}
        }
        Ok(())
    }

    fn pick_name(&self) -> String {
        let usable: Vec<&String> = self
            .channels
            .default_names
            .iter()
            .filter(|n| !n.trim().is_empty())
            .collect();
        usable
            .choose(&mut rand::thread_rng())
            .map(|n| n.to_string())
            .unwrap_or_else(|| FALLBACK_CHANNEL_NAME.to_string())
    }

    /// Delete a channel, logging instead of failing.
    async fn delete(&self, channel_id: ChannelId, reason: &str) -> bool {
        match self.platform.delete_channel(channel_id, reason).await {
            Ok(()) => {
                TraceEvent::ChannelDeleted {
                    channel_id: channel_id.get(),
                    reason: reason.to_string(),
                }
                .emit();
                true
            }
            Err(e) => {
                tracing::error!(channel_id = %channel_id, error = %e, "failed to delete channel");
                false
            }
        }
    }
}
