//! Startup reconciliation.
//!
//! Runs once, before the gateway accepts any event.  Rebuilds the registry
//! from the store's open sessions, re-attaches control panels to channels
//! that still exist, and leaves guilds outside the allowed set.

use serde::Serialize;

use tv_domain::error::Result;
use tv_domain::ids::{GuildId, MemberId};
use tv_domain::trace::TraceEvent;

use crate::lifecycle::LifecycleManager;
use crate::platform::{GuildInfo, PlatformGateway};
use crate::session::Session;
use crate::store::SessionStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Registry size right after the rebuild.
    pub open_sessions: usize,
    pub resolved: usize,
    /// Open sessions whose channel is gone, left for orphan repair.
    pub unresolved: usize,
    pub surfaces_attached: usize,
    pub guilds_left: usize,
    /// Platform calls that failed and were skipped.
    pub failures: usize,
}

/// Restore in-memory state and repair platform drift.
///
/// Only a store failure while listing open sessions is fatal; every
/// platform failure is logged and counted.
pub async fn reconcile(
    lifecycle: &LifecycleManager,
    platform: &dyn PlatformGateway,
    allowed_guilds: &[GuildId],
) -> Result<ReconcileReport> {
    let open = lifecycle.store().list_open().await?;
    let mut report = ReconcileReport {
        open_sessions: lifecycle.rebuild_registry(&open),
        ..ReconcileReport::default()
    };
    tracing::info!(open_sessions = report.open_sessions, "registry rebuilt from store");

    for session in &open {
        let snapshot = match platform.resolve_channel(session.channel_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(
                    channel_id = %session.channel_id,
                    session_id = %session.id,
                    "open session without a live channel"
                );
                report.unresolved += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(channel_id = %session.channel_id, error = %e, "resolve failed");
                report.failures += 1;
                continue;
            }
        };
        report.resolved += 1;

        let guild_id = session.guild_id.unwrap_or(snapshot.guild_id);
        let owner = resolve_owner(platform, guild_id, session).await;
        match platform
            .attach_control_surface(session.channel_id, owner)
            .await
        {
            Ok(()) => {
                report.surfaces_attached += 1;
                TraceEvent::ControlSurfaceAttached {
                    channel_id: session.channel_id.get(),
                    owner_resolved: owner.is_some(),
                }
                .emit();
            }
            Err(e) => {
                tracing::warn!(
                    channel_id = %session.channel_id,
                    error = %e,
                    "failed to re-attach control surface"
                );
                report.failures += 1;
            }
        }
    }

    match platform.list_guilds().await {
        Ok(guilds) => {
            for guild in guilds {
                match enforce_guild_allowed(platform, allowed_guilds, &guild).await {
                    Ok(true) => report.guilds_left += 1,
                    Ok(false) => {}
                    Err(_) => report.failures += 1,
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not list guilds");
            report.failures += 1;
        }
    }

    tracing::info!(
        open_sessions = report.open_sessions,
        resolved = report.resolved,
        unresolved = report.unresolved,
        guilds_left = report.guilds_left,
        failures = report.failures,
        "reconciliation complete"
    );
    Ok(report)
}

/// Leave `guild` unless it is allowed.  Returns whether the bot left.
pub async fn enforce_guild_allowed(
    platform: &dyn PlatformGateway,
    allowed: &[GuildId],
    guild: &GuildInfo,
) -> Result<bool> {
    if allowed.contains(&guild.id) {
        tracing::info!(guild_id = %guild.id, name = %guild.name, "authorized guild");
        return Ok(false);
    }

    tracing::info!(guild_id = %guild.id, name = %guild.name, "leaving unauthorized guild");
    if let Err(e) = platform.leave_guild(guild.id).await {
        tracing::warn!(guild_id = %guild.id, error = %e, "failed to leave guild");
        return Err(e);
    }
    TraceEvent::GuildLeft {
        guild_id: guild.id.get(),
        name: guild.name.clone(),
    }
    .emit();
    Ok(true)
}

/// The creator's member id, recorded at creation or looked up by username.
async fn resolve_owner(
    platform: &dyn PlatformGateway,
    guild_id: GuildId,
    session: &Session,
) -> Option<MemberId> {
    if let Some(id) = session.creator_metadata.member_id {
        return Some(id);
    }
    match platform.find_member_by_name(guild_id, &session.created_by).await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(created_by = %session.created_by, error = %e, "owner lookup failed");
            None
        }
    }
}
