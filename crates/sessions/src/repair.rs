//! Administrative repair operations.
//!
//! Each sweep is a loop of independent, idempotent steps: stopping halfway
//! and running it again converges to the same state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use tv_domain::error::Result;
use tv_domain::ids::{ChannelId, SessionId};
use tv_domain::trace::TraceEvent;

use crate::lifecycle::{EmptyCheck, EndReason, LifecycleManager};
use crate::platform::PlatformGateway;
use crate::store::SessionStore;

/// Summary of one repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    /// Items repaired.
    pub count: usize,
    /// Items that failed and were skipped.
    pub failed: usize,
    pub message: String,
}

impl RepairOutcome {
    fn finish(operation: &str, count: usize, failed: usize, message: String) -> Self {
        TraceEvent::RepairCompleted {
            operation: operation.to_string(),
            count,
            failed,
        }
        .emit();
        Self {
            count,
            failed,
            message,
        }
    }
}

/// One row of the longest-sessions ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedSession {
    pub rank: usize,
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    pub channel_name: String,
    /// Creator's public name, or their username.
    pub created_by: String,
    pub duration_secs: i64,
    pub duration_pretty: String,
}

pub struct Maintenance {
    lifecycle: Arc<LifecycleManager>,
    platform: Arc<dyn PlatformGateway>,
    top_limit_max: usize,
}

impl Maintenance {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        platform: Arc<dyn PlatformGateway>,
        top_limit_max: usize,
    ) -> Self {
        Self {
            lifecycle,
            platform,
            top_limit_max: top_limit_max.max(1),
        }
    }

    /// Delete ended sessions shorter than `threshold_secs`.  Open sessions
    /// and the registry are never touched.  Thresholds beyond what a
    /// duration can hold cover every ended session.
    pub async fn clean_up_short_sessions(&self, threshold_secs: u64) -> Result<RepairOutcome> {
        const OP: &str = "clean_up_short_sessions";
        let threshold = i64::try_from(threshold_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let store = self.lifecycle.store();

        let short = match store.list_ended_below_duration(threshold).await {
            Ok(short) => short,
            Err(e) => {
                tracing::warn!(error = %e, "listing short sessions failed");
                return Ok(RepairOutcome::finish(
                    OP,
                    0,
                    1,
                    format!("Could not list sessions shorter than {threshold_secs}s: {e}"),
                ));
            }
        };
        if short.is_empty() {
            return Ok(RepairOutcome::finish(
                OP,
                0,
                0,
                format!("No sessions shorter than {threshold_secs}s to clean up."),
            ));
        }

        let ids: Vec<SessionId> = short.iter().map(|s| s.id).collect();
        let (deleted, failed) = match store.delete_sessions(&ids).await {
            Ok(deleted) => (deleted, 0),
            Err(e) => {
                tracing::warn!(error = %e, sessions = ids.len(), "deleting short sessions failed");
                (0, ids.len())
            }
        };
        tracing::info!(deleted, failed, threshold_secs, "short sessions cleaned up");

        let message = match failed {
            0 => format!("Deleted {deleted} session(s) shorter than {threshold_secs}s."),
            f => format!("Deleted {deleted} session(s) shorter than {threshold_secs}s; {f} failed."),
        };
        Ok(RepairOutcome::finish(OP, deleted, failed, message))
    }

    /// Close and delete every managed channel that has nobody in it.
    pub async fn close_empty_managed_resources(&self) -> Result<RepairOutcome> {
        let (mut count, mut failed) = (0, 0);

        for channel_id in self.lifecycle.registry().snapshot() {
            match self
                .lifecycle
                .close_if_empty(channel_id, self.platform.as_ref())
                .await
            {
                // A delete failure leaves the session closed and the entry
                // dropped; the channel itself counts as failed.
                Ok(EmptyCheck::Emptied(_)) => {
                    match self
                        .platform
                        .delete_channel(channel_id, "temporary channel empty")
                        .await
                    {
                        Ok(()) => {
                            count += 1;
                            TraceEvent::ChannelDeleted {
                                channel_id: channel_id.get(),
                                reason: "empty-channel cleanup".into(),
                            }
                            .emit();
                        }
                        Err(e) => {
                            tracing::warn!(channel_id = %channel_id, error = %e, "delete failed");
                            failed += 1;
                        }
                    }
                }
                Ok(EmptyCheck::Occupied { .. }) => {}
                Ok(EmptyCheck::Gone) => {
                    tracing::debug!(channel_id = %channel_id, "channel gone; skipped");
                }
                Err(e) => {
                    tracing::warn!(channel_id = %channel_id, error = %e, "close failed");
                    failed += 1;
                }
            }
        }
        self.lifecycle.prune_locks();

        let message = match (count, failed) {
            (0, 0) => "No empty temporary channels found.".to_string(),
            (n, 0) => format!("Closed {n} empty temporary channel(s)."),
            (n, f) => format!("Closed {n} empty temporary channel(s); {f} failed."),
        };
        Ok(RepairOutcome::finish(
            "close_empty_managed_resources",
            count,
            failed,
            message,
        ))
    }

    /// End open sessions whose channel no longer exists.
    pub async fn repair_orphaned_sessions(&self) -> Result<RepairOutcome> {
        const OP: &str = "repair_orphaned_sessions";
        let (mut count, mut failed) = (0, 0);

        let open = match self.lifecycle.store().list_open().await {
            Ok(open) => open,
            Err(e) => {
                tracing::warn!(error = %e, "listing open sessions failed");
                return Ok(RepairOutcome::finish(
                    OP,
                    0,
                    1,
                    format!("Could not list open sessions: {e}"),
                ));
            }
        };

        for session in open {
            let channel_id = session.channel_id;
            match self.platform.resolve_channel(channel_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(channel_id = %channel_id, error = %e, "resolve failed");
                    failed += 1;
                    continue;
                }
            }

            match self
                .lifecycle
                .end_session(channel_id, EndReason::Orphaned)
                .await
            {
                Ok(ended) => {
                    if ended.is_some() {
                        count += 1;
                    }
                    if let Err(e) = self.lifecycle.discard(channel_id).await {
                        tracing::warn!(channel_id = %channel_id, error = %e, "registry discard failed");
                        failed += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(channel_id = %channel_id, error = %e, "orphan close failed");
                    failed += 1;
                }
            }
        }
        self.lifecycle.prune_locks();

        let message = match (count, failed) {
            (0, 0) => "No orphaned sessions found.".to_string(),
            (n, 0) => format!("Closed {n} orphaned session(s)."),
            (n, f) => format!("Closed {n} orphaned session(s); {f} failed."),
        };
        Ok(RepairOutcome::finish(OP, count, failed, message))
    }

    /// Longest ended sessions.  `limit` is clamped to `1..=top_limit_max`.
    pub async fn top_sessions(&self, limit: usize) -> Result<Vec<RankedSession>> {
        let limit = limit.clamp(1, self.top_limit_max);
        let now = Utc::now();
        let sessions = self.lifecycle.store().list_top_by_duration(limit).await?;

        Ok(sessions
            .into_iter()
            .enumerate()
            .map(|(i, s)| RankedSession {
                rank: i + 1,
                session_id: s.id,
                channel_id: s.channel_id,
                created_by: s.display_name().to_string(),
                duration_secs: s.duration(now).num_seconds(),
                duration_pretty: s.duration_pretty(now),
                channel_name: s.channel_name,
            })
            .collect())
    }
}
