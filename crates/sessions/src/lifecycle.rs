//! Session lifecycle: start → activity → end, one channel at a time.
//!
//! ```text
//! NoSession ──start──► Open ──end──► Closed
//!                      │  ▲
//!                      └──┘ activity
//! ```
//!
//! Every transition holds the channel's lock from [`ChannelLockMap`] for the
//! whole store round-trip.  The registry is only updated after the store
//! write succeeded, so it never claims a channel the store does not.

use std::sync::Arc;

use chrono::Utc;

use tv_domain::error::{Error, Result};
use tv_domain::ids::ChannelId;
use tv_domain::trace::TraceEvent;

use crate::lock::ChannelLockMap;
use crate::platform::PlatformGateway;
use crate::registry::EphemeralRegistry;
use crate::session::{NewSession, Session};
use crate::store::SessionStore;

/// Why a session was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The last member left the channel.
    Emptied,
    /// The creator was never moved into the new channel.
    CreatorMissing,
    /// Closed by the empty-channel sweep.
    Cleanup,
    /// The channel no longer exists on the platform.
    Orphaned,
    /// A newer start for the same channel replaced it.
    Superseded,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Emptied => write!(f, "channel emptied"),
            Self::CreatorMissing => write!(f, "creator never joined"),
            Self::Cleanup => write!(f, "empty-channel cleanup"),
            Self::Orphaned => write!(f, "channel no longer exists"),
            Self::Superseded => write!(f, "superseded by a newer start"),
        }
    }
}

/// Result of [`LifecycleManager::handle_member_left`].
#[derive(Debug, Clone, PartialEq)]
pub enum MemberLeft {
    /// Not a temporary channel.  Activity was still recorded if a session
    /// happened to be open.
    Unmanaged,
    StillOccupied { occupants: usize },
    /// Nobody is left.  The session (if one was open) is durably closed and
    /// the channel may now be deleted.
    Emptied(Option<Session>),
    /// The channel did not resolve on the platform; its session stays open
    /// for orphan repair.
    Gone,
}

/// Result of [`LifecycleManager::close_if_empty`].
#[derive(Debug, Clone, PartialEq)]
pub enum EmptyCheck {
    Occupied { occupants: usize },
    Emptied(Option<Session>),
    Gone,
}

/// Owns the session transitions and the [`EphemeralRegistry`].
pub struct LifecycleManager {
    store: Arc<dyn SessionStore>,
    registry: EphemeralRegistry,
    locks: ChannelLockMap,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            registry: EphemeralRegistry::new(),
            locks: ChannelLockMap::new(),
        }
    }

    /// Read-only view of the registry.
    pub fn registry(&self) -> &EphemeralRegistry {
        &self.registry
    }

    /// The backing store, for read-only queries.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn is_managed(&self, channel_id: ChannelId) -> bool {
        self.registry.contains(channel_id)
    }

    /// Open a session for a freshly created channel.
    ///
    /// Fails with [`Error::Conflict`] and writes nothing when the channel
    /// already has an open session.
    pub async fn start_session(&self, new: NewSession) -> Result<Session> {
        let channel_id = new.channel_id;
        let _permit = self.locks.acquire(channel_id).await?;

        if let Some(existing) = self.store.find_open(channel_id).await? {
            return Err(Error::Conflict(format!(
                "channel {channel_id} already has open session {}",
                existing.id
            )));
        }

        let session = self.store.create_session(new, Utc::now()).await?;
        self.registry.add(channel_id);

        TraceEvent::SessionStarted {
            session_id: session.id.to_string(),
            channel_id: channel_id.get(),
            channel_name: session.channel_name.clone(),
            created_by: session.created_by.clone(),
        }
        .emit();

        Ok(session)
    }

    /// Open a session for `new`, closing any session still open on the
    /// channel first.  Returns the new record and the one it replaced.
    ///
    /// This is the recovery path after [`start_session`] reported a
    /// conflict: the newer start wins.
    ///
    /// [`start_session`]: Self::start_session
    pub async fn supersede_session(&self, new: NewSession) -> Result<(Session, Option<Session>)> {
        let channel_id = new.channel_id;
        let _permit = self.locks.acquire(channel_id).await?;

        let stale = self.end_locked(channel_id, EndReason::Superseded).await?;
        if let Some(stale) = &stale {
            tracing::warn!(
                channel_id = %channel_id,
                stale_session = %stale.id,
                "stale open session superseded"
            );
        }

        let session = self.store.create_session(new, Utc::now()).await?;
        self.registry.add(channel_id);

        TraceEvent::SessionStarted {
            session_id: session.id.to_string(),
            channel_id: channel_id.get(),
            channel_name: session.channel_name.clone(),
            created_by: session.created_by.clone(),
        }
        .emit();

        Ok((session, stale))
    }

    /// Bump `last_active_at`.  Returns `false` for channels without an open
    /// session; that is the normal case for ordinary voice channels.
    pub async fn record_activity(&self, channel_id: ChannelId) -> Result<bool> {
        let _permit = self.locks.acquire(channel_id).await?;
        self.store.update_activity(channel_id, Utc::now()).await
    }

    /// Close the channel's open session.  Idempotent: returns `Ok(None)`
    /// without touching the registry when nothing is open.
    pub async fn end_session(
        &self,
        channel_id: ChannelId,
        reason: EndReason,
    ) -> Result<Option<Session>> {
        let _permit = self.locks.acquire(channel_id).await?;
        self.end_locked(channel_id, reason).await
    }

    /// A member left `channel_id`.  Records activity first, then checks the
    /// channel's current occupancy and closes the session once it is empty.
    pub async fn handle_member_left(
        &self,
        channel_id: ChannelId,
        platform: &dyn PlatformGateway,
    ) -> Result<MemberLeft> {
        let _permit = self.locks.acquire(channel_id).await?;

        let recorded = self.store.update_activity(channel_id, Utc::now()).await?;
        tracing::debug!(channel_id = %channel_id, recorded, "member left channel");

        if !self.registry.contains(channel_id) {
            return Ok(MemberLeft::Unmanaged);
        }

        Ok(match self.check_empty_locked(channel_id, platform, EndReason::Emptied).await? {
            EmptyCheck::Occupied { occupants } => MemberLeft::StillOccupied { occupants },
            EmptyCheck::Emptied(session) => MemberLeft::Emptied(session),
            EmptyCheck::Gone => MemberLeft::Gone,
        })
    }

    /// Close the session if the channel currently has nobody in it.
    pub async fn close_if_empty(
        &self,
        channel_id: ChannelId,
        platform: &dyn PlatformGateway,
    ) -> Result<EmptyCheck> {
        let _permit = self.locks.acquire(channel_id).await?;
        self.check_empty_locked(channel_id, platform, EndReason::Cleanup)
            .await
    }

    /// Drop a registry entry without touching the store.  Used once the
    /// channel is known to be gone or deleted.
    pub async fn discard(&self, channel_id: ChannelId) -> Result<bool> {
        let _permit = self.locks.acquire(channel_id).await?;
        Ok(self.registry.remove(channel_id))
    }

    /// Replace the registry with the channels of `open` sessions.
    pub fn rebuild_registry(&self, open: &[Session]) -> usize {
        self.registry.rebuild(open.iter().map(|s| s.channel_id));
        let count = self.registry.len();
        TraceEvent::RegistryRebuilt {
            open_sessions: count,
        }
        .emit();
        count
    }

    /// Forget lock entries for channels nobody is working on.
    pub fn prune_locks(&self) {
        self.locks.prune_idle();
    }

    // ── lock-held helpers ────────────────────────────────────────────

    async fn end_locked(
        &self,
        channel_id: ChannelId,
        reason: EndReason,
    ) -> Result<Option<Session>> {
        let Some(session) = self.store.end_session(channel_id, Utc::now()).await? else {
            return Ok(None);
        };
        self.registry.remove(channel_id);

        TraceEvent::SessionEnded {
            session_id: session.id.to_string(),
            channel_id: channel_id.get(),
            duration_secs: session.duration(Utc::now()).num_seconds(),
            reason: reason.to_string(),
        }
        .emit();

        Ok(Some(session))
    }

    async fn check_empty_locked(
        &self,
        channel_id: ChannelId,
        platform: &dyn PlatformGateway,
        reason: EndReason,
    ) -> Result<EmptyCheck> {
        let Some(snapshot) = platform.resolve_channel(channel_id).await? else {
            return Ok(EmptyCheck::Gone);
        };
        if snapshot.occupants > 0 {
            return Ok(EmptyCheck::Occupied {
                occupants: snapshot.occupants,
            });
        }

        let session = self.end_locked(channel_id, reason).await?;
        if session.is_none() && self.registry.remove(channel_id) {
            tracing::warn!(
                channel_id = %channel_id,
                "managed channel had no open session; registry entry dropped"
            );
        }
        Ok(EmptyCheck::Emptied(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_session, FakePlatform, RecordingStore};
    use tv_domain::ids::GuildId;

    fn manager(store: Arc<RecordingStore>) -> LifecycleManager {
        LifecycleManager::new(store)
    }

    #[tokio::test]
    async fn start_registers_channel() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());

        let s = lm.start_session(new_session(42)).await.unwrap();
        assert!(s.is_open());
        assert!(lm.is_managed(ChannelId(42)));
        assert_eq!(store.open_count(ChannelId(42)).await, 1);
    }

    #[tokio::test]
    async fn duplicate_start_is_a_conflict() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());

        lm.start_session(new_session(42)).await.unwrap();
        let err = lm.start_session(new_session(42)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.open_count(ChannelId(42)).await, 1);
    }

    #[tokio::test]
    async fn supersede_replaces_the_open_session() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());

        let stale = lm.start_session(new_session(42)).await.unwrap();
        let mut newer = new_session(42);
        newer.created_by = "bob".into();
        newer.creator_metadata.member_id = Some(tv_domain::ids::MemberId(600));

        let (session, replaced) = lm.supersede_session(newer).await.unwrap();
        assert_eq!(replaced.map(|s| s.id), Some(stale.id));
        assert_eq!(store.open_count(ChannelId(42)).await, 1);
        let open = store.find_open(ChannelId(42)).await.unwrap().unwrap();
        assert_eq!(open.id, session.id);
        assert_eq!(open.created_by, "bob");
        assert!(lm.is_managed(ChannelId(42)));
    }

    #[tokio::test]
    async fn supersede_without_open_session_just_starts() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());

        let (_, replaced) = lm.supersede_session(new_session(42)).await.unwrap();
        assert!(replaced.is_none());
        assert!(lm.is_managed(ChannelId(42)));
    }

    #[tokio::test]
    async fn concurrent_starts_leave_one_open_session() {
        let store = Arc::new(RecordingStore::new());
        store.set_delay_ms(20);
        let lm = Arc::new(manager(store.clone()));

        let a = tokio::spawn({
            let lm = lm.clone();
            async move { lm.start_session(new_session(7)).await }
        });
        let b = tokio::spawn({
            let lm = lm.clone();
            async move { lm.start_session(new_session(7)).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::Conflict(_)))));
        assert_eq!(store.open_count(ChannelId(7)).await, 1);
    }

    #[tokio::test]
    async fn end_twice_returns_record_then_none() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        lm.start_session(new_session(42)).await.unwrap();

        let first = lm.end_session(ChannelId(42), EndReason::Emptied).await.unwrap();
        let first = first.expect("closed record");
        assert!(first.is_ended);
        assert!(first.ended_at.is_some());
        assert!(!lm.is_managed(ChannelId(42)));

        let second = lm.end_session(ChannelId(42), EndReason::Emptied).await.unwrap();
        assert!(second.is_none());
        assert_eq!(store.count_calls("end_session").await, 2);
    }

    #[tokio::test]
    async fn end_without_session_leaves_registry_alone() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        lm.start_session(new_session(1)).await.unwrap();

        let ended = lm.end_session(ChannelId(99), EndReason::Emptied).await.unwrap();
        assert!(ended.is_none());
        assert_eq!(lm.registry().snapshot(), vec![ChannelId(1)]);
    }

    #[tokio::test]
    async fn activity_on_unknown_channel_is_not_an_error() {
        let lm = manager(Arc::new(RecordingStore::new()));
        assert!(!lm.record_activity(ChannelId(5)).await.unwrap());
    }

    #[tokio::test]
    async fn restart_after_close_opens_a_new_record() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        let first = lm.start_session(new_session(42)).await.unwrap();
        lm.end_session(ChannelId(42), EndReason::Emptied).await.unwrap();

        let second = lm.start_session(new_session(42)).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.open_count(ChannelId(42)).await, 1);
    }

    #[tokio::test]
    async fn member_left_records_activity_before_closing() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        let platform = FakePlatform::new();
        let created = lm.start_session(new_session(42)).await.unwrap();
        platform.add_channel(ChannelId(42), GuildId(1), 0);
        store.clear_calls().await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let outcome = lm.handle_member_left(ChannelId(42), &platform).await.unwrap();

        let MemberLeft::Emptied(Some(closed)) = outcome else {
            panic!("expected the session to close, got {outcome:?}");
        };
        assert!(closed.last_active_at > created.last_active_at);
        assert!(closed.ended_at.is_some_and(|e| e >= closed.last_active_at));
        assert_eq!(store.calls().await, vec!["update_activity", "end_session"]);
        assert!(!lm.is_managed(ChannelId(42)));
    }

    #[tokio::test]
    async fn member_left_occupied_channel_stays_open() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        let platform = FakePlatform::new();
        lm.start_session(new_session(42)).await.unwrap();
        platform.add_channel(ChannelId(42), GuildId(1), 2);

        let outcome = lm.handle_member_left(ChannelId(42), &platform).await.unwrap();
        assert_eq!(outcome, MemberLeft::StillOccupied { occupants: 2 });
        assert!(lm.is_managed(ChannelId(42)));
    }

    #[tokio::test]
    async fn member_left_unmanaged_channel_never_probes_platform() {
        let lm = manager(Arc::new(RecordingStore::new()));
        let platform = FakePlatform::new();
        platform.add_channel(ChannelId(3), GuildId(1), 0);

        let outcome = lm.handle_member_left(ChannelId(3), &platform).await.unwrap();
        assert_eq!(outcome, MemberLeft::Unmanaged);
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn store_failure_on_close_keeps_registry_entry() {
        let store = Arc::new(RecordingStore::new());
        let lm = manager(store.clone());
        let platform = FakePlatform::new();
        lm.start_session(new_session(42)).await.unwrap();
        platform.add_channel(ChannelId(42), GuildId(1), 0);
        store.fail_end(true);

        let err = lm.handle_member_left(ChannelId(42), &platform).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(lm.is_managed(ChannelId(42)));
        assert_eq!(store.open_count(ChannelId(42)).await, 1);
    }

    #[tokio::test]
    async fn store_failure_on_start_registers_nothing() {
        let store = Arc::new(RecordingStore::new());
        store.fail_create(true);
        let lm = manager(store.clone());

        assert!(lm.start_session(new_session(42)).await.is_err());
        assert!(!lm.is_managed(ChannelId(42)));
    }
}
