//! Durable session storage.
//!
//! [`SessionStore`] is the only contract the lifecycle engine has with
//! persistence.  [`JsonSessionStore`] is the bundled engine: every record is
//! held in memory and the full set is rewritten to
//! `<state_path>/sessions/voice_sessions.json` after each mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use tv_domain::error::{Error, Result};
use tv_domain::ids::{ChannelId, SessionId};

use crate::session::{NewSession, Session};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store contract
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persistence operations over [`Session`] records.
///
/// The store does not enforce one open session per channel; the
/// [`LifecycleManager`](crate::LifecycleManager) does.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new open record.
    async fn create_session(&self, new: NewSession, now: DateTime<Utc>) -> Result<Session>;

    /// Bump `last_active_at` of the open session for `channel_id`.
    /// Returns `false` when the channel has no open session.
    async fn update_activity(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Result<bool>;

    /// Close the open session for `channel_id`.  `None` when there is none.
    async fn end_session(
        &self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>>;

    async fn find_open(&self, channel_id: ChannelId) -> Result<Option<Session>>;

    async fn list_open(&self) -> Result<Vec<Session>>;

    /// Ended sessions that lasted strictly less than `threshold`.
    async fn list_ended_below_duration(&self, threshold: Duration) -> Result<Vec<Session>>;

    /// Ended sessions, longest first.
    async fn list_top_by_duration(&self, limit: usize) -> Result<Vec<Session>>;

    /// Delete records by id.  Returns how many existed.
    async fn delete_sessions(&self, ids: &[SessionId]) -> Result<usize>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// JSON file store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type SessionMap = HashMap<SessionId, Session>;

/// Session store backed by a JSON file.
///
/// Mutations are staged on a copy of the map, written to disk, and only
/// then swapped in, so memory never runs ahead of what was persisted.
pub struct JsonSessionStore {
    sessions_path: Option<PathBuf>,
    sessions: RwLock<SessionMap>,
}

impl JsonSessionStore {
    /// Load or create the store at `state_path/sessions/voice_sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("voice_sessions.json");
        let sessions = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            let list: Vec<Session> = serde_json::from_str(&raw).map_err(|e| {
                Error::Store(format!("parsing {}: {e}", sessions_path.display()))
            })?;
            list.into_iter().map(|s| (s.id, s)).collect()
        } else {
            HashMap::new()
        };

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path: Some(sessions_path),
            sessions: RwLock::new(sessions),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            sessions_path: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.sessions_path.as_deref()
    }

    /// Apply `f` to a staged copy, persist it, then commit.  `f` returns
    /// `None` when nothing changed, which skips the write.
    async fn mutate<T>(&self, f: impl FnOnce(&mut SessionMap) -> Option<T>) -> Result<Option<T>> {
        let mut guard = self.sessions.write().await;
        let mut staged = guard.clone();
        let Some(out) = f(&mut staged) else {
            return Ok(None);
        };
        self.persist(&staged).await?;
        *guard = staged;
        Ok(Some(out))
    }

    async fn persist(&self, map: &SessionMap) -> Result<()> {
        let Some(path) = self.sessions_path.clone() else {
            return Ok(());
        };

        let mut list: Vec<&Session> = map.values().collect();
        list.sort_by_key(|s| (s.created_at, s.id));
        let json = serde_json::to_string_pretty(&list)
            .map_err(|e| Error::Store(format!("serializing sessions: {e}")))?;

        // Write to a sibling temp file, then rename over the target so a
        // crash mid-write never leaves a truncated store behind.
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, json)?;
            std::fs::rename(&tmp, &path)
        })
        .await
        .map_err(|e| Error::Store(format!("persist task failed: {e}")))?
        .map_err(|e| Error::Store(format!("writing sessions: {e}")))
    }
}

fn open_for(map: &mut SessionMap, channel_id: ChannelId) -> Option<&mut Session> {
    map.values_mut()
        .find(|s| s.channel_id == channel_id && s.is_open())
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn create_session(&self, new: NewSession, now: DateTime<Utc>) -> Result<Session> {
        let session = Session::open(uuid::Uuid::new_v4(), new, now);
        let created = session.clone();
        self.mutate(move |map| {
            map.insert(session.id, session);
            Some(())
        })
        .await?;
        Ok(created)
    }

    async fn update_activity(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Result<bool> {
        let touched = self
            .mutate(|map| open_for(map, channel_id).map(|s| s.touch(now)))
            .await?;
        Ok(touched.unwrap_or(false))
    }

    async fn end_session(
        &self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        self.mutate(|map| {
            let session = open_for(map, channel_id)?;
            session.close(now);
            Some(session.clone())
        })
        .await
    }

    async fn find_open(&self, channel_id: ChannelId) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.channel_id == channel_id && s.is_open())
            .cloned())
    }

    async fn list_open(&self) -> Result<Vec<Session>> {
        let mut open: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_open())
            .cloned()
            .collect();
        open.sort_by_key(|s| s.created_at);
        Ok(open)
    }

    async fn list_ended_below_duration(&self, threshold: Duration) -> Result<Vec<Session>> {
        let now = Utc::now();
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_ended && s.duration(now) < threshold)
            .cloned()
            .collect())
    }

    async fn list_top_by_duration(&self, limit: usize) -> Result<Vec<Session>> {
        let now = Utc::now();
        let mut ended: Vec<Session> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_ended)
            .cloned()
            .collect();
        ended.sort_by(|a, b| b.duration(now).cmp(&a.duration(now)));
        ended.truncate(limit);
        Ok(ended)
    }

    async fn delete_sessions(&self, ids: &[SessionId]) -> Result<usize> {
        let removed = self
            .mutate(|map| {
                let n = ids.iter().filter(|id| map.remove(id).is_some()).count();
                (n > 0).then_some(n)
            })
            .await?;
        Ok(removed.unwrap_or(0))
    }
}
