//! Hand-written fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use tv_domain::error::{Error, Result};
use tv_domain::ids::{ChannelId, GuildId, MemberId, SessionId};

use crate::platform::{ChannelEdit, ChannelSnapshot, GuildInfo, PlatformGateway};
use crate::session::{CreatorMetadata, NewSession, Session};
use crate::store::{JsonSessionStore, SessionStore};

pub fn new_session(channel: u64) -> NewSession {
    NewSession {
        channel_id: ChannelId(channel),
        guild_id: Some(GuildId(1)),
        channel_name: format!("vc-{channel}"),
        created_by: "alice".into(),
        creator_metadata: CreatorMetadata {
            member_id: Some(MemberId(500)),
            public_name: Some("Alice".into()),
            username: Some("alice".into()),
            ..CreatorMetadata::default()
        },
    }
}

// ── Store ────────────────────────────────────────────────────────────

/// In-memory store that records call order and can be told to fail.
pub struct RecordingStore {
    inner: JsonSessionStore,
    calls: Mutex<Vec<&'static str>>,
    fail_create: AtomicBool,
    fail_end: AtomicBool,
    fail_list: AtomicBool,
    fail_delete: AtomicBool,
    delay_ms: AtomicU64,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: JsonSessionStore::in_memory(),
            calls: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
            fail_end: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
        }
    }

    pub fn fail_create(&self, on: bool) {
        self.fail_create.store(on, Ordering::SeqCst);
    }

    pub fn fail_end(&self, on: bool) {
        self.fail_end.store(on, Ordering::SeqCst);
    }

    /// Fails `list_open` and `list_ended_below_duration`.
    pub fn fail_list(&self, on: bool) {
        self.fail_list.store(on, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, on: bool) {
        self.fail_delete.store(on, Ordering::SeqCst);
    }

    /// Sleep inside every read and write, widening race windows.
    pub fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub async fn count_calls(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }

    pub async fn open_count(&self, channel_id: ChannelId) -> usize {
        self.inner
            .list_open()
            .await
            .map(|open| open.iter().filter(|s| s.channel_id == channel_id).count())
            .unwrap_or(0)
    }

    /// Insert an already-closed record with the given lifetime.
    pub async fn insert_ended(&self, channel: u64, lifetime: Duration) -> Session {
        let now = Utc::now();
        self.inner
            .create_session(new_session(channel), now - lifetime)
            .await
            .unwrap();
        self.inner
            .end_session(ChannelId(channel), now)
            .await
            .unwrap()
            .unwrap()
    }

    async fn enter(&self, name: &'static str) {
        self.calls.lock().push(name);
        let ms = self.delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(StdDuration::from_millis(ms)).await;
        }
    }
}

fn injected(op: &str) -> Error {
    Error::Store(format!("injected {op} failure"))
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create_session(&self, new: NewSession, now: DateTime<Utc>) -> Result<Session> {
        self.enter("create_session").await;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(injected("create"));
        }
        self.inner.create_session(new, now).await
    }

    async fn update_activity(&self, channel_id: ChannelId, now: DateTime<Utc>) -> Result<bool> {
        self.enter("update_activity").await;
        self.inner.update_activity(channel_id, now).await
    }

    async fn end_session(
        &self,
        channel_id: ChannelId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>> {
        self.enter("end_session").await;
        if self.fail_end.load(Ordering::SeqCst) {
            return Err(injected("end"));
        }
        self.inner.end_session(channel_id, now).await
    }

    async fn find_open(&self, channel_id: ChannelId) -> Result<Option<Session>> {
        self.enter("find_open").await;
        self.inner.find_open(channel_id).await
    }

    async fn list_open(&self) -> Result<Vec<Session>> {
        self.enter("list_open").await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        self.inner.list_open().await
    }

    async fn list_ended_below_duration(&self, threshold: Duration) -> Result<Vec<Session>> {
        self.enter("list_ended_below_duration").await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(injected("list"));
        }
        self.inner.list_ended_below_duration(threshold).await
    }

    async fn list_top_by_duration(&self, limit: usize) -> Result<Vec<Session>> {
        self.enter("list_top_by_duration").await;
        self.inner.list_top_by_duration(limit).await
    }

    async fn delete_sessions(&self, ids: &[SessionId]) -> Result<usize> {
        self.enter("delete_sessions").await;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        self.inner.delete_sessions(ids).await
    }
}

// ── Platform ─────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    channels: HashMap<ChannelId, ChannelSnapshot>,
    guilds: Vec<GuildInfo>,
    members: HashMap<(GuildId, String), MemberId>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
    next_channel: u64,
}

/// A platform that keeps channels and guilds in memory.
///
/// Every call is logged as `op:args`; `fail_on("move")` etc. makes that
/// operation return `ExternalResource`.
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_channel: 1000,
                ..FakeState::default()
            }),
        }
    }

    pub fn add_channel(&self, id: ChannelId, guild_id: GuildId, occupants: usize) {
        self.state.lock().channels.insert(
            id,
            ChannelSnapshot {
                id,
                guild_id,
                name: format!("vc-{id}"),
                occupants,
                user_limit: 0,
            },
        );
    }

    pub fn set_occupants(&self, id: ChannelId, occupants: usize) {
        if let Some(ch) = self.state.lock().channels.get_mut(&id) {
            ch.occupants = occupants;
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<ChannelSnapshot> {
        self.state.lock().channels.get(&id).cloned()
    }

    pub fn has_channel(&self, id: ChannelId) -> bool {
        self.state.lock().channels.contains_key(&id)
    }

    pub fn add_guild(&self, id: u64, name: &str) {
        self.state.lock().guilds.push(GuildInfo {
            id: GuildId(id),
            name: name.into(),
        });
    }

    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.state.lock().guilds.iter().map(|g| g.id).collect()
    }

    pub fn add_member(&self, guild_id: GuildId, name: &str, id: MemberId) {
        self.state
            .lock()
            .members
            .insert((guild_id, name.to_string()), id);
    }

    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Calls whose operation name is `op`.
    pub fn calls_to(&self, op: &str) -> Vec<String> {
        let prefix = format!("{op}:");
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| *c == op || c.starts_with(&prefix))
            .cloned()
            .collect()
    }

    fn record(&self, op: &'static str, args: String) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(format!("{op}:{args}"));
        if state.failing.contains(op) {
            return Err(Error::ExternalResource(format!("{op} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformGateway for FakePlatform {
    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        _category_id: Option<ChannelId>,
    ) -> Result<ChannelId> {
        self.record("create", format!("{guild_id}:{name}"))?;
        let mut state = self.state.lock();
        state.next_channel += 1;
        let id = ChannelId(state.next_channel);
        state.channels.insert(
            id,
            ChannelSnapshot {
                id,
                guild_id,
                name: name.to_string(),
                occupants: 0,
                user_limit: 0,
            },
        );
        Ok(id)
    }

    async fn delete_channel(&self, channel_id: ChannelId, _reason: &str) -> Result<()> {
        self.record("delete", channel_id.to_string())?;
        self.state.lock().channels.remove(&channel_id);
        Ok(())
    }

    async fn move_member(
        &self,
        _guild_id: GuildId,
        member_id: MemberId,
        channel_id: ChannelId,
    ) -> Result<()> {
        self.record("move", format!("{member_id}:{channel_id}"))?;
        match self.state.lock().channels.get_mut(&channel_id) {
            Some(ch) => {
                ch.occupants += 1;
                Ok(())
            }
            None => Err(Error::ExternalResource(format!("no channel {channel_id}"))),
        }
    }

    async fn attach_control_surface(
        &self,
        channel_id: ChannelId,
        owner: Option<MemberId>,
    ) -> Result<()> {
        let owner = owner.map_or_else(|| "none".to_string(), |m| m.to_string());
        self.record("attach", format!("{channel_id}:{owner}"))
    }

    async fn resolve_channel(&self, channel_id: ChannelId) -> Result<Option<ChannelSnapshot>> {
        self.record("resolve", channel_id.to_string())?;
        Ok(self.state.lock().channels.get(&channel_id).cloned())
    }

    async fn update_channel(&self, channel_id: ChannelId, edit: &ChannelEdit) -> Result<()> {
        self.record("update", channel_id.to_string())?;
        let mut state = self.state.lock();
        let ch = state
            .channels
            .get_mut(&channel_id)
            .ok_or_else(|| Error::ExternalResource(format!("no channel {channel_id}")))?;
        if let Some(name) = &edit.name {
            ch.name = name.clone();
        }
        if let Some(limit) = edit.user_limit {
            ch.user_limit = limit;
        }
        Ok(())
    }

    async fn find_member_by_name(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<MemberId>> {
        self.record("find_member", format!("{guild_id}:{name}"))?;
        Ok(self
            .state
            .lock()
            .members
            .get(&(guild_id, name.to_string()))
            .copied())
    }

    async fn list_guilds(&self) -> Result<Vec<GuildInfo>> {
        self.record("list_guilds", String::new())?;
        Ok(self.state.lock().guilds.clone())
    }

    async fn leave_guild(&self, guild_id: GuildId) -> Result<()> {
        self.record("leave", guild_id.to_string())?;
        self.state.lock().guilds.retain(|g| g.id != guild_id);
        Ok(())
    }
}
