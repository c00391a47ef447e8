use serde::Serialize;

/// Structured trace events emitted across all tempvoice crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionStarted {
        session_id: String,
        channel_id: u64,
        channel_name: String,
        created_by: String,
    },
    SessionEnded {
        session_id: String,
        channel_id: u64,
        duration_secs: i64,
        reason: String,
    },
    RegistryRebuilt {
        open_sessions: usize,
    },
    ChannelCreated {
        guild_id: u64,
        channel_id: u64,
        name: String,
    },
    ChannelDeleted {
        channel_id: u64,
        reason: String,
    },
    ControlSurfaceAttached {
        channel_id: u64,
        owner_resolved: bool,
    },
    GuildLeft {
        guild_id: u64,
        name: String,
    },
    PlatformCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    RepairCompleted {
        operation: String,
        count: usize,
        failed: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tv_event");
    }
}
