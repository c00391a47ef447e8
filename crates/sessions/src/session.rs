//! The durable record of one temporary channel's lifetime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use tv_domain::ids::{ChannelId, GuildId, MemberId, SessionId};

/// Current layout version of [`CreatorMetadata`].
pub const CREATOR_METADATA_VERSION: u32 = 1;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One managed channel's open/close lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub channel_id: ChannelId,
    /// Guild the channel was created in.  Absent on records written before
    /// the field existed.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// Display name at creation time.
    pub channel_name: String,
    /// Username of the member who entered the creation point.
    pub created_by: String,
    #[serde(default)]
    pub creator_metadata: CreatorMetadata,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_ended: bool,
}

/// Display attributes of the creator, captured once at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorMetadata {
    #[serde(default = "d_version")]
    pub version: u32,
    #[serde(default)]
    pub member_id: Option<MemberId>,
    #[serde(default)]
    pub public_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Default for CreatorMetadata {
    fn default() -> Self {
        Self {
            version: CREATOR_METADATA_VERSION,
            member_id: None,
            public_name: None,
            username: None,
            avatar_url: None,
        }
    }
}

fn d_version() -> u32 {
    CREATOR_METADATA_VERSION
}

/// Everything the caller supplies to open a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub channel_name: String,
    pub created_by: String,
    pub creator_metadata: CreatorMetadata,
}

impl Session {
    /// Build an open record from a [`NewSession`].
    pub fn open(id: SessionId, new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id,
            channel_id: new.channel_id,
            guild_id: new.guild_id,
            channel_name: new.channel_name,
            created_by: new.created_by,
            creator_metadata: new.creator_metadata,
            created_at: now,
            last_active_at: now,
            ended_at: None,
            is_ended: false,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.is_ended
    }

    /// Close the session at `now`.  Returns `false` (and changes nothing)
    /// if it was already closed: `ended_at` is written exactly once.
    pub fn close(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_ended {
            return false;
        }
        self.ended_at = Some(now);
        self.is_ended = true;
        true
    }

    /// Bump `last_active_at`.  Closed sessions are left alone.
    pub fn touch(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_ended {
            return false;
        }
        self.last_active_at = now;
        true
    }

    /// Lifetime of the channel: until `ended_at` once closed, else until `now`.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        end.signed_duration_since(self.created_at)
    }

    /// Human-readable duration, e.g. `1h 02m 05s`, `4m 09s`, `12s`.
    pub fn duration_pretty(&self, now: DateTime<Utc>) -> String {
        format_duration(self.duration(now))
    }

    /// Name shown in listings: the creator's public name when known.
    pub fn display_name(&self) -> &str {
        self.creator_metadata
            .public_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.created_by)
    }
}

/// Render a duration as `Hh MMm SSs`, dropping leading zero units.
pub fn format_duration(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}
