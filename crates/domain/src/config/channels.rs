use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Guild authorization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The administrative boundary: the bot stays only in these guilds and
/// leaves any other guild at startup or when it is invited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildsConfig {
    #[serde(default)]
    pub allowed: Vec<GuildId>,
}

impl GuildsConfig {
    pub fn is_allowed(&self, guild_id: GuildId) -> bool {
        self.allowed.contains(&guild_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Temporary channels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Creation points and naming for temporary voice channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Voice channels whose entry creates a new temporary channel.
    #[serde(default)]
    pub creation_points: Vec<ChannelId>,

    /// Names picked at random for new temporary channels.
    #[serde(default = "d_default_names")]
    pub default_names: Vec<String>,

    /// Pause between moving the creator and attaching the control panel, so
    /// the platform has published the new channel to the connector's cache.
    #[serde(default = "d_control_surface_delay_ms")]
    pub control_surface_delay_ms: u64,

    /// Upper bound for the `limit` of the top-sessions query.
    #[serde(default = "d_top_limit_max")]
    pub top_limit_max: usize,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            creation_points: Vec::new(),
            default_names: d_default_names(),
            control_surface_delay_ms: d_control_surface_delay_ms(),
            top_limit_max: d_top_limit_max(),
        }
    }
}

impl ChannelsConfig {
    pub fn is_creation_point(&self, channel_id: ChannelId) -> bool {
        self.creation_points.contains(&channel_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for persisted state.  Sessions live under
    /// `<state_path>/sessions/`.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_default_names() -> Vec<String> {
    [
        "Cozy Corner",
        "The Lounge",
        "Night Owls",
        "Quiet Room",
        "Campfire",
        "Study Hall",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn d_control_surface_delay_ms() -> u64 {
    1000
}
fn d_top_limit_max() -> usize {
    10
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_points_parse_as_snowflakes() {
        let toml_str = r#"
            creation_points = [1100000000000000001, 1100000000000000002]
        "#;
        let cfg: ChannelsConfig = toml::from_str(toml_str).unwrap();
        assert!(cfg.is_creation_point(ChannelId(1100000000000000001)));
        assert!(!cfg.is_creation_point(ChannelId(7)));
        assert!(!cfg.default_names.is_empty());
    }

    #[test]
    fn unknown_guild_is_not_allowed() {
        let cfg = GuildsConfig {
            allowed: vec![GuildId(1)],
        };
        assert!(cfg.is_allowed(GuildId(1)));
        assert!(!cfg.is_allowed(GuildId(2)));
    }
}
