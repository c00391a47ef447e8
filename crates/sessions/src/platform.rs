//! The chat platform as seen by the lifecycle engine.
//!
//! Implementations talk to whatever holds the platform connection (the
//! gateway ships an HTTP client for a connector process).  Every method is a
//! potential suspension point and may fail with
//! [`Error::ExternalResource`](tv_domain::Error::ExternalResource).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tv_domain::error::Result;
use tv_domain::ids::{ChannelId, GuildId, MemberId};

/// Live state of a voice channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
    /// Members currently connected.
    pub occupants: usize,
    /// `0` means unlimited.
    #[serde(default)]
    pub user_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildInfo {
    pub id: GuildId,
    #[serde(default)]
    pub name: String,
}

/// A partial channel update.  `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEdit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
}

#[async_trait]
pub trait PlatformGateway: Send + Sync {
    /// Create a voice channel, optionally inside a category.
    async fn create_voice_channel(
        &self,
        guild_id: GuildId,
        name: &str,
        category_id: Option<ChannelId>,
    ) -> Result<ChannelId>;

    async fn delete_channel(&self, channel_id: ChannelId, reason: &str) -> Result<()>;

    async fn move_member(
        &self,
        guild_id: GuildId,
        member_id: MemberId,
        channel_id: ChannelId,
    ) -> Result<()>;

    /// Post the channel control panel.  `owner` of `None` means nobody
    /// passes the owner check.
    async fn attach_control_surface(
        &self,
        channel_id: ChannelId,
        owner: Option<MemberId>,
    ) -> Result<()>;

    /// Look a channel up.  `Ok(None)` means it no longer exists.
    async fn resolve_channel(&self, channel_id: ChannelId) -> Result<Option<ChannelSnapshot>>;

    async fn update_channel(&self, channel_id: ChannelId, edit: &ChannelEdit) -> Result<()>;

    async fn find_member_by_name(&self, guild_id: GuildId, name: &str)
        -> Result<Option<MemberId>>;

    async fn list_guilds(&self) -> Result<Vec<GuildInfo>>;

    async fn leave_guild(&self, guild_id: GuildId) -> Result<()>;
}
