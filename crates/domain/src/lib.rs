//! Shared domain types for tempvoice: platform ids, configuration, the
//! common error type and structured trace events.

pub mod config;
pub mod error;
pub mod ids;
pub mod trace;

pub use error::{Error, Result};
pub use ids::{ChannelId, GuildId, MemberId, SessionId};
