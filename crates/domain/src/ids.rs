//! Platform identifiers.
//!
//! Channels, guilds and members are addressed by the platform's 64-bit
//! snowflakes.  Each gets its own newtype so a guild id can never be passed
//! where a channel id is expected.  All of them serialize as bare integers.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake!(
    /// A voice channel (managed or creation point).
    ChannelId
);
snowflake!(
    /// A guild (server) the bot is a member of.
    GuildId
);
snowflake!(
    /// A guild member.
    MemberId
);

/// Identifier of one durable session record, minted by the store.
pub type SessionId = uuid::Uuid;
