//! Temporary voice channel sessions.
//!
//! The lifecycle engine behind tempvoice: durable session records, the
//! in-process registry of managed channels, per-channel serialization,
//! presence event handling, startup reconciliation, and repair sweeps.
//! Everything that talks to the chat platform goes through
//! [`PlatformGateway`].

pub mod controls;
pub mod events;
pub mod lifecycle;
pub mod lock;
pub mod platform;
pub mod reconcile;
pub mod registry;
pub mod repair;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use controls::{apply_control, ControlAction};
pub use events::{normalize, HandleReport, VoiceEvent, VoiceEventHandler, VoiceStateUpdate};
pub use lifecycle::{EmptyCheck, EndReason, LifecycleManager, MemberLeft};
pub use platform::{ChannelEdit, ChannelSnapshot, GuildInfo, PlatformGateway};
pub use reconcile::{enforce_guild_allowed, reconcile, ReconcileReport};
pub use registry::EphemeralRegistry;
pub use repair::{Maintenance, RankedSession, RepairOutcome};
pub use session::{CreatorMetadata, NewSession, Session};
pub use store::{JsonSessionStore, SessionStore};
