//! tempvoice gateway: HTTP surface, platform connector client, and boot
//! sequence around the `tv-sessions` lifecycle engine.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod platform;
pub mod state;
