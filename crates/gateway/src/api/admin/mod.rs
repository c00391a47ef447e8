//! Admin endpoints: health probe and repair sweeps.
//!
//! Repair endpoints use the `AdminGuard` extractor (see `guard.rs`), which
//! enforces `TV_ADMIN_TOKEN` auth.  If that env var is unset they take the
//! API token instead.

mod guard;
mod health;
mod repair;

pub use guard::AdminGuard;
pub use health::health;
pub use repair::{close_empty, clean_up_short, repair_orphans};
