use std::sync::Arc;

use tv_domain::config::Config;
use tv_sessions::events::VoiceEventHandler;
use tv_sessions::lifecycle::LifecycleManager;
use tv_sessions::platform::PlatformGateway;
use tv_sessions::repair::Maintenance;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, lifecycle engine, platform client
/// - **Operations**: event handler, repair sweeps
/// - **Security**: token hashes computed at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub lifecycle: Arc<LifecycleManager>,
    pub platform: Arc<dyn PlatformGateway>,

    // ── Operations ────────────────────────────────────────────────────
    pub voice_events: Arc<VoiceEventHandler>,
    pub maintenance: Arc<Maintenance>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the API bearer token (read once at startup).
    /// `None` = dev mode (no auth enforced).
    pub api_token_hash: Option<Vec<u8>>,
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = admin endpoints take the API token.
    pub admin_token_hash: Option<Vec<u8>>,
}
