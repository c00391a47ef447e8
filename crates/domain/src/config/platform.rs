use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Platform connector
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where the platform connector's REST surface lives.  The connector holds
/// the gateway session with the chat platform; tempvoice asks it to create,
/// delete and inspect channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Environment variable holding the connector's bearer token.
    #[serde(default = "d_token_env")]
    pub token_env: String,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            token_env: d_token_env(),
            timeout_ms: 10_000,
            max_retries: 2,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://127.0.0.1:3221".into()
}
fn d_token_env() -> String {
    "TV_PLATFORM_TOKEN".into()
}
fn d_10000() -> u64 {
    10_000
}
fn d_2() -> u32 {
    2
}
