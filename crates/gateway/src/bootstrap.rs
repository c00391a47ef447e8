//! AppState construction extracted from `main.rs`.
//!
//! [`build_app_state`] is the full boot path for `serve`: it validates the
//! config, opens the store, and reconciles with the platform before the
//! caller binds a listener.

use std::sync::Arc;

use anyhow::Context;

use tv_domain::config::{Config, ConfigSeverity};
use tv_sessions::events::VoiceEventHandler;
use tv_sessions::lifecycle::LifecycleManager;
use tv_sessions::platform::PlatformGateway;
use tv_sessions::reconcile::reconcile;
use tv_sessions::repair::Maintenance;
use tv_sessions::store::{JsonSessionStore, SessionStore};

use crate::api::auth::hash_token;
use crate::platform::HttpPlatform;
use crate::state::AppState;

/// Validate config, initialize every subsystem, reconcile, and return a
/// fully-wired [`AppState`].
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Session store ────────────────────────────────────────────────
    let store = Arc::new(
        JsonSessionStore::new(&config.store.state_path).context("initializing session store")?,
    );

    // ── Platform connector ───────────────────────────────────────────
    let platform = Arc::new(
        HttpPlatform::new(&config.platform).context("creating platform connector client")?,
    );
    tracing::info!(url = %config.platform.base_url, "platform connector client ready");

    let mut state = assemble(config.clone(), store, platform);

    // ── Auth tokens ──────────────────────────────────────────────────
    state.api_token_hash = token_hash_from_env(&config.server.api_token_env);
    if state.api_token_hash.is_none() {
        tracing::warn!(
            "API bearer-token auth DISABLED; set the {} env var",
            config.server.api_token_env
        );
    }
    state.admin_token_hash = token_hash_from_env(&config.admin.token_env);
    if state.admin_token_hash.is_none() {
        tracing::info!(
            "{} not set; admin endpoints accept the API token",
            config.admin.token_env
        );
    }

    // ── Reconciliation (before any event is accepted) ────────────────
    let report = reconcile(
        &state.lifecycle,
        state.platform.as_ref(),
        &config.guilds.allowed,
    )
    .await
    .context("startup reconciliation")?;
    tracing::info!(
        managed_channels = report.open_sessions,
        unresolved = report.unresolved,
        "startup reconciliation finished"
    );

    Ok(state)
}

/// Wire the engine around an existing store and platform.  Token hashes are
/// left unset (dev mode).
pub fn assemble(
    config: Arc<Config>,
    store: Arc<dyn SessionStore>,
    platform: Arc<dyn PlatformGateway>,
) -> AppState {
    let lifecycle = Arc::new(LifecycleManager::new(store));
    let voice_events = Arc::new(VoiceEventHandler::new(
        lifecycle.clone(),
        platform.clone(),
        config.channels.clone(),
    ));
    let maintenance = Arc::new(Maintenance::new(
        lifecycle.clone(),
        platform.clone(),
        config.channels.top_limit_max,
    ));
    tracing::info!(
        creation_points = config.channels.creation_points.len(),
        allowed_guilds = config.guilds.allowed.len(),
        "lifecycle engine ready"
    );

    AppState {
        config,
        lifecycle,
        platform,
        voice_events,
        maintenance,
        api_token_hash: None,
        admin_token_hash: None,
    }
}

fn token_hash_from_env(env_var: &str) -> Option<Vec<u8>> {
    std::env::var(env_var)
        .ok()
        .filter(|t| !t.is_empty())
        .map(|t| {
            tracing::info!(source = %format!("env:{env_var}"), "bearer token loaded");
            hash_token(&t)
        })
}
