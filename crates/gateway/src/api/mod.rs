pub mod admin;
pub mod auth;
pub mod controls;
pub mod error;
pub mod events;
pub mod sessions;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required), **protected**
/// (gated behind the `TV_API_TOKEN` bearer-token middleware) and **admin**
/// (each handler takes the `AdminGuard` extractor).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(admin::health));

    let protected = Router::new()
        // Connector events
        .route("/v1/events/voice-state", post(events::voice_state))
        .route("/v1/events/guild-joined", post(events::guild_joined))
        // Control panel
        .route("/v1/channels/:id/controls", post(controls::apply))
        // Rankings
        .route("/v1/sessions/top", get(sessions::top))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    let admin_routes = Router::new()
        .route(
            "/v1/admin/sessions/clean-up-short",
            post(admin::clean_up_short),
        )
        .route("/v1/admin/channels/close-empty", post(admin::close_empty))
        .route(
            "/v1/admin/sessions/repair-orphans",
            post(admin::repair_orphans),
        );

    public.merge(protected).merge(admin_routes)
}
