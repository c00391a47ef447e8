//! `AdminGuard` Axum extractor.
//!
//! Handlers opt in by adding `_guard: AdminGuard` to their parameter list.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;

use crate::api::auth::{bearer, token_matches};
use crate::state::AppState;

/// Axum extractor that enforces the admin bearer token.
///
/// Same SHA-256 + constant-time comparison as the API token in `auth.rs`.
///
/// Without `TV_ADMIN_TOKEN` the API token is required instead; with
/// neither configured (dev mode), all requests pass.
pub struct AdminGuard;

#[async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected_hash = match state
            .admin_token_hash
            .as_ref()
            .or(state.api_token_hash.as_ref())
        {
            Some(h) => h,
            None => return Ok(AdminGuard),
        };

        if !token_matches(bearer(&parts.headers), expected_hash) {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "invalid admin token" })),
            ));
        }
        Ok(AdminGuard)
    }
}
