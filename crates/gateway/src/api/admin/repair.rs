//! Repair sweeps.  Each is safe to re-run and reports a [`RepairOutcome`].

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use tv_sessions::repair::RepairOutcome;

use crate::state::AppState;

use super::super::error::ApiError;
use super::guard::AdminGuard;

#[derive(Debug, Deserialize)]
pub struct CleanUpShortBody {
    /// Ended sessions shorter than this are deleted.
    pub threshold_secs: u64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/admin/sessions/clean-up-short
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn clean_up_short(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Json(body): Json<CleanUpShortBody>,
) -> Result<Json<RepairOutcome>, ApiError> {
    let outcome = state
        .maintenance
        .clean_up_short_sessions(body.threshold_secs)
        .await?;
    Ok(Json(outcome))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/admin/channels/close-empty
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn close_empty(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<RepairOutcome>, ApiError> {
    Ok(Json(state.maintenance.close_empty_managed_resources().await?))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST /v1/admin/sessions/repair-orphans
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn repair_orphans(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> Result<Json<RepairOutcome>, ApiError> {
    Ok(Json(state.maintenance.repair_orphaned_sessions().await?))
}
