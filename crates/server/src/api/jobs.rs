//! Job and library API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use magpie_core::{JobRunnerStatus, LibraryItem, LibrarySyncError, LibrarySyncReport, SweepReport};
use serde::{Deserialize, Serialize};

use super::documents::orchestrator_error;
use super::handlers::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LibraryQueryParams {
    /// Only return the item matching this catalog code.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub items: Vec<LibraryItem>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// POST /api/v1/jobs/sweep
///
/// Run the torrent sweep and the pending-submission retry once.
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, ApiError> {
    state
        .runner()
        .run_sweep()
        .await
        .map(Json)
        .map_err(orchestrator_error)
}

/// POST /api/v1/jobs/library-sync
pub async fn run_library_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LibrarySyncReport>, ApiError> {
    match state.runner().run_library_sync().await {
        Some(Ok(report)) => Ok(Json(report)),
        Some(Err(LibrarySyncError::MediaServer(e))) => {
            Err(api_error(StatusCode::BAD_GATEWAY, e.to_string()))
        }
        Some(Err(e)) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        None => Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no media server configured",
        )),
    }
}

/// GET /api/v1/jobs/status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<JobRunnerStatus> {
    Json(state.runner().status().await)
}

/// GET /api/v1/library
///
/// Items of the cached library snapshot.
pub async fn list_library(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LibraryQueryParams>,
) -> Json<LibraryResponse> {
    let view = state.snapshot().read().await;

    let items: Vec<LibraryItem> = match params.code.as_deref() {
        Some(code) => view.find_by_code(code).cloned().into_iter().collect(),
        None => view.items.as_ref().clone(),
    };
    let total = items.len();

    Json(LibraryResponse {
        items,
        total,
        last_updated: view.last_updated,
    })
}
