//! Transfer API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use magpie_core::{TransferError, TransferLog, TransferOutcome};
use serde::{Deserialize, Serialize};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TransferQueryParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct TransferListResponse {
    pub logs: Vec<TransferLog>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransferRequest {
    /// Local path of the video file.
    pub source_path: PathBuf,
    /// Catalog code. Parsed from the file name when empty.
    #[serde(default)]
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/transfers
///
/// Most recent transfer logs first.
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransferQueryParams>,
) -> Result<Json<TransferListResponse>, ApiError> {
    let logs = state
        .store()
        .list_transfer_logs(params.limit.clamp(1, 1000))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let total = logs.len();
    Ok(Json(TransferListResponse { logs, total }))
}

/// POST /api/v1/transfers
///
/// File one video into the library by hand.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<TransferOutcome>), ApiError> {
    let engine = state.engine().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "library root is not configured",
        )
    })?;

    engine
        .transfer(&request.source_path, &request.code)
        .await
        .map(|outcome| (StatusCode::CREATED, Json(outcome)))
        .map_err(transfer_error)
}

fn transfer_error(e: TransferError) -> ApiError {
    let status = match &e {
        TransferError::UnparsableFilename(_) | TransferError::MetadataNotFound(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TransferError::SourceMissing(_) => StatusCode::NOT_FOUND,
        TransferError::TargetExists(_) => StatusCode::CONFLICT,
        TransferError::MetadataUnavailable { .. } => StatusCode::BAD_GATEWAY,
        TransferError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        TransferError::HttpClient(_) | TransferError::Io { .. } | TransferError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}
