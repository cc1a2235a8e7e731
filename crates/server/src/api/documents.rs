//! Document API handlers: the link gate and submission.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use magpie_core::{Document, GateError, GateRequest, OrchestratorError, SubmissionReport};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(flatten)]
    pub batch: GateRequest,
    /// Hand the accepted links to the daemon right away.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateDocumentResponse {
    pub document: Document,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<SubmissionReport>,
    /// Set when `submit` was requested and failed. The document is kept.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/documents
///
/// Run a link batch through the gate and optionally submit it.
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<CreateDocumentResponse>), ApiError> {
    let document = state
        .gate()
        .accept(request.batch)
        .await
        .map_err(gate_error)?;

    let (submission, submission_error) = if request.submit {
        match state.submission().submit(&document).await {
            Ok(report) => (Some(report), None),
            Err(e) => {
                warn!(document_id = %document.id, error = %e, "Immediate submission failed");
                (None, Some(e.to_string()))
            }
        }
    } else {
        (None, None)
    };

    // Re-read so link statuses reflect the submission.
    let document = match state.store().get_document(&document.id) {
        Ok(Some(fresh)) => fresh,
        _ => document,
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateDocumentResponse {
            document,
            submission,
            submission_error,
        }),
    ))
}

/// GET /api/v1/documents/{id}
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    match state.store().get_document(&id) {
        Ok(Some(document)) => Ok(Json(document)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Document not found: {}", id),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// POST /api/v1/documents/{id}/submit
///
/// Submit every still-undownloaded link of a document.
pub async fn submit_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionReport>, ApiError> {
    state
        .submission()
        .submit_document(&id)
        .await
        .map(Json)
        .map_err(orchestrator_error)
}

// ============================================================================
// Error mapping
// ============================================================================

fn gate_error(e: GateError) -> ApiError {
    let status = match &e {
        GateError::EmptyInput | GateError::InvalidLink => StatusCode::BAD_REQUEST,
        GateError::DuplicateLink(_) => StatusCode::CONFLICT,
        GateError::NoPreviewAvailable => StatusCode::UNPROCESSABLE_ENTITY,
        GateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

pub(crate) fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = match &e {
        OrchestratorError::NoActiveDaemon => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::TorrentClient(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}
