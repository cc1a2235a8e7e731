//! Catalog API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use magpie_core::{CatalogEntry, CatalogStatus, NewCatalogEntry, StoreError};
use serde::{Deserialize, Serialize};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CatalogQueryParams {
    #[serde(default)]
    pub status: Option<CatalogStatus>,
}

#[derive(Debug, Serialize)]
pub struct CatalogListResponse {
    pub entries: Vec<CatalogEntry>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateCatalogEntryRequest {
    pub code: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Defaults to `subscribed`.
    #[serde(default)]
    pub status: Option<CatalogStatus>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/catalog
///
/// List catalog entries, optionally filtered by status.
pub async fn list_catalog(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CatalogQueryParams>,
) -> Result<Json<CatalogListResponse>, ApiError> {
    let entries = state
        .store()
        .list_catalog_entries()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let entries: Vec<CatalogEntry> = match params.status {
        Some(status) => entries.into_iter().filter(|e| e.status == status).collect(),
        None => entries,
    };
    let total = entries.len();
    Ok(Json(CatalogListResponse { entries, total }))
}

/// POST /api/v1/catalog
///
/// Subscribe to a catalog code.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCatalogEntryRequest>,
) -> Result<(StatusCode, Json<CatalogEntry>), ApiError> {
    let code = request.code.trim().to_string();
    if code.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "code must not be empty"));
    }

    let title = request
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| code.clone());

    match state.store().create_catalog_entry(NewCatalogEntry {
        code,
        title,
        status: request.status.unwrap_or(CatalogStatus::Subscribed),
    }) {
        Ok(entry) => Ok((StatusCode::CREATED, Json(entry))),
        Err(StoreError::AlreadyExists(code)) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Catalog entry already exists: {}", code),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// GET /api/v1/catalog/{id}
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CatalogEntry>, ApiError> {
    match state.store().get_catalog_entry(&id) {
        Ok(Some(entry)) => Ok(Json(entry)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Catalog entry not found: {}", id),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
