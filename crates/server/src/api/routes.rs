use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{catalog, documents, handlers, jobs, middleware::metrics_middleware, transfers};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Documents (link gate + submission)
        .route("/documents", post(documents::create_document))
        .route("/documents/{id}", get(documents::get_document))
        .route("/documents/{id}/submit", post(documents::submit_document))
        // Catalog
        .route("/catalog", get(catalog::list_catalog))
        .route("/catalog", post(catalog::create_entry))
        .route("/catalog/{id}", get(catalog::get_entry))
        // Transfers
        .route("/transfers", get(transfers::list_transfers))
        .route("/transfers", post(transfers::create_transfer))
        // Jobs
        .route("/jobs/status", get(jobs::get_status))
        .route("/jobs/sweep", post(jobs::run_sweep))
        .route("/jobs/library-sync", post(jobs::run_library_sync))
        // Library snapshot
        .route("/library", get(jobs::list_library));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
