//! Metadata provider for catalog codes.
//!
//! The transfer engine searches by code, picks a candidate and fetches its
//! full detail (title, cast, studio, release date, artwork URLs).

mod metatube;
mod types;

pub use metatube::{MetaTubeClient, MetadataConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to a metadata provider.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Resource not found (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search candidates for a catalog code.
    async fn search_by_number(&self, code: &str) -> Result<Vec<MovieCandidate>, MetadataError>;

    /// Fetch the full record of one candidate.
    async fn get_details(&self, provider: &str, id: &str) -> Result<MovieDetail, MetadataError>;
}
