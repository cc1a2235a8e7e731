//! External media library server.
//!
//! The server is only read: its libraries and items are copied into a
//! [`LibrarySnapshot`] that the library reconciler and the submission
//! orchestrator consult.

mod jellyfin;
mod snapshot;

pub use jellyfin::{JellyfinClient, MediaServerConfig};
pub use snapshot::{LibrarySnapshot, SnapshotView};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaServerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

/// A library (media folder) on the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryInfo {
    pub id: String,
    pub name: String,
}

/// One item of a library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LibraryItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
}

impl LibraryItem {
    /// Name, original title and sort name, skipping absent ones.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.original_title.as_deref())
            .chain(self.sort_name.as_deref())
    }
}

#[async_trait]
pub trait MediaServer: Send + Sync {
    fn name(&self) -> &str;

    async fn list_libraries(&self) -> Result<Vec<LibraryInfo>, MediaServerError>;

    async fn list_items_recursive(
        &self,
        library_id: &str,
    ) -> Result<Vec<LibraryItem>, MediaServerError>;
}
