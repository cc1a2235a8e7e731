//! Record store for documents, links, catalog entries and transfer logs.
//!
//! Every operation is a point read or write. The only multi-row write is
//! `create_document`, which inserts the document and all of its links in one
//! transaction so a rejected batch never leaves partial rows behind.

mod sqlite;
mod types;

pub use sqlite::SqliteRecordStore;
pub use types::*;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// The row changed since the caller read it.
    #[error("concurrent update on {id}: expected version {expected}")]
    Conflict { id: String, expected: i64 },

    #[error("cannot {operation} {id}: current state is {current}")]
    InvalidState {
        id: String,
        current: String,
        operation: String,
    },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// A document to persist together with its links.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub description: Option<String>,
    pub image_refs: Vec<String>,
    pub catalog_code: Option<String>,
    pub links: Vec<NewDownloadUrl>,
}

/// A link to persist inside a new document. Always starts `undownload`.
#[derive(Debug, Clone)]
pub struct NewDownloadUrl {
    pub url: String,
    pub hash: String,
    pub preview_detail: Option<PreviewDetail>,
    pub linked_catalog_entry_ids: Vec<String>,
    pub kind: Option<LinkKind>,
}

/// Status write for a link.
#[derive(Debug, Clone)]
pub struct DownloadUrlUpdate {
    pub status: DownloadStatus,
    /// Stamped when the link is handed to the daemon.
    pub submitted_at: Option<DateTime<Utc>>,
}

impl DownloadUrlUpdate {
    pub fn status(status: DownloadStatus) -> Self {
        Self {
            status,
            submitted_at: None,
        }
    }

    pub fn submitted(at: DateTime<Utc>) -> Self {
        Self {
            status: DownloadStatus::Downloading,
            submitted_at: Some(at),
        }
    }
}

/// Request to create a catalog entry.
#[derive(Debug, Clone)]
pub struct NewCatalogEntry {
    pub code: String,
    pub title: String,
    pub status: CatalogStatus,
}

/// Partial update of a catalog entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct CatalogEntryPatch {
    pub status: Option<CatalogStatus>,
    /// `Some(None)` clears the library reference.
    pub library_ref: Option<Option<String>>,
    pub added_at: Option<DateTime<Utc>>,
}

impl CatalogEntryPatch {
    pub fn status(status: CatalogStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Request to open a transfer log in `PROCESSING`.
#[derive(Debug, Clone)]
pub struct NewTransferLog {
    pub source_path: String,
    pub title: String,
    pub code: Option<String>,
}

/// Terminal update for a transfer log.
#[derive(Debug, Clone)]
pub struct TransferLogPatch {
    pub status: TransferStatus,
    pub destination_path: Option<String>,
    pub error: Option<String>,
}

impl TransferLogPatch {
    pub fn success(destination: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Success,
            destination_path: Some(destination.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            status: TransferStatus::Failure,
            destination_path: None,
            error: Some(error.into()),
        }
    }
}

/// Trait for record storage backends.
pub trait RecordStore: Send + Sync {
    /// Links whose canonical URL is any of `urls`.
    fn find_by_canonical_urls(&self, urls: &[String]) -> Result<Vec<DownloadUrl>, StoreError>;

    /// Persist a document and all of its links atomically.
    fn create_document(&self, document: NewDocument) -> Result<Document, StoreError>;

    fn get_document(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents with at least one `undownload` link that was never handed to
    /// the daemon, oldest first. Links regressed by a sweep are not included.
    fn list_documents_with_unsubmitted_links(&self, limit: i64) -> Result<Vec<Document>, StoreError>;

    fn get_download_url(&self, id: &str) -> Result<Option<DownloadUrl>, StoreError>;

    fn list_download_urls_by_status(
        &self,
        statuses: &[DownloadStatus],
    ) -> Result<Vec<DownloadUrl>, StoreError>;

    /// Write a link's status if its version still equals `expected_version`.
    fn update_download_url_status(
        &self,
        id: &str,
        expected_version: i64,
        update: DownloadUrlUpdate,
    ) -> Result<DownloadUrl, StoreError>;

    fn create_catalog_entry(&self, entry: NewCatalogEntry) -> Result<CatalogEntry, StoreError>;

    fn get_catalog_entry(&self, id: &str) -> Result<Option<CatalogEntry>, StoreError>;

    /// Case-insensitive lookup by catalog code.
    fn find_catalog_entry_by_code(&self, code: &str) -> Result<Option<CatalogEntry>, StoreError>;

    fn list_catalog_entries(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    fn update_catalog_entry(
        &self,
        id: &str,
        patch: CatalogEntryPatch,
    ) -> Result<CatalogEntry, StoreError>;

    fn create_transfer_log(&self, log: NewTransferLog) -> Result<TransferLog, StoreError>;

    fn get_transfer_log(&self, id: &str) -> Result<Option<TransferLog>, StoreError>;

    /// Most recent logs first.
    fn list_transfer_logs(&self, limit: i64) -> Result<Vec<TransferLog>, StoreError>;

    /// Finalize a log. Fails with `InvalidState` if it is already terminal.
    fn update_transfer_log(
        &self,
        id: &str,
        patch: TransferLogPatch,
    ) -> Result<TransferLog, StoreError>;
}
