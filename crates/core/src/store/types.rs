//! Persistent record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-link download status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    Undownload,
    Downloading,
    Downloaded,
    Paused,
    Checking,
    Error,
}

impl DownloadStatus {
    /// Statuses the torrent sweep keeps in sync with the daemon.
    pub const TRACKED: [DownloadStatus; 4] = [
        DownloadStatus::Downloading,
        DownloadStatus::Paused,
        DownloadStatus::Checking,
        DownloadStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Undownload => "undownload",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Downloaded => "downloaded",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Checking => "checking",
            DownloadStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "undownload" => Some(DownloadStatus::Undownload),
            "downloading" => Some(DownloadStatus::Downloading),
            "downloaded" => Some(DownloadStatus::Downloaded),
            "paused" => Some(DownloadStatus::Paused),
            "checking" => Some(DownloadStatus::Checking),
            "error" => Some(DownloadStatus::Error),
            _ => None,
        }
    }
}

/// What a link was accepted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkKind {
    CatalogItem,
    Generic,
}

impl LinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkKind::CatalogItem => "CATALOG_ITEM",
            LinkKind::Generic => "GENERIC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CATALOG_ITEM" => Some(LinkKind::CatalogItem),
            "GENERIC" => Some(LinkKind::Generic),
            _ => None,
        }
    }
}

/// Whether a previewed torrent is a single file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewKind {
    File,
    Folder,
}

/// A screenshot taken from a previewed torrent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub offset_seconds: u64,
    pub image_url: String,
}

/// Preview of a magnet link's content. Fetched once, never refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewDetail {
    pub name: String,
    pub total_size_bytes: u64,
    pub file_count: u32,
    pub kind: PreviewKind,
    #[serde(default)]
    pub screenshots: Vec<Screenshot>,
}

/// A batch of links accepted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_refs: Vec<String>,
    /// Catalog code the batch was accepted for, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_code: Option<String>,
    /// Links in submission order.
    pub download_urls: Vec<DownloadUrl>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn is_catalog_linked(&self) -> bool {
        self.catalog_code.is_some()
    }
}

/// One link within a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadUrl {
    pub id: String,
    pub document_id: String,
    /// Canonical magnet URI.
    pub url: String,
    pub hash: String,
    pub status: DownloadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_detail: Option<PreviewDetail>,
    pub linked_catalog_entry_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<LinkKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every status write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl DownloadUrl {
    pub fn is_catalog_linked(&self) -> bool {
        self.kind == Some(LinkKind::CatalogItem)
    }
}

/// Catalog entry lifecycle.
///
/// Forward order: `uncheck → subscribed → downloading → downloaded →
/// transfered`. `added` marks an entry found in the external library and
/// `undownload` is the regression target when the daemon drops a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogStatus {
    Uncheck,
    Subscribed,
    Undownload,
    Downloading,
    Downloaded,
    Transfered,
    Added,
}

impl CatalogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogStatus::Uncheck => "uncheck",
            CatalogStatus::Subscribed => "subscribed",
            CatalogStatus::Undownload => "undownload",
            CatalogStatus::Downloading => "downloading",
            CatalogStatus::Downloaded => "downloaded",
            CatalogStatus::Transfered => "transfered",
            CatalogStatus::Added => "added",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uncheck" => Some(CatalogStatus::Uncheck),
            "subscribed" => Some(CatalogStatus::Subscribed),
            "undownload" => Some(CatalogStatus::Undownload),
            "downloading" => Some(CatalogStatus::Downloading),
            "downloaded" => Some(CatalogStatus::Downloaded),
            "transfered" => Some(CatalogStatus::Transfered),
            "added" => Some(CatalogStatus::Added),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            CatalogStatus::Uncheck | CatalogStatus::Subscribed | CatalogStatus::Undownload => 0,
            CatalogStatus::Downloading => 1,
            CatalogStatus::Downloaded => 2,
            CatalogStatus::Transfered | CatalogStatus::Added => 3,
        }
    }

    /// Whether moving to `next` is a forward step in the download lifecycle.
    pub fn can_advance_to(&self, next: CatalogStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// A subscribable catalog item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    /// Unique catalog number, compared case-insensitively.
    pub code: String,
    pub title: String,
    pub status: CatalogStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    pub magnets: Vec<String>,
    /// Item id in the external media library.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one file transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Processing,
    Success,
    Failure,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Success => "SUCCESS",
            TransferStatus::Failure => "FAILURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROCESSING" => Some(TransferStatus::Processing),
            "SUCCESS" => Some(TransferStatus::Success),
            "FAILURE" => Some(TransferStatus::Failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Processing)
    }
}

/// Audit row for one transfer attempt. Written once in `PROCESSING`,
/// finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLog {
    pub id: String,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<String>,
    pub status: TransferStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
