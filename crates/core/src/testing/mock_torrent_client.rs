//! Mock torrent client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::magnet::extract_info_hash;
use crate::torrent_client::{
    AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo,
    TorrentState,
};

/// A recorded torrent addition for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAddTorrent {
    /// The request that was made.
    pub request: AddTorrentRequest,
    /// When the request was made.
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added torrents for assertions
/// - Control torrent progress/state
/// - Simulate failures and torrents removed behind our back
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
///
/// client.add_torrent(AddTorrentRequest::magnet("magnet:?xt=urn:btih:...")).await?;
/// assert_eq!(client.added_torrents().await.len(), 1);
///
/// // Simulate completion
/// client.set_progress("abc123...", 1.0).await;
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    /// Recorded add_torrent calls.
    added: Arc<RwLock<Vec<RecordedAddTorrent>>>,
    /// Current torrents by lowercase hash.
    torrents: Arc<RwLock<HashMap<String, TorrentInfo>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<TorrentClientError>>>,
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<RecordedAddTorrent> {
        self.added.read().await.clone()
    }

    /// Set the progress for a torrent (0.0 to 1.0).
    ///
    /// When progress reaches 1.0, the torrent state changes to Seeding.
    pub async fn set_progress(&self, hash: &str, progress: f64) {
        let mut torrents = self.torrents.write().await;
        if let Some(info) = torrents.get_mut(&hash.to_lowercase()) {
            info.progress = progress.clamp(0.0, 1.0);
            if info.progress >= 1.0 {
                info.state = TorrentState::Seeding;
            } else if info.state == TorrentState::Seeding {
                info.state = TorrentState::Downloading;
            }
        }
    }

    /// Set the state for a torrent directly.
    pub async fn set_state(&self, hash: &str, state: TorrentState) {
        if let Some(info) = self.torrents.write().await.get_mut(&hash.to_lowercase()) {
            info.state = state;
        }
    }

    /// Set where the daemon reports the downloaded content.
    pub async fn set_content_path(&self, hash: &str, path: impl Into<String>) {
        if let Some(info) = self.torrents.write().await.get_mut(&hash.to_lowercase()) {
            info.content_path = Some(path.into());
        }
    }

    /// Drop a torrent, as if the user deleted it in the daemon.
    pub async fn remove_torrent(&self, hash: &str) -> bool {
        self.torrents
            .write()
            .await
            .remove(&hash.to_lowercase())
            .is_some()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: TorrentClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(&hash.to_lowercase())
    }

    /// Pre-populate a torrent.
    pub async fn add_mock_torrent(&self, info: TorrentInfo) {
        self.torrents
            .write()
            .await
            .insert(info.hash.to_lowercase(), info);
    }

    async fn take_error(&self) -> Option<TorrentClientError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let hash = extract_info_hash(&request.uri)
            .ok_or_else(|| TorrentClientError::Rejected(request.uri.clone()))?;

        self.added.write().await.push(RecordedAddTorrent {
            request: request.clone(),
            timestamp: Utc::now(),
        });

        let info = TorrentInfo {
            hash: hash.clone(),
            name: format!("Mock Torrent {}", &hash[..8.min(hash.len())]),
            state: if request.paused {
                TorrentState::Paused
            } else {
                TorrentState::Downloading
            },
            progress: 0.0,
            size_bytes: 100 * 1024 * 1024, // 100 MB default
            added_at: Some(Utc::now()),
            save_path: request.save_path.clone(),
            content_path: None,
            root_path: None,
            category: request.category.clone(),
        };
        self.torrents.write().await.insert(hash.clone(), info);

        Ok(AddTorrentResult { hash })
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        let mut result: Vec<TorrentInfo> = self.torrents.read().await.values().cloned().collect();
        result.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(result)
    }
}
