//! qBittorrent Web API v2 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::magnet::extract_info_hash;

use super::{AddTorrentRequest, AddTorrentResult, TorrentClient, TorrentClientError, TorrentInfo, TorrentState};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set once logged in; the session cookie itself lives in the cookie jar.
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and remember that the cookie jar holds a session.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Send an authenticated request, logging in again once on 403.
    ///
    /// `build` is called for every attempt because multipart bodies cannot be
    /// replayed.
    async fn send<F>(&self, build: F) -> Result<String, TorrentClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let response = build().send().await.map_err(map_request_error)?;

        let response = if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;
            build().send().await.map_err(map_request_error)?
        } else {
            response
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| TorrentClientError::ApiError(e.to_string()))
    }
}

fn map_request_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    root_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            added_at: timestamp_to_datetime(self.added_on),
            save_path: non_empty(self.save_path),
            content_path: non_empty(self.content_path),
            root_path: non_empty(self.root_path),
            category: non_empty(self.category),
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "forcedMetaDL" | "allocating" => {
            TorrentState::Downloading
        }
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" | "stalledUP" => TorrentState::Stalled,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add_torrent(
        &self,
        request: AddTorrentRequest,
    ) -> Result<AddTorrentResult, TorrentClientError> {
        let url = format!("{}/api/v2/torrents/add", self.base_url());
        let save_path = request
            .save_path
            .clone()
            .or_else(|| self.config.download_path.clone());

        let body = self
            .send(|| {
                let mut form = multipart::Form::new().text("urls", request.uri.clone());
                if let Some(path) = &save_path {
                    form = form.text("savepath", path.clone());
                }
                if let Some(category) = &request.category {
                    form = form.text("category", category.clone());
                }
                if request.paused {
                    form = form.text("paused", "true");
                }
                self.client.post(&url).multipart(form)
            })
            .await?;

        if body.trim() == "Fails." {
            return Err(TorrentClientError::Rejected(request.uri));
        }

        let hash = extract_info_hash(&request.uri).unwrap_or_default();
        debug!(hash = %hash, "Torrent added to qBittorrent");

        Ok(AddTorrentResult { hash })
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let url = format!("{}/api/v2/torrents/info", self.base_url());

        let response = self.send(|| self.client.get(&url)).await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response)
            .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_qb_state_downloading() {
        assert_eq!(parse_qb_state("downloading"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("forcedDL"), TorrentState::Downloading);
        assert_eq!(parse_qb_state("metaDL"), TorrentState::Downloading);
    }

    #[test]
    fn test_parse_qb_state_paused() {
        assert_eq!(parse_qb_state("pausedDL"), TorrentState::Paused);
        assert_eq!(parse_qb_state("stoppedUP"), TorrentState::Paused);
    }

    #[test]
    fn test_parse_qb_state_checking() {
        assert_eq!(parse_qb_state("checkingDL"), TorrentState::Checking);
        assert_eq!(parse_qb_state("checkingResumeData"), TorrentState::Checking);
        assert_eq!(parse_qb_state("moving"), TorrentState::Checking);
    }

    #[test]
    fn test_parse_qb_state_stalled_and_error() {
        assert_eq!(parse_qb_state("stalledDL"), TorrentState::Stalled);
        assert_eq!(parse_qb_state("missingFiles"), TorrentState::Error);
        assert_eq!(parse_qb_state("something_else"), TorrentState::Unknown);
    }

    #[test]
    fn test_timestamp_to_datetime() {
        let dt = timestamp_to_datetime(1703980800).unwrap();
        assert_eq!(dt.year(), 2023);
        assert!(timestamp_to_datetime(0).is_none());
        assert!(timestamp_to_datetime(-1).is_none());
    }

    #[test]
    fn test_qb_torrent_info_parses_paths() {
        let json = r#"[{
            "hash": "ABC123",
            "name": "Some.Release",
            "state": "uploading",
            "progress": 1.0,
            "size": 1000000,
            "added_on": 1703980800,
            "save_path": "/downloads",
            "content_path": "/downloads/Some.Release",
            "root_path": "/downloads/Some.Release",
            "category": ""
        }]"#;

        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(json).unwrap();
        let info = torrents.into_iter().next().unwrap().into_torrent_info();

        assert_eq!(info.hash, "abc123");
        assert_eq!(info.state, TorrentState::Seeding);
        assert!(info.is_complete());
        assert_eq!(info.content_path.as_deref(), Some("/downloads/Some.Release"));
        assert_eq!(info.category, None);
    }

    #[test]
    fn test_qb_torrent_info_tolerates_missing_optional_fields() {
        let json = r#"[{"hash": "def", "name": "x", "state": "pausedDL", "progress": 0.25}]"#;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(json).unwrap();
        let info = torrents.into_iter().next().unwrap().into_torrent_info();

        assert_eq!(info.state, TorrentState::Paused);
        assert!(info.save_path.is_none());
        assert!(info.root_path.is_none());
    }
}
