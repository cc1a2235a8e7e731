//! Link preview provider.
//!
//! Resolves a magnet URI to its name, size, file count and screenshots
//! without downloading it. The HTTP provider queries a whatslink-style API and
//! tries each configured origin in order.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{PreviewDetail, PreviewKind, Screenshot};

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("preview API error: {0}")]
    Api(String),

    #[error("no preview for {0}")]
    NotFound(String),

    #[error("no preview origins configured")]
    NoOrigins,
}

/// Preview provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// API origins tried in order, e.g. `https://whatslink.info`.
    #[serde(default = "default_origins")]
    pub origins: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_origins() -> Vec<String> {
    vec!["https://whatslink.info".to_string()]
}

fn default_timeout() -> u32 {
    15
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            origins: default_origins(),
            timeout_secs: default_timeout(),
        }
    }
}

#[async_trait]
pub trait PreviewProvider: Send + Sync {
    /// Fetch a preview for a canonical magnet URI.
    async fn get_preview(&self, magnet_uri: &str) -> Result<PreviewDetail, PreviewError>;
}

/// Preview provider backed by one or more HTTP origins.
pub struct HttpPreviewProvider {
    client: Client,
    origins: Vec<String>,
}

impl HttpPreviewProvider {
    pub fn new(config: &PreviewConfig) -> Result<Self, PreviewError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| PreviewError::Http(e.to_string()))?;

        Ok(Self {
            client,
            origins: config
                .origins
                .iter()
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
        })
    }

    async fn fetch_from(&self, origin: &str, magnet_uri: &str) -> Result<PreviewDetail, PreviewError> {
        let url = format!(
            "{}/api/v1/link?url={}",
            origin,
            urlencoding::encode(magnet_uri)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PreviewError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::Api(format!("HTTP {} from {}", status, origin)));
        }

        let body: LinkResponse = response
            .json()
            .await
            .map_err(|e| PreviewError::Api(format!("invalid response from {}: {}", origin, e)))?;

        body.into_preview(magnet_uri)
    }
}

#[async_trait]
impl PreviewProvider for HttpPreviewProvider {
    async fn get_preview(&self, magnet_uri: &str) -> Result<PreviewDetail, PreviewError> {
        let mut last_error = PreviewError::NoOrigins;

        for origin in &self.origins {
            match self.fetch_from(origin, magnet_uri).await {
                Ok(detail) => {
                    debug!(origin = %origin, name = %detail.name, "Preview resolved");
                    return Ok(detail);
                }
                Err(e) => {
                    warn!(origin = %origin, error = %e, "Preview origin failed");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Response of `GET /api/v1/link`.
#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    error: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    count: u32,
    #[serde(default)]
    screenshots: Option<Vec<LinkScreenshot>>,
}

#[derive(Debug, Deserialize)]
struct LinkScreenshot {
    #[serde(default)]
    time: u64,
    screenshot: String,
}

impl LinkResponse {
    fn into_preview(self, magnet_uri: &str) -> Result<PreviewDetail, PreviewError> {
        if !self.error.is_empty() {
            return Err(PreviewError::Api(self.error));
        }
        if self.name.is_empty() {
            return Err(PreviewError::NotFound(magnet_uri.to_string()));
        }

        let kind = if self.kind.eq_ignore_ascii_case("folder") || self.count > 1 {
            PreviewKind::Folder
        } else {
            PreviewKind::File
        };

        Ok(PreviewDetail {
            name: self.name,
            total_size_bytes: self.size,
            file_count: self.count.max(1),
            kind,
            screenshots: self
                .screenshots
                .unwrap_or_default()
                .into_iter()
                .map(|s| Screenshot {
                    offset_seconds: s.time,
                    image_url: s.screenshot,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGNET: &str = "magnet:?xt=urn:btih:c9e15763f722f23e98a29decdfae341b98d53056";

    #[test]
    fn test_link_response_folder() {
        let json = r#"{
            "error": "",
            "type": "FOLDER",
            "file_type": "folder",
            "name": "Some.Release.2024",
            "size": 4294967296,
            "count": 3,
            "screenshots": [{"time": 120, "screenshot": "https://img.example/1.jpg"}]
        }"#;
        let body: LinkResponse = serde_json::from_str(json).unwrap();
        let detail = body.into_preview(MAGNET).unwrap();

        assert_eq!(detail.name, "Some.Release.2024");
        assert_eq!(detail.kind, PreviewKind::Folder);
        assert_eq!(detail.file_count, 3);
        assert_eq!(detail.screenshots[0].offset_seconds, 120);
    }

    #[test]
    fn test_link_response_single_file_without_screenshots() {
        let json = r#"{"type": "FILE", "name": "movie.mp4", "size": 10, "count": 1, "screenshots": null}"#;
        let body: LinkResponse = serde_json::from_str(json).unwrap();
        let detail = body.into_preview(MAGNET).unwrap();

        assert_eq!(detail.kind, PreviewKind::File);
        assert!(detail.screenshots.is_empty());
    }

    #[test]
    fn test_link_response_error_and_empty_name() {
        let body: LinkResponse =
            serde_json::from_str(r#"{"error": "quota exceeded"}"#).unwrap();
        assert!(matches!(body.into_preview(MAGNET), Err(PreviewError::Api(_))));

        let body: LinkResponse = serde_json::from_str(r#"{"name": ""}"#).unwrap();
        assert!(matches!(body.into_preview(MAGNET), Err(PreviewError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_no_origins_surfaces_error() {
        let provider = HttpPreviewProvider::new(&PreviewConfig {
            origins: vec![],
            timeout_secs: 1,
        })
        .unwrap();
        assert!(matches!(
            provider.get_preview(MAGNET).await,
            Err(PreviewError::NoOrigins)
        ));
    }
}
