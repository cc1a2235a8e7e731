//! Mock link preview provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::magnet::extract_info_hash;
use crate::preview::{PreviewError, PreviewProvider};
use crate::store::{PreviewDetail, PreviewKind, Screenshot};

/// Mock preview provider keyed by info hash.
///
/// Hashes without a registered preview fail with `NotFound`.
#[derive(Debug, Default)]
pub struct MockPreviewProvider {
    previews: Arc<RwLock<HashMap<String, PreviewDetail>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockPreviewProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview for a hash or magnet URI.
    pub async fn set_preview(&self, link: &str, detail: PreviewDetail) {
        let key = extract_info_hash(link).unwrap_or_else(|| link.to_lowercase());
        self.previews.write().await.insert(key, detail);
    }

    /// Register a simple single-file preview with one screenshot.
    pub async fn add_simple(&self, link: &str, name: &str) {
        self.set_preview(
            link,
            PreviewDetail {
                name: name.to_string(),
                total_size_bytes: 1024 * 1024 * 1024,
                file_count: 1,
                kind: PreviewKind::File,
                screenshots: vec![Screenshot {
                    offset_seconds: 60,
                    image_url: format!("https://img.example/{}.jpg", name),
                }],
            },
        )
        .await;
    }

    /// Magnet URIs asked for, in order.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl PreviewProvider for MockPreviewProvider {
    async fn get_preview(&self, magnet_uri: &str) -> Result<PreviewDetail, PreviewError> {
        self.calls.write().await.push(magnet_uri.to_string());

        let key = extract_info_hash(magnet_uri).unwrap_or_else(|| magnet_uri.to_lowercase());
        self.previews
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| PreviewError::NotFound(magnet_uri.to_string()))
    }
}
