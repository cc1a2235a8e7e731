//! Mock metadata provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metadata::{MetadataError, MetadataProvider, MovieCandidate, MovieDetail};

/// Mock metadata provider holding movie details keyed by code.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    movies: Arc<RwLock<HashMap<String, MovieDetail>>>,
    fail_details: Arc<RwLock<bool>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `detail` findable by its `number`.
    pub async fn add_movie(&self, detail: MovieDetail) {
        self.movies
            .write()
            .await
            .insert(detail.number.to_uppercase(), detail);
    }

    /// Make `get_details` fail with an API error, as if the upstream is down.
    pub async fn set_fail_details(&self, fail: bool) {
        *self.fail_details.write().await = fail;
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn search_by_number(&self, code: &str) -> Result<Vec<MovieCandidate>, MetadataError> {
        let movies = self.movies.read().await;
        Ok(movies
            .values()
            .map(|m| MovieCandidate {
                id: m.id.clone(),
                provider: m.provider.clone(),
                number: m.number.clone(),
                title: m.title.clone(),
            })
            .filter(|c| c.matches_code(code))
            .collect())
    }

    async fn get_details(&self, provider: &str, id: &str) -> Result<MovieDetail, MetadataError> {
        if *self.fail_details.read().await {
            return Err(MetadataError::ApiError {
                status: 503,
                message: "mock failure".to_string(),
            });
        }

        self.movies
            .read()
            .await
            .values()
            .find(|m| m.provider == provider && m.id == id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("{}/{}", provider, id)))
    }
}
