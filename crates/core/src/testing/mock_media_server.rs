//! Mock media library server for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::media_server::{LibraryInfo, LibraryItem, MediaServer, MediaServerError};

#[derive(Debug, Default)]
pub struct MockMediaServer {
    libraries: Arc<RwLock<Vec<(LibraryInfo, Vec<LibraryItem>)>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockMediaServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_library(&self, id: &str, name: &str, items: Vec<LibraryItem>) {
        self.libraries.write().await.push((
            LibraryInfo {
                id: id.to_string(),
                name: name.to_string(),
            },
            items,
        ));
    }

    /// Drop every library.
    pub async fn clear(&self) {
        self.libraries.write().await.clear();
    }

    /// Make every call fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    async fn check(&self) -> Result<(), MediaServerError> {
        if *self.fail.read().await {
            return Err(MediaServerError::ApiError {
                status: 500,
                message: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaServer for MockMediaServer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_libraries(&self) -> Result<Vec<LibraryInfo>, MediaServerError> {
        self.check().await?;
        Ok(self
            .libraries
            .read()
            .await
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    async fn list_items_recursive(
        &self,
        library_id: &str,
    ) -> Result<Vec<LibraryItem>, MediaServerError> {
        self.check().await?;
        Ok(self
            .libraries
            .read()
            .await
            .iter()
            .find(|(info, _)| info.id == library_id)
            .map(|(_, items)| items.clone())
            .unwrap_or_default())
    }
}
