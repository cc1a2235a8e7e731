//! In-memory copy of the media library.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::info;

use crate::catalog_code::CodePattern;

use super::{LibraryItem, MediaServer, MediaServerError};

/// Point-in-time view of the snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    pub items: Arc<Vec<LibraryItem>>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SnapshotView {
    /// First item whose name, original title or sort name contains `code`.
    ///
    /// Case and separators are ignored, so `abc123` finds `ABC-123`, but the
    /// code must stand on its own: `ABC-12` does not find `ABC-123`.
    pub fn find_by_code(&self, code: &str) -> Option<&LibraryItem> {
        let pattern = CodePattern::new([code])?;
        self.items
            .iter()
            .find(|item| item.names().any(|name| pattern.is_match(name)))
    }
}

/// Owns the cached library items.
///
/// `refresh` replaces the items wholesale; readers get an `Arc` to whichever
/// list was current when they asked.
#[derive(Debug, Default)]
pub struct LibrarySnapshot {
    state: RwLock<SnapshotView>,
}

impl LibrarySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch every item of every library and swap it in.
    ///
    /// On error the previous snapshot stays in place.
    pub async fn refresh(&self, server: &dyn MediaServer) -> Result<usize, MediaServerError> {
        let libraries = server.list_libraries().await?;
        let per_library = try_join_all(
            libraries
                .iter()
                .map(|library| server.list_items_recursive(&library.id)),
        )
        .await?;
        let items: Vec<LibraryItem> = per_library.into_iter().flatten().collect();

        let count = items.len();
        self.replace(items).await;
        info!(server = %server.name(), items = count, "Library snapshot refreshed");
        Ok(count)
    }

    /// Swap in a new item list.
    pub async fn replace(&self, items: Vec<LibraryItem>) {
        let mut state = self.state.write().await;
        *state = SnapshotView {
            items: Arc::new(items),
            last_updated: Some(Utc::now()),
        };
    }

    pub async fn read(&self) -> SnapshotView {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockMediaServer;

    fn item(id: &str, name: &str) -> LibraryItem {
        LibraryItem {
            id: id.to_string(),
            name: name.to_string(),
            original_title: None,
            sort_name: None,
            item_type: "Movie".to_string(),
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let server = MockMediaServer::new();
        server
            .add_library("lib1", "Movies", vec![item("1", "First"), item("2", "Second")])
            .await;

        let snapshot = LibrarySnapshot::new();
        snapshot.replace(vec![item("old", "Stale")]).await;

        let count = snapshot.refresh(&server).await.unwrap();
        assert_eq!(count, 2);

        let view = snapshot.read().await;
        assert!(view.last_updated.is_some());
        assert!(view.items.iter().all(|i| i.id != "old"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_items() {
        let server = MockMediaServer::new();
        server.set_fail(true).await;

        let snapshot = LibrarySnapshot::new();
        snapshot.replace(vec![item("1", "Kept")]).await;

        assert!(snapshot.refresh(&server).await.is_err());
        assert_eq!(snapshot.read().await.items.len(), 1);
    }

    #[test]
    fn test_find_by_code_ignores_case_and_separators() {
        let mut with_sort = item("2", "Title only");
        with_sort.sort_name = Some("xyz-001 title".to_string());

        let view = SnapshotView {
            items: Arc::new(vec![item("1", "ABC-123 Something"), with_sort]),
            last_updated: None,
        };

        assert_eq!(view.find_by_code("abc123").map(|i| i.id.as_str()), Some("1"));
        assert_eq!(view.find_by_code("XYZ-001").map(|i| i.id.as_str()), Some("2"));
        assert!(view.find_by_code("QQQ-999").is_none());
        assert!(view.find_by_code("").is_none());
    }

    #[test]
    fn test_find_by_code_rejects_prefix_of_longer_code() {
        let view = SnapshotView {
            items: Arc::new(vec![item("lib-1", "ABC-123 Some Movie")]),
            last_updated: None,
        };

        assert!(view.find_by_code("ABC-12").is_none());
        assert!(view.find_by_code("BC-123").is_none());
        assert_eq!(view.find_by_code("ABC-123").map(|i| i.id.as_str()), Some("lib-1"));
    }
}
