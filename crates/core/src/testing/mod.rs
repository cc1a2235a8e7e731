//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! so the whole pipeline can be driven without a daemon, a metadata API or a
//! media server.
//!
//! # Example
//!
//! ```rust,ignore
//! use magpie_core::testing::{MockPreviewProvider, MockTorrentClient};
//!
//! let previews = MockPreviewProvider::new();
//! previews.add_simple(&fixtures::magnet(1), "Some Release").await;
//!
//! let client = MockTorrentClient::new();
//! client.set_progress(&fixtures::hash(1), 1.0).await;
//! ```

mod mock_llm;
mod mock_media_server;
mod mock_metadata;
mod mock_notifier;
mod mock_preview;
mod mock_torrent_client;

pub use mock_llm::{MockClassifier, MockLlmClient, MockTranslator};
pub use mock_media_server::MockMediaServer;
pub use mock_metadata::MockMetadataProvider;
pub use mock_notifier::MockNotifier;
pub use mock_preview::MockPreviewProvider;
pub use mock_torrent_client::{MockTorrentClient, RecordedAddTorrent};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media_server::LibraryItem;
    use crate::metadata::MovieDetail;

    /// A deterministic 40-character hex info hash.
    pub fn hash(n: u32) -> String {
        format!("{:040x}", n)
    }

    /// Canonical magnet URI for [`hash`].
    pub fn magnet(n: u32) -> String {
        format!("magnet:?xt=urn:btih:{}", hash(n))
    }

    /// Movie detail with reasonable defaults and no artwork URLs.
    pub fn movie_detail(code: &str, title: &str, actor: &str) -> MovieDetail {
        MovieDetail {
            id: code.to_lowercase(),
            provider: "MOCK".to_string(),
            number: code.to_string(),
            title: title.to_string(),
            summary: format!("Summary of {}.", title),
            actors: vec![actor.to_string()],
            maker: "Mock Studio".to_string(),
            release_date: Some("2021-07-09".to_string()),
            runtime: 120,
            ..Default::default()
        }
    }

    /// A movie item of the media library.
    pub fn library_item(id: &str, name: &str) -> LibraryItem {
        LibraryItem {
            id: id.to_string(),
            name: name.to_string(),
            original_title: None,
            sort_name: None,
            item_type: "Movie".to_string(),
        }
    }
}
