//! Common test utilities for API tests.
//!
//! Provides a `TestFixture` that builds the router in-process on a temporary
//! SQLite file, with mock collaborators behind every external service.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use magpie_core::{
    testing::{
        fixtures, MockMediaServer, MockMetadataProvider, MockPreviewProvider, MockTorrentClient,
    },
    Config, DownloadsConfig, JobRunner, LibraryConfig, LibraryReconciler, LibrarySnapshot,
    LinkGate, RecordStore, SqliteRecordStore, SubmissionOrchestrator, TorrentClient,
    TorrentSweeper, TransferEngine,
};

/// Test fixture containing the router and the mocks behind it.
pub struct TestFixture {
    pub router: Router,
    pub store: Arc<SqliteRecordStore>,
    pub previews: Arc<MockPreviewProvider>,
    pub torrent_client: Arc<MockTorrentClient>,
    pub metadata: Arc<MockMetadataProvider>,
    pub media_server: Arc<MockMediaServer>,
    /// Temporary directory for the database, downloads and library
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with every collaborator present.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let downloads_dir = temp_dir.path().join("downloads");
        let library_dir = temp_dir.path().join("library");
        std::fs::create_dir_all(&downloads_dir).expect("Failed to create downloads dir");

        // Create mocks
        let previews = Arc::new(MockPreviewProvider::new());
        let torrent_client = Arc::new(MockTorrentClient::new());
        let metadata = Arc::new(MockMetadataProvider::new());
        metadata
            .add_movie(fixtures::movie_detail("ABC-123", "Some Title", "Actor One"))
            .await;
        let media_server = Arc::new(MockMediaServer::new());

        // Create config
        let mut config = Config::default();
        config.server.port = 0; // Not used for in-process testing
        config.database.path = db_path.clone();
        config.downloads = DownloadsConfig {
            base_dir: downloads_dir.display().to_string(),
            min_video_size_bytes: 0,
            ..Default::default()
        };
        if !test_config.without_library {
            config.library = LibraryConfig {
                root: library_dir,
                download_images: false,
                ..Default::default()
            };
        }

        let store = Arc::new(SqliteRecordStore::new(&db_path).expect("Failed to create store"));
        let snapshot = Arc::new(LibrarySnapshot::new());

        let daemon: Option<Arc<dyn TorrentClient>> = if test_config.without_daemon {
            None
        } else {
            Some(Arc::clone(&torrent_client) as Arc<dyn TorrentClient>)
        };

        let engine = if test_config.without_library {
            None
        } else {
            Some(Arc::new(
                TransferEngine::new(
                    config.library.clone(),
                    Arc::clone(&store) as Arc<dyn RecordStore>,
                    Arc::clone(&metadata) as Arc<dyn magpie_core::MetadataProvider>,
                )
                .expect("Failed to create transfer engine"),
            ))
        };

        let gate = Arc::new(LinkGate::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&previews) as Arc<dyn magpie_core::PreviewProvider>,
        ));

        let submission = Arc::new(SubmissionOrchestrator::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            daemon.clone(),
            Arc::clone(&snapshot),
            config.downloads.clone(),
        ));

        let mut sweeper = TorrentSweeper::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            daemon,
            config.downloads.clone(),
        );
        if let Some(engine) = &engine {
            sweeper = sweeper.with_transfer_engine(Arc::clone(engine));
        }

        let mut runner = JobRunner::new(
            config.jobs.clone(),
            Arc::clone(&submission),
            Arc::new(sweeper),
        );
        if !test_config.without_media_server {
            runner = runner.with_library(Arc::new(LibraryReconciler::new(
                Arc::clone(&store) as Arc<dyn RecordStore>,
                Arc::clone(&media_server) as Arc<dyn magpie_core::MediaServer>,
                Arc::clone(&snapshot),
            )));
        }

        // Create app state with mocks
        let state = Arc::new(magpie_server::state::AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            gate,
            submission,
            Arc::new(runner),
            snapshot,
            engine,
        ));

        // Create router
        let router = magpie_server::api::create_router(state);

        Self {
            router,
            store,
            previews,
            torrent_client,
            metadata,
            media_server,
            temp_dir,
        }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    pub fn library_dir(&self) -> PathBuf {
        self.temp_dir.path().join("library")
    }

    /// Write a small file under the downloads directory.
    pub fn write_download(&self, relative: &str) -> PathBuf {
        let path = self.downloads_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"video").unwrap();
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Configuration for test fixture. Everything is present by default.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Leave the torrent daemon out
    pub without_daemon: bool,
    /// Leave the library root unset (no transfer engine)
    pub without_library: bool,
    /// Leave the media server out
    pub without_media_server: bool,
}

impl TestConfig {
    pub fn without_daemon() -> Self {
        Self {
            without_daemon: true,
            ..Default::default()
        }
    }

    pub fn bare() -> Self {
        Self {
            without_daemon: true,
            without_library: true,
            without_media_server: true,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
