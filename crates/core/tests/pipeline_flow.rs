//! Pipeline integration tests.
//!
//! These tests drive a link batch through the whole pipeline against a real
//! SQLite file and the in-crate mocks:
//! gate -> submission -> sweep -> transfer -> library sync

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use magpie_core::{
    magnet::canonical_magnet,
    store::DownloadUrlUpdate,
    testing::{
        fixtures, MockMediaServer, MockMetadataProvider, MockPreviewProvider, MockTorrentClient,
    },
    CatalogRef, CatalogStatus, DownloadStatus, DownloadsConfig, GateError, GateRequest,
    JobRunner, JobsConfig, LibraryConfig, LibraryReconciler, LibrarySnapshot, LinkGate, NewCatalogEntry, RecordStore,
    SqliteRecordStore, SubmissionOrchestrator, TorrentSweeper, TransferEngine, TransferError,
    TransferStatus,
};

/// Test helper holding every collaborator of the pipeline.
struct TestHarness {
    store: Arc<SqliteRecordStore>,
    previews: Arc<MockPreviewProvider>,
    torrent_client: Arc<MockTorrentClient>,
    metadata: Arc<MockMetadataProvider>,
    media_server: Arc<MockMediaServer>,
    snapshot: Arc<LibrarySnapshot>,
    temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteRecordStore::new(&temp_dir.path().join("test.db"))
                .expect("Failed to create store"),
        );
        std::fs::create_dir_all(temp_dir.path().join("downloads")).unwrap();

        let metadata = Arc::new(MockMetadataProvider::new());
        metadata
            .add_movie(fixtures::movie_detail("ABC-123", "Some Title", "Actor One"))
            .await;

        Self {
            store,
            previews: Arc::new(MockPreviewProvider::new()),
            torrent_client: Arc::new(MockTorrentClient::new()),
            metadata,
            media_server: Arc::new(MockMediaServer::new()),
            snapshot: Arc::new(LibrarySnapshot::new()),
            temp_dir,
        }
    }

    fn downloads_dir(&self) -> PathBuf {
        self.temp_dir.path().join("downloads")
    }

    fn library_dir(&self) -> PathBuf {
        self.temp_dir.path().join("library")
    }

    fn downloads_config(&self) -> DownloadsConfig {
        DownloadsConfig {
            base_dir: self.downloads_dir().display().to_string(),
            min_video_size_bytes: 0,
            ..Default::default()
        }
    }

    fn gate(&self) -> LinkGate {
        LinkGate::new(self.store.clone(), self.previews.clone())
    }

    fn submission(&self) -> SubmissionOrchestrator {
        SubmissionOrchestrator::new(
            self.store.clone(),
            Some(self.torrent_client.clone()),
            self.snapshot.clone(),
            self.downloads_config(),
        )
    }

    fn engine(&self) -> Arc<TransferEngine> {
        let config = LibraryConfig {
            root: self.library_dir(),
            download_images: false,
            ..Default::default()
        };
        Arc::new(
            TransferEngine::new(config, self.store.clone(), self.metadata.clone())
                .expect("Failed to create transfer engine"),
        )
    }

    fn sweeper(&self) -> TorrentSweeper {
        TorrentSweeper::new(
            self.store.clone(),
            Some(self.torrent_client.clone()),
            self.downloads_config(),
        )
        .with_transfer_engine(self.engine())
    }

    fn runner(&self) -> JobRunner {
        JobRunner::new(
            JobsConfig::default(),
            Arc::new(self.submission()),
            Arc::new(self.sweeper()),
        )
    }

    fn reconciler(&self) -> LibraryReconciler {
        LibraryReconciler::new(
            self.store.clone(),
            self.media_server.clone(),
            self.snapshot.clone(),
        )
    }

    fn write_file(&self, relative: &str) -> PathBuf {
        let path = self.downloads_dir().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, b"video").unwrap();
        path
    }
}

fn request(urls: Vec<String>) -> GateRequest {
    GateRequest {
        urls,
        ..Default::default()
    }
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(Result::ok).count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_duplicate_batch_persists_nothing() {
    let harness = TestHarness::new().await;
    harness.previews.add_simple(&fixtures::magnet(1), "First").await;
    harness.previews.add_simple(&fixtures::magnet(2), "Second").await;

    harness
        .gate()
        .accept(request(vec![fixtures::magnet(1)]))
        .await
        .unwrap();

    // link 1 in a different spelling, next to a new link
    let result = harness
        .gate()
        .accept(request(vec![
            fixtures::magnet(2),
            format!("{}&dn=Renamed", fixtures::magnet(1).to_uppercase()),
        ]))
        .await;

    match result {
        Err(GateError::DuplicateLink(urls)) => {
            assert_eq!(urls, vec![canonical_magnet(&fixtures::hash(1))]);
        }
        other => panic!("expected DuplicateLink, got {:?}", other.map(|d| d.id)),
    }

    let stored = harness
        .store
        .find_by_canonical_urls(&[canonical_magnet(&fixtures::hash(2))])
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_same_batch_twice_is_rejected_the_second_time() {
    let harness = TestHarness::new().await;
    harness.previews.add_simple(&fixtures::magnet(3), "Third").await;

    let first = harness
        .gate()
        .accept(request(vec![fixtures::magnet(3)]))
        .await
        .unwrap();
    assert_eq!(first.title, "Third");

    let second = harness
        .gate()
        .accept(request(vec![fixtures::magnet(3)]))
        .await;
    assert!(matches!(second, Err(GateError::DuplicateLink(_))));
}

#[tokio::test]
async fn test_repeated_link_inside_one_batch_is_kept() {
    let harness = TestHarness::new().await;
    harness.previews.add_simple(&fixtures::magnet(8), "Eighth").await;

    let document = harness
        .gate()
        .accept(request(vec![
            fixtures::magnet(8),
            fixtures::hash(8).to_uppercase(),
        ]))
        .await
        .unwrap();

    assert_eq!(document.download_urls.len(), 2);
    assert_eq!(document.download_urls[0].hash, document.download_urls[1].hash);
    assert_eq!(document.title, "Eighth (2)");
    // one preview lookup per distinct hash
    assert_eq!(harness.previews.calls().await.len(), 1);
}

#[tokio::test]
async fn test_unpreviewable_batch_persists_nothing() {
    let harness = TestHarness::new().await;

    let result = harness
        .gate()
        .accept(request(vec![fixtures::magnet(4), fixtures::magnet(5)]))
        .await;
    assert!(matches!(result, Err(GateError::NoPreviewAvailable)));

    let stored = harness
        .store
        .find_by_canonical_urls(&[
            canonical_magnet(&fixtures::hash(4)),
            canonical_magnet(&fixtures::hash(5)),
        ])
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_catalog_download_end_to_end() {
    let harness = TestHarness::new().await;
    let entry = harness
        .store
        .create_catalog_entry(NewCatalogEntry {
            code: "ABC-123".to_string(),
            title: "Some Title".to_string(),
            status: CatalogStatus::Subscribed,
        })
        .unwrap();
    harness
        .previews
        .add_simple(&fixtures::magnet(10), "ABC-123")
        .await;

    // gate
    let document = harness
        .gate()
        .accept(GateRequest {
            urls: vec![fixtures::magnet(10)],
            catalog_entry: Some(CatalogRef {
                code: "abc-123".to_string(),
                title: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(document.download_urls[0].linked_catalog_entry_ids, vec![entry.id.clone()]);

    // submission
    let report = harness.submission().submit(&document).await.unwrap();
    assert_eq!(report.submitted, 1);
    let entry_now = harness.store.get_catalog_entry(&entry.id).unwrap().unwrap();
    assert_eq!(entry_now.status, CatalogStatus::Downloading);

    // the daemon finishes a two-part release with a sample next to it
    let content = harness.downloads_dir().join("ABC-123");
    harness.write_file("ABC-123/ABC-123-cd1.mp4");
    harness.write_file("ABC-123/ABC-123-cd2.mp4");
    harness.write_file("ABC-123/ABC-123-sample.mp4");
    harness.write_file("ABC-123/readme.txt");
    let hash = fixtures::hash(10);
    harness.torrent_client.set_progress(&hash, 1.0).await;
    harness
        .torrent_client
        .set_content_path(&hash, content.display().to_string())
        .await;

    // sweep
    let sweep = harness.sweeper().sweep().await.unwrap();
    assert_eq!(sweep.completed, 1);
    assert_eq!(sweep.transfers_succeeded, 2);
    assert_eq!(sweep.transfers_failed, 0);

    let link = harness
        .store
        .get_download_url(&document.download_urls[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(link.status, DownloadStatus::Downloaded);

    let entry_now = harness.store.get_catalog_entry(&entry.id).unwrap().unwrap();
    assert_eq!(entry_now.status, CatalogStatus::Transfered);
    assert!(entry_now.added_at.is_some());

    let target = harness.library_dir().join("Actor One").join("ABC-123");
    assert!(target.join("ABC-123-cd1.mp4").exists());
    assert!(target.join("ABC-123-cd2.mp4").exists());
    assert!(target.join("ABC-123-cd1.nfo").exists());
    assert!(content.join("ABC-123-sample.mp4").exists());

    let logs = harness.store.list_transfer_logs(10).unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.status == TransferStatus::Success));

    // a second sweep has nothing left to do
    let again = harness.sweeper().sweep().await.unwrap();
    assert_eq!(again.tracked, 0);
    assert_eq!(harness.store.list_transfer_logs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_failed_transfer_does_not_stop_sweep() {
    let harness = TestHarness::new().await;
    harness.store
        .create_catalog_entry(NewCatalogEntry {
            code: "ABC-123".to_string(),
            title: "Some Title".to_string(),
            status: CatalogStatus::Subscribed,
        })
        .unwrap();
    harness.previews.add_simple(&fixtures::magnet(20), "one").await;

    let document = harness
        .gate()
        .accept(GateRequest {
            urls: vec![fixtures::magnet(20)],
            catalog_entry: Some(CatalogRef {
                code: "ABC-123".to_string(),
                title: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    harness.submission().submit(&document).await.unwrap();

    // the destination of the first file is already taken
    let target = harness.library_dir().join("Actor One").join("ABC-123");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("ABC-123-cd1.mp4"), b"existing").unwrap();

    let content = harness.downloads_dir().join("release");
    let first = harness.write_file("release/ABC-123-cd1.mp4");
    harness.write_file("release/ABC-123-cd2.mp4");
    let hash = fixtures::hash(20);
    harness.torrent_client.set_progress(&hash, 1.0).await;
    harness
        .torrent_client
        .set_content_path(&hash, content.display().to_string())
        .await;

    let sweep = harness.sweeper().sweep().await.unwrap();
    assert_eq!(sweep.transfers_failed, 1);
    assert_eq!(sweep.transfers_succeeded, 1);

    // the colliding source is untouched and the existing file kept
    assert!(first.exists());
    assert_eq!(std::fs::read(target.join("ABC-123-cd1.mp4")).unwrap(), b"existing");
    assert!(target.join("ABC-123-cd2.mp4").exists());

    let logs = harness.store.list_transfer_logs(10).unwrap();
    assert_eq!(
        logs.iter().filter(|l| l.status == TransferStatus::Failure).count(),
        1
    );
}

#[tokio::test]
async fn test_manual_transfer_rejects_existing_target() {
    let harness = TestHarness::new().await;
    let source = harness.write_file("ABC-123.mp4");

    let target = harness.library_dir().join("Actor One").join("ABC-123");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("ABC-123.mp4"), b"existing").unwrap();

    let result = harness.engine().transfer(&source, "ABC-123").await;
    assert!(matches!(result, Err(TransferError::TargetExists(_))));
    assert!(source.exists());
    assert_eq!(count_files(&target), 1);

    let logs = harness.store.list_transfer_logs(10).unwrap();
    assert_eq!(logs[0].status, TransferStatus::Failure);
}

#[tokio::test]
async fn test_removed_torrent_regresses_catalog_entry() {
    let harness = TestHarness::new().await;
    let entry = harness
        .store
        .create_catalog_entry(NewCatalogEntry {
            code: "XYZ-001".to_string(),
            title: "Other".to_string(),
            status: CatalogStatus::Subscribed,
        })
        .unwrap();
    harness.previews.add_simple(&fixtures::magnet(30), "XYZ-001").await;

    let document = harness
        .gate()
        .accept(GateRequest {
            urls: vec![fixtures::magnet(30)],
            catalog_entry: Some(CatalogRef {
                code: "XYZ-001".to_string(),
                title: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    harness.submission().submit(&document).await.unwrap();

    harness
        .torrent_client
        .remove_torrent(&fixtures::hash(30))
        .await;
    let sweep = harness.runner().run_sweep().await.unwrap();
    assert_eq!(sweep.regressed, 1);

    // the retry pass after the sweep must not bring the torrent back
    assert!(!harness.torrent_client.has_torrent(&fixtures::hash(30)).await);
    assert_eq!(harness.torrent_client.added_torrents().await.len(), 1);

    let link = harness
        .store
        .get_download_url(&document.download_urls[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(link.status, DownloadStatus::Undownload);
    let entry = harness.store.get_catalog_entry(&entry.id).unwrap().unwrap();
    assert_eq!(entry.status, CatalogStatus::Undownload);

    // only an explicit submit sends it again
    let document = harness.store.get_document(&document.id).unwrap().unwrap();
    let report = harness.submission().submit(&document).await.unwrap();
    assert_eq!(report.submitted, 1);
    assert!(harness.torrent_client.has_torrent(&fixtures::hash(30)).await);
}

#[tokio::test]
async fn test_stale_sweep_write_is_a_conflict() {
    let harness = TestHarness::new().await;
    harness.previews.add_simple(&fixtures::magnet(40), "Generic").await;
    let document = harness
        .gate()
        .accept(request(vec![fixtures::magnet(40)]))
        .await
        .unwrap();
    harness.submission().submit(&document).await.unwrap();

    let link = harness
        .store
        .get_download_url(&document.download_urls[0].id)
        .unwrap()
        .unwrap();

    // another writer gets in between
    harness
        .store
        .update_download_url_status(&link.id, link.version, DownloadUrlUpdate::status(DownloadStatus::Paused))
        .unwrap();
    let stale = harness
        .store
        .update_download_url_status(&link.id, link.version, DownloadUrlUpdate::status(DownloadStatus::Error));
    assert!(matches!(stale, Err(magpie_core::StoreError::Conflict { .. })));
}

#[tokio::test]
async fn test_library_sync_marks_and_resets_entries() {
    let harness = TestHarness::new().await;
    let entry = harness
        .store
        .create_catalog_entry(NewCatalogEntry {
            code: "ABC-123".to_string(),
            title: "Some Title".to_string(),
            status: CatalogStatus::Subscribed,
        })
        .unwrap();
    harness
        .media_server
        .add_library(
            "lib1",
            "Movies",
            vec![fixtures::library_item("item-1", "ABC-123 Some Title")],
        )
        .await;

    let report = harness.reconciler().run().await.unwrap();
    assert_eq!(report.added, 1);
    let found = harness.store.get_catalog_entry(&entry.id).unwrap().unwrap();
    assert_eq!(found.status, CatalogStatus::Added);
    assert_eq!(found.library_ref.as_deref(), Some("item-1"));

    // already in the library: a new catalog batch is not submitted
    harness.previews.add_simple(&fixtures::magnet(50), "ABC-123").await;
    let document = harness
        .gate()
        .accept(GateRequest {
            urls: vec![fixtures::magnet(50)],
            catalog_entry: Some(CatalogRef {
                code: "ABC-123".to_string(),
                title: None,
            }),
            ..Default::default()
        })
        .await
        .unwrap();
    let submitted = harness.submission().submit(&document).await.unwrap();
    assert_eq!(submitted.skipped, 1);
    assert!(harness.torrent_client.added_torrents().await.is_empty());

    // the item disappears from the library
    harness.media_server.clear().await;
    let report = harness.reconciler().run().await.unwrap();
    assert_eq!(report.reset, 1);
    let reset = harness.store.get_catalog_entry(&entry.id).unwrap().unwrap();
    assert_eq!(reset.status, CatalogStatus::Uncheck);
    assert!(reset.library_ref.is_none());
}
