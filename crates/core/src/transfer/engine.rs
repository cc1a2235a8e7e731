//! The transactional transfer of one completed file into the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::metadata::{MetadataError, MetadataProvider, MovieDetail};
use crate::metrics;
use crate::store::{
    CatalogEntryPatch, CatalogStatus, NewTransferLog, RecordStore, TransferLogPatch,
};
use crate::translator::Translator;

use super::config::LibraryConfig;
use super::error::TransferError;
use super::filename::{code_letters, parse_filename, FileAttributes};
use super::images::ArtworkStage;
use super::nfo::render_nfo;
use super::ops;
use super::rules::RuleContext;
use super::undo::UndoLog;

/// A finished transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub log_id: String,
    pub code: String,
    pub destination: PathBuf,
}

/// Everything resolved before the first filesystem mutation.
#[derive(Debug)]
struct TransferPlan {
    source: PathBuf,
    code: String,
    attrs: FileAttributes,
    detail: MovieDetail,
    original_title: String,
    nfo_title: String,
    dir: PathBuf,
    stem: String,
    destination: PathBuf,
}

pub struct TransferEngine {
    config: LibraryConfig,
    store: Arc<dyn RecordStore>,
    metadata: Arc<dyn MetadataProvider>,
    translator: Option<Arc<dyn Translator>>,
    artwork: ArtworkStage,
}

impl TransferEngine {
    pub fn new(
        config: LibraryConfig,
        store: Arc<dyn RecordStore>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Result<Self, TransferError> {
        let artwork = ArtworkStage::new(&config)?;
        Ok(Self {
            config,
            store,
            metadata,
            translator: None,
            artwork,
        })
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Open a `PROCESSING` transfer log for `source` and run the transfer.
    pub async fn transfer(
        &self,
        source: &Path,
        code: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let title = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.display().to_string());

        let log = self.store.create_transfer_log(NewTransferLog {
            source_path: source.display().to_string(),
            title,
            code: Some(code.trim().to_string()).filter(|c| !c.is_empty()),
        })?;

        self.execute(&log.id, source, code).await
    }

    /// Run the transfer for an existing `PROCESSING` log and close the log
    /// with the outcome. Errors are returned after the log is updated.
    pub async fn execute(
        &self,
        log_id: &str,
        source: &Path,
        code: &str,
    ) -> Result<TransferOutcome, TransferError> {
        let started = Instant::now();
        let result = self.run(source, code).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(plan) => {
                self.mark_transferred(&plan.code);
                self.store.update_transfer_log(
                    log_id,
                    TransferLogPatch::success(plan.destination.display().to_string()),
                )?;

                metrics::TRANSFERS.with_label_values(&["success"]).inc();
                metrics::TRANSFER_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
                info!(
                    log_id = %log_id,
                    code = %plan.code,
                    destination = %plan.destination.display(),
                    "Transfer completed"
                );

                Ok(TransferOutcome {
                    log_id: log_id.to_string(),
                    code: plan.code,
                    destination: plan.destination,
                })
            }
            Err(e) => {
                metrics::TRANSFERS.with_label_values(&["failure"]).inc();
                metrics::TRANSFER_DURATION
                    .with_label_values(&["failure"])
                    .observe(elapsed);

                if let Err(store_err) = self
                    .store
                    .update_transfer_log(log_id, TransferLogPatch::failure(e.to_string()))
                {
                    error!(log_id = %log_id, error = %store_err, "Failed to close transfer log");
                }
                warn!(log_id = %log_id, source = %source.display(), error = %e, "Transfer failed");
                Err(e)
            }
        }
    }

    async fn run(&self, source: &Path, code: &str) -> Result<TransferPlan, TransferError> {
        let plan = self.prepare(source, code).await?;

        let mut undo = UndoLog::new();
        if let Err(e) = self.apply(&plan, &mut undo).await {
            metrics::TRANSFER_ROLLBACKS.inc();
            let report = undo.rollback().await;
            warn!(
                code = %plan.code,
                files_removed = report.files_removed,
                files_restored = report.files_restored,
                dirs_removed = report.dirs_removed,
                clean = report.is_clean(),
                "Transfer rolled back"
            );
            return Err(e);
        }

        Ok(plan)
    }

    /// Resolve everything needed for the transfer without touching the disk.
    async fn prepare(&self, source: &Path, code: &str) -> Result<TransferPlan, TransferError> {
        if self.config.root.as_os_str().is_empty() {
            return Err(TransferError::NotConfigured);
        }

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut attrs = parse_filename(&file_name)
            .ok_or_else(|| TransferError::UnparsableFilename(file_name.clone()))?;

        let code = match code.trim() {
            "" => attrs.code.clone(),
            given => given.to_string(),
        };
        if !code.eq_ignore_ascii_case(&attrs.code) {
            attrs.letters = code_letters(&code);
        }

        let source = match fs::metadata(source).await {
            Ok(meta) if meta.is_file() => fs::canonicalize(source)
                .await
                .map_err(|e| TransferError::io(source, e))?,
            _ => return Err(TransferError::SourceMissing(source.to_path_buf())),
        };

        let detail = self.resolve_metadata(&code).await?;
        let original_title = detail.title.clone();
        let detail = self.translate(detail).await;

        let ctx = RuleContext::new(
            &detail,
            &original_title,
            &attrs,
            &code,
            self.config.max_title_len,
        );
        let suffix = attrs.suffix();
        let dir = self
            .config
            .root
            .join(ctx.directory(&self.config.directory_rule, &suffix));
        let stem = ctx.file_stem(&self.config.filename_rule, &suffix);
        let destination = match source.extension() {
            Some(ext) => dir.join(format!("{}.{}", stem, ext.to_string_lossy())),
            None => dir.join(&stem),
        };

        // symlink_metadata also sees dangling links
        if fs::symlink_metadata(&destination).await.is_ok() {
            return Err(TransferError::TargetExists(destination));
        }

        let nfo_title = ctx.expand(&self.config.nfo_title_rule, &suffix);
        debug!(code = %code, destination = %destination.display(), "Transfer planned");

        Ok(TransferPlan {
            source,
            code,
            attrs,
            detail,
            original_title,
            nfo_title,
            dir,
            stem,
            destination,
        })
    }

    /// Every filesystem mutation of the transfer, tracked in `undo`.
    async fn apply(&self, plan: &TransferPlan, undo: &mut UndoLog) -> Result<(), TransferError> {
        undo.create_dir_all(&plan.dir).await?;
        ops::place(
            self.config.transfer_method,
            &plan.source,
            &plan.destination,
            undo,
        )
        .await?;

        self.artwork
            .write_extrafanart(&plan.dir, &plan.detail, undo)
            .await?;
        let artwork = self
            .artwork
            .write_artwork(
                &plan.dir,
                &plan.stem,
                &plan.detail,
                &plan.attrs.marks(),
                undo,
            )
            .await?;

        match render_nfo(
            &plan.detail,
            &plan.nfo_title,
            &plan.original_title,
            &plan.code,
            &plan.attrs,
            &artwork,
        ) {
            Ok(xml) => {
                let path = plan.dir.join(format!("{}.nfo", plan.stem));
                undo.write_new(&path, xml.as_bytes()).await?;
            }
            Err(e) => warn!(code = %plan.code, error = %e, "NFO rendering failed"),
        }

        Ok(())
    }

    async fn resolve_metadata(&self, code: &str) -> Result<MovieDetail, TransferError> {
        let candidates = self
            .metadata
            .search_by_number(code)
            .await
            .map_err(|e| match e {
                MetadataError::NotFound(_) => TransferError::MetadataNotFound(code.to_string()),
                other => TransferError::MetadataUnavailable {
                    code: code.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let candidate = candidates
            .iter()
            .find(|c| c.matches_code(code))
            .or_else(|| candidates.first())
            .ok_or_else(|| TransferError::MetadataNotFound(code.to_string()))?;

        self.metadata
            .get_details(&candidate.provider, &candidate.id)
            .await
            .map_err(|e| TransferError::MetadataUnavailable {
                code: code.to_string(),
                reason: e.to_string(),
            })
    }

    /// Translate title and summary; on any failure keep the originals.
    async fn translate(&self, mut detail: MovieDetail) -> MovieDetail {
        let Some(translator) = &self.translator else {
            return detail;
        };

        let texts = vec![detail.title.clone(), detail.summary.clone()];
        match translator.translate(&texts).await {
            Ok(translated) if translated.len() == 2 => {
                let mut translated = translated.into_iter();
                if let Some(title) = translated.next().filter(|t| !t.trim().is_empty()) {
                    detail.title = title;
                }
                if let Some(summary) = translated.next().filter(|s| !s.trim().is_empty()) {
                    detail.summary = summary;
                }
            }
            Ok(translated) => warn!(
                expected = 2,
                actual = translated.len(),
                "Translator returned the wrong number of texts"
            ),
            Err(e) => warn!(error = %e, "Translation failed, keeping original text"),
        }
        detail
    }

    fn mark_transferred(&self, code: &str) {
        let entry = match self.store.find_catalog_entry_by_code(code) {
            Ok(Some(entry)) => entry,
            Ok(None) => return,
            Err(e) => {
                warn!(code = %code, error = %e, "Catalog lookup failed after transfer");
                return;
            }
        };
        if !entry.status.can_advance_to(CatalogStatus::Transfered) {
            return;
        }

        let patch = CatalogEntryPatch {
            status: Some(CatalogStatus::Transfered),
            added_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.store.update_catalog_entry(&entry.id, patch) {
            warn!(code = %code, error = %e, "Failed to mark catalog entry transfered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NewCatalogEntry, SqliteRecordStore, TransferStatus};
    use crate::testing::{MockMetadataProvider, MockTranslator};
    use crate::transfer::TransferMethod;
    use tempfile::TempDir;

    fn detail(code: &str) -> MovieDetail {
        MovieDetail {
            id: code.to_lowercase(),
            provider: "MOCK".to_string(),
            number: code.to_string(),
            title: "Original Title".to_string(),
            summary: "Summary".to_string(),
            actors: vec!["Actor One".to_string()],
            maker: "Studio".to_string(),
            release_date: Some("2021-07-09".to_string()),
            ..Default::default()
        }
    }

    struct Fixture {
        temp: TempDir,
        store: Arc<SqliteRecordStore>,
        metadata: Arc<MockMetadataProvider>,
    }

    impl Fixture {
        async fn new() -> Self {
            let temp = TempDir::new().unwrap();
            std::fs::create_dir(temp.path().join("downloads")).unwrap();
            let metadata = Arc::new(MockMetadataProvider::new());
            metadata.add_movie(detail("ABC-123")).await;
            Self {
                temp,
                store: Arc::new(SqliteRecordStore::in_memory().unwrap()),
                metadata,
            }
        }

        fn library(&self) -> PathBuf {
            self.temp.path().join("library")
        }

        fn source(&self, name: &str) -> PathBuf {
            let path = self.temp.path().join("downloads").join(name);
            std::fs::write(&path, b"video").unwrap();
            path
        }

        fn engine(&self, method: TransferMethod) -> TransferEngine {
            let config = LibraryConfig {
                root: self.library(),
                transfer_method: method,
                download_images: false,
                ..Default::default()
            };
            TransferEngine::new(config, self.store.clone(), self.metadata.clone()).unwrap()
        }
    }

    #[tokio::test]
    async fn test_move_transfer_success() {
        let fx = Fixture::new().await;
        let entry = fx
            .store
            .create_catalog_entry(NewCatalogEntry {
                code: "ABC-123".to_string(),
                title: "Original Title".to_string(),
                status: CatalogStatus::Downloaded,
            })
            .unwrap();
        let source = fx.source("abc-123-C.mp4");

        let outcome = fx
            .engine(TransferMethod::Move)
            .transfer(&source, "ABC-123")
            .await
            .unwrap();

        let expected_dir = fx.library().join("Actor One").join("ABC-123");
        assert_eq!(outcome.destination, expected_dir.join("ABC-123-C.mp4"));
        assert!(outcome.destination.exists());
        assert!(!source.exists());

        let nfo = std::fs::read_to_string(expected_dir.join("ABC-123-C.nfo")).unwrap();
        assert!(nfo.contains("<title>ABC-123 Original Title</title>"));
        assert!(nfo.contains("<tag>Chinese Subtitles</tag>"));

        let log = fx.store.get_transfer_log(&outcome.log_id).unwrap().unwrap();
        assert_eq!(log.status, TransferStatus::Success);
        assert_eq!(
            log.destination_path.as_deref(),
            Some(outcome.destination.to_string_lossy().as_ref())
        );

        let entry = fx.store.get_catalog_entry(&entry.id).unwrap().unwrap();
        assert_eq!(entry.status, CatalogStatus::Transfered);
        assert!(entry.added_at.is_some());
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let fx = Fixture::new().await;
        let source = fx.source("ABC-123.mkv");

        let outcome = fx
            .engine(TransferMethod::Copy)
            .transfer(&source, "")
            .await
            .unwrap();

        assert!(source.exists());
        assert!(outcome.destination.exists());
        assert_eq!(outcome.code, "ABC-123");
    }

    #[tokio::test]
    async fn test_target_exists_is_a_hard_stop() {
        let fx = Fixture::new().await;
        let source = fx.source("ABC-123.mp4");
        let existing_dir = fx.library().join("Actor One").join("ABC-123");
        std::fs::create_dir_all(&existing_dir).unwrap();
        std::fs::write(existing_dir.join("ABC-123.mp4"), b"already here").unwrap();

        let err = fx
            .engine(TransferMethod::Move)
            .transfer(&source, "ABC-123")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::TargetExists(_)));
        assert!(source.exists());
        assert_eq!(
            std::fs::read(existing_dir.join("ABC-123.mp4")).unwrap(),
            b"already here"
        );
        assert_eq!(std::fs::read_dir(&existing_dir).unwrap().count(), 1);

        let logs = fx.store.list_transfer_logs(10).unwrap();
        assert_eq!(logs[0].status, TransferStatus::Failure);
    }

    #[tokio::test]
    async fn test_failure_after_move_rolls_back_everything() {
        let fx = Fixture::new().await;
        // the sidecar path collides with the transferred file itself
        let source = fx.source("ABC-123.nfo");

        let err = fx
            .engine(TransferMethod::Move)
            .transfer(&source, "ABC-123")
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Io { .. }));
        assert_eq!(std::fs::read(&source).unwrap(), b"video");
        assert!(!fx.library().exists());

        let logs = fx.store.list_transfer_logs(10).unwrap();
        assert_eq!(logs[0].status, TransferStatus::Failure);
        assert!(logs[0].error.is_some());
    }

    #[tokio::test]
    async fn test_precondition_failures() {
        let fx = Fixture::new().await;
        let engine = fx.engine(TransferMethod::Move);

        let unparsable = fx.source("holiday.mp4");
        assert!(matches!(
            engine.transfer(&unparsable, "").await,
            Err(TransferError::UnparsableFilename(_))
        ));

        let missing = fx.temp.path().join("downloads").join("ABC-123.mp4");
        assert!(matches!(
            engine.transfer(&missing, "ABC-123").await,
            Err(TransferError::SourceMissing(_))
        ));

        let unknown = fx.source("XYZ-999.mp4");
        assert!(matches!(
            engine.transfer(&unknown, "XYZ-999").await,
            Err(TransferError::MetadataNotFound(_))
        ));

        fx.metadata.set_fail_details(true).await;
        let source = fx.source("ABC-123.mp4");
        assert!(matches!(
            engine.transfer(&source, "ABC-123").await,
            Err(TransferError::MetadataUnavailable { .. })
        ));

        assert!(!fx.library().exists());
        let logs = fx.store.list_transfer_logs(10).unwrap();
        assert_eq!(logs.len(), 4);
        assert!(logs.iter().all(|l| l.status == TransferStatus::Failure));
    }

    #[tokio::test]
    async fn test_translation_and_fallback() {
        let fx = Fixture::new().await;
        let translator = Arc::new(MockTranslator::new());
        translator
            .set_translation("Original Title", "Translated Title")
            .await;

        let engine = fx
            .engine(TransferMethod::Copy)
            .with_translator(translator.clone());
        let source = fx.source("ABC-123.mp4");
        let outcome = engine.transfer(&source, "ABC-123").await.unwrap();

        let nfo_path = outcome.destination.with_extension("nfo");
        let nfo = std::fs::read_to_string(nfo_path).unwrap();
        assert!(nfo.contains("<title>ABC-123 Translated Title</title>"));
        assert!(nfo.contains("<originaltitle>Original Title</originaltitle>"));

        translator.set_fail(true).await;
        std::fs::remove_dir_all(fx.library()).unwrap();
        let outcome = engine.transfer(&source, "ABC-123").await.unwrap();
        let nfo = std::fs::read_to_string(outcome.destination.with_extension("nfo")).unwrap();
        assert!(nfo.contains("<title>ABC-123 Original Title</title>"));
    }

    #[tokio::test]
    async fn test_missing_library_root() {
        let fx = Fixture::new().await;
        let engine = TransferEngine::new(
            LibraryConfig::default(),
            fx.store.clone(),
            fx.metadata.clone(),
        )
        .unwrap();
        let source = fx.source("ABC-123.mp4");

        assert!(matches!(
            engine.transfer(&source, "ABC-123").await,
            Err(TransferError::NotConfigured)
        ));
    }
}
