pub mod catalog_code;
pub mod classifier;
pub mod config;
pub mod gate;
pub mod library_sync;
pub mod llm;
pub mod magnet;
pub mod media_server;
pub mod metadata;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod preview;
pub mod store;
pub mod testing;
pub mod torrent_client;
pub mod transfer;
pub mod translator;

pub use classifier::{Classification, Classifier, ClassifierConfig, ClassifierError, LlmClassifier};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, QBittorrentConfig,
    SanitizedConfig, TorrentClientBackend, TorrentClientConfig,
};
pub use gate::{CatalogRef, GateError, GateRequest, LinkGate};
pub use library_sync::{
    match_library, LibraryMatch, LibraryReconciler, LibrarySyncError, LibrarySyncReport, MatchPass,
};
pub use llm::{build_llm_client, LlmClient, LlmConfig, LlmError, LlmProvider};
pub use media_server::{
    JellyfinClient, LibraryItem, LibrarySnapshot, MediaServer, MediaServerConfig, MediaServerError,
    SnapshotView,
};
pub use metadata::{MetaTubeClient, MetadataConfig, MetadataError, MetadataProvider, MovieDetail};
pub use notify::{Notifier, NotifyConfig, NotifyError, WebhookNotifier};
pub use orchestrator::{
    DownloadsConfig, JobRunner, JobRunnerStatus, JobsConfig, OrchestratorError,
    SubmissionOrchestrator, SubmissionReport, SweepReport, TorrentSweeper,
};
pub use preview::{HttpPreviewProvider, PreviewConfig, PreviewError, PreviewProvider};
pub use store::{
    CatalogEntry, CatalogStatus, Document, DownloadStatus, DownloadUrl, NewCatalogEntry,
    RecordStore, SqliteRecordStore, StoreError, TransferLog, TransferStatus,
};
pub use torrent_client::{QBittorrentClient, TorrentClient, TorrentClientError, TorrentInfo};
pub use transfer::{LibraryConfig, TransferEngine, TransferError, TransferOutcome};
pub use translator::{LlmTranslator, Translator, TranslatorConfig, TranslatorError};
