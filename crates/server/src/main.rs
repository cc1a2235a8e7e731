use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use magpie_core::{
    build_llm_client, load_config, validate_config, Classifier, HttpPreviewProvider,
    JellyfinClient, JobRunner, LibraryReconciler, LibrarySnapshot, LinkGate, LlmClassifier,
    LlmClient, LlmTranslator, MediaServer, MetaTubeClient, MetadataProvider, Notifier,
    QBittorrentClient, RecordStore, SqliteRecordStore, SubmissionOrchestrator, TorrentClient,
    TorrentClientBackend, TorrentSweeper, TransferEngine, WebhookNotifier,
};
use magpie_server::api::create_router;
use magpie_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MAGPIE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Record store
    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteRecordStore::new(&config.database.path).context("Failed to open record store")?,
    );
    info!("Record store initialized");

    // Create torrent client if configured
    let torrent_client: Option<Arc<dyn TorrentClient>> = match &config.torrent_client {
        Some(tc_config) => match tc_config.backend {
            TorrentClientBackend::QBittorrent => {
                if let Some(qbit_config) = &tc_config.qbittorrent {
                    info!("Initializing qBittorrent client at {}", qbit_config.url);
                    match QBittorrentClient::new(qbit_config.clone()) {
                        Ok(client) => Some(Arc::new(client)),
                        Err(e) => {
                            error!("Failed to initialize qBittorrent client: {}", e);
                            None
                        }
                    }
                } else {
                    error!("qBittorrent backend selected but no qbittorrent config provided");
                    None
                }
            }
        },
        None => {
            info!("No torrent client configured");
            None
        }
    };

    // Preview service and metadata provider
    let previews = Arc::new(
        HttpPreviewProvider::new(&config.preview).context("Failed to create preview client")?,
    );
    let metadata: Arc<dyn MetadataProvider> = Arc::new(
        MetaTubeClient::new(&config.metadata).context("Failed to create metadata client")?,
    );
    info!("Metadata provider at {}", config.metadata.url);

    // LLM-backed helpers
    let llm: Option<Arc<dyn LlmClient>> = match &config.llm {
        Some(llm_config) => match build_llm_client(llm_config) {
            Ok(client) => {
                info!("LLM client initialized (model: {})", llm_config.model);
                Some(client)
            }
            Err(e) => {
                error!("Failed to create LLM client: {}", e);
                None
            }
        },
        None => None,
    };

    let classifier: Option<Arc<dyn Classifier>> = match (&llm, config.classifier.enabled) {
        (Some(llm), true) => Some(Arc::new(LlmClassifier::new(Arc::clone(llm)))),
        (None, true) => {
            warn!("Classifier enabled but no LLM configured");
            None
        }
        _ => None,
    };

    let translator = match (&llm, config.translator.enabled) {
        (Some(llm), true) => Some(Arc::new(LlmTranslator::new(
            Arc::clone(llm),
            config.translator.target_language.clone(),
        ))),
        (None, true) => {
            warn!("Translator enabled but no LLM configured");
            None
        }
        _ => None,
    };

    // Transfer engine, only with a library root
    let engine = if config.library.root.as_os_str().is_empty() {
        info!("Library root not configured, transfers disabled");
        None
    } else {
        let mut engine = TransferEngine::new(
            config.library.clone(),
            Arc::clone(&store),
            Arc::clone(&metadata),
        )
        .context("Failed to create transfer engine")?;
        if let Some(translator) = translator {
            engine = engine.with_translator(translator);
        }
        info!("Transfer engine filing into {:?}", config.library.root);
        Some(Arc::new(engine))
    };

    // Media server and library snapshot
    let snapshot = Arc::new(LibrarySnapshot::new());
    let media_server: Option<Arc<dyn MediaServer>> = match &config.media_server {
        Some(ms_config) => match JellyfinClient::new(ms_config) {
            Ok(client) => {
                info!("Media server at {}", ms_config.url);
                Some(Arc::new(client))
            }
            Err(e) => {
                error!("Failed to create media server client: {}", e);
                None
            }
        },
        None => {
            info!("No media server configured");
            None
        }
    };

    let notifier: Option<Arc<dyn Notifier>> = match WebhookNotifier::from_config(&config.notify) {
        Ok(Some(notifier)) => Some(Arc::new(notifier)),
        Ok(None) => None,
        Err(e) => {
            error!("Failed to create webhook notifier: {}", e);
            None
        }
    };

    // Pipeline components
    let item_delay = Duration::from_millis(config.jobs.item_delay_ms);

    let gate = Arc::new(LinkGate::new(Arc::clone(&store), previews));

    let mut submission = SubmissionOrchestrator::new(
        Arc::clone(&store),
        torrent_client.clone(),
        Arc::clone(&snapshot),
        config.downloads.clone(),
    )
    .with_item_delay(item_delay);
    if let Some(classifier) = classifier {
        submission = submission.with_classifier(classifier);
    }
    let submission = Arc::new(submission);

    let mut sweeper = TorrentSweeper::new(
        Arc::clone(&store),
        torrent_client.clone(),
        config.downloads.clone(),
    )
    .with_item_delay(item_delay);
    if let Some(engine) = &engine {
        sweeper = sweeper.with_transfer_engine(Arc::clone(engine));
    }
    let sweeper = Arc::new(sweeper);

    let mut runner = JobRunner::new(
        config.jobs.clone(),
        Arc::clone(&submission),
        Arc::clone(&sweeper),
    );
    if let Some(server) = media_server {
        runner = runner.with_library(Arc::new(LibraryReconciler::new(
            Arc::clone(&store),
            server,
            Arc::clone(&snapshot),
        )));
    }
    if let Some(notifier) = notifier {
        runner = runner.with_notifier(notifier);
    }
    let runner = Arc::new(runner);
    runner.start().await;

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        gate,
        submission,
        Arc::clone(&runner),
        snapshot,
        engine,
    ));
    info!("Config hash: {}", state.config_hash());

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    runner.stop().await;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
