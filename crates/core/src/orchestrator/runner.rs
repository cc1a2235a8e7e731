//! Periodic job runner.
//!
//! Two background loops:
//! - **Sweep**: torrent state sweep, then a retry pass over links that never
//!   reached the daemon. Links the sweep reset stay put until resubmitted by
//!   hand.
//! - **Library sync**: refresh the library snapshot and reconcile the catalog.
//!
//! A failing run is logged and forwarded to the notifier; the loop keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::library_sync::{LibraryReconciler, LibrarySyncError, LibrarySyncReport};
use crate::metrics;
use crate::notify::Notifier;

use super::config::JobsConfig;
use super::submission::SubmissionOrchestrator;
use super::sweep::TorrentSweeper;
use super::types::{JobRunnerStatus, OrchestratorError, SweepReport};

pub struct JobRunner {
    config: JobsConfig,
    submission: Arc<SubmissionOrchestrator>,
    sweeper: Arc<TorrentSweeper>,
    library: Option<Arc<LibraryReconciler>>,
    notifier: Option<Arc<dyn Notifier>>,

    // Runtime state
    running: Arc<AtomicBool>,
    status: Arc<RwLock<JobRunnerStatus>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl JobRunner {
    pub fn new(
        config: JobsConfig,
        submission: Arc<SubmissionOrchestrator>,
        sweeper: Arc<TorrentSweeper>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            submission,
            sweeper,
            library: None,
            notifier: None,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(RwLock::new(JobRunnerStatus::default())),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_library(mut self, library: Arc<LibraryReconciler>) -> Self {
        self.library = Some(library);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Spawn the background loops. Does nothing when jobs are disabled.
    pub async fn start(&self) {
        if !self.config.enabled {
            info!("Background jobs disabled");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Job runner already running");
            return;
        }

        info!(
            sweep_interval_secs = self.config.sweep_interval_secs,
            library_sync_interval_secs = self.config.library_sync_interval_secs,
            "Starting job runner"
        );

        let mut tasks = self.tasks.lock().await;
        tasks.push(self.spawn_sweep_loop());
        if let Some(handle) = self.spawn_library_loop() {
            tasks.push(handle);
        }
    }

    /// Stop the loops. A run already in progress finishes first.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping job runner");
        let _ = self.shutdown_tx.send(());

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Job loop ended abnormally");
            }
        }

        info!("Job runner stopped");
    }

    pub async fn status(&self) -> JobRunnerStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.running.load(Ordering::Relaxed);
        status
    }

    /// Run one sweep pass now.
    pub async fn run_sweep(&self) -> Result<SweepReport, OrchestratorError> {
        Self::sweep_pass(
            &self.sweeper,
            &self.submission,
            &self.notifier,
            &self.status,
            self.config.retry_batch_size,
        )
        .await
    }

    /// Run one library sync now. `None` when no media server is configured.
    pub async fn run_library_sync(&self) -> Option<Result<LibrarySyncReport, LibrarySyncError>> {
        let library = self.library.as_ref()?;
        Some(Self::library_pass(library, &self.notifier, &self.status).await)
    }

    fn spawn_sweep_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let sweeper = Arc::clone(&self.sweeper);
        let submission = Arc::clone(&self.submission);
        let notifier = self.notifier.clone();
        let status = Arc::clone(&self.status);
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let retry_batch = self.config.retry_batch_size;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Sweep loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        // errors are already logged and forwarded
                        let _ = Self::sweep_pass(&sweeper, &submission, &notifier, &status, retry_batch).await;
                    }
                }
            }
            info!("Sweep loop stopped");
        })
    }

    fn spawn_library_loop(&self) -> Option<JoinHandle<()>> {
        let library = self.library.clone()?;
        let running = Arc::clone(&self.running);
        let notifier = self.notifier.clone();
        let status = Arc::clone(&self.status);
        let interval = Duration::from_secs(self.config.library_sync_interval_secs.max(1));
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Some(tokio::spawn(async move {
            info!("Library sync loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Library sync loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let _ = Self::library_pass(&library, &notifier, &status).await;
                    }
                }
            }
            info!("Library sync loop stopped");
        }))
    }

    async fn sweep_pass(
        sweeper: &TorrentSweeper,
        submission: &SubmissionOrchestrator,
        notifier: &Option<Arc<dyn Notifier>>,
        status: &RwLock<JobRunnerStatus>,
        retry_batch: i64,
    ) -> Result<SweepReport, OrchestratorError> {
        let result = sweeper.sweep().await;
        status.write().await.last_sweep_at = Some(Utc::now());

        let report = match result {
            Ok(report) => {
                metrics::JOB_RUNS.with_label_values(&["sweep", "success"]).inc();
                report
            }
            Err(e) => {
                metrics::JOB_RUNS.with_label_values(&["sweep", "failure"]).inc();
                error!(error = %e, "Torrent sweep failed");
                forward(notifier, "Torrent sweep failed", &e.to_string()).await;
                return Err(e);
            }
        };

        match submission.submit_pending(retry_batch).await {
            Ok(reports) => {
                let submitted: usize = reports.iter().map(|r| r.submitted).sum();
                if submitted > 0 {
                    info!(documents = reports.len(), submitted, "Retried pending links");
                }
                metrics::JOB_RUNS.with_label_values(&["retry", "success"]).inc();
            }
            Err(e) => {
                metrics::JOB_RUNS.with_label_values(&["retry", "failure"]).inc();
                warn!(error = %e, "Pending submission retry failed");
                forward(notifier, "Pending submission retry failed", &e.to_string()).await;
            }
        }

        Ok(report)
    }

    async fn library_pass(
        library: &LibraryReconciler,
        notifier: &Option<Arc<dyn Notifier>>,
        status: &RwLock<JobRunnerStatus>,
    ) -> Result<LibrarySyncReport, LibrarySyncError> {
        let result = library.run().await;
        status.write().await.last_library_sync_at = Some(Utc::now());

        match &result {
            Ok(_) => {
                metrics::JOB_RUNS
                    .with_label_values(&["library_sync", "success"])
                    .inc();
            }
            Err(e) => {
                metrics::JOB_RUNS
                    .with_label_values(&["library_sync", "failure"])
                    .inc();
                error!(error = %e, "Library sync failed");
                forward(notifier, "Library sync failed", &e.to_string()).await;
            }
        }
        result
    }
}

async fn forward(notifier: &Option<Arc<dyn Notifier>>, title: &str, body: &str) {
    if let Some(notifier) = notifier {
        if let Err(e) = notifier.notify(title, body).await {
            warn!(error = %e, "Failed to send notification");
        }
    }
}
