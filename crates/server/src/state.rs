use std::sync::Arc;

use magpie_core::{
    Config, JobRunner, LibrarySnapshot, LinkGate, RecordStore, SanitizedConfig,
    SubmissionOrchestrator, TransferEngine,
};
use sha2::{Digest, Sha256};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    store: Arc<dyn RecordStore>,
    gate: Arc<LinkGate>,
    submission: Arc<SubmissionOrchestrator>,
    runner: Arc<JobRunner>,
    snapshot: Arc<LibrarySnapshot>,
    engine: Option<Arc<TransferEngine>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Arc<dyn RecordStore>,
        gate: Arc<LinkGate>,
        submission: Arc<SubmissionOrchestrator>,
        runner: Arc<JobRunner>,
        snapshot: Arc<LibrarySnapshot>,
        engine: Option<Arc<TransferEngine>>,
    ) -> Self {
        let config_hash = config_fingerprint(&config);
        Self {
            config,
            config_hash,
            store,
            gate,
            submission,
            runner,
            snapshot,
            engine,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Short SHA-256 of the loaded configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    pub fn gate(&self) -> &LinkGate {
        self.gate.as_ref()
    }

    pub fn submission(&self) -> &SubmissionOrchestrator {
        self.submission.as_ref()
    }

    pub fn runner(&self) -> &JobRunner {
        self.runner.as_ref()
    }

    pub fn snapshot(&self) -> &LibrarySnapshot {
        self.snapshot.as_ref()
    }

    pub fn engine(&self) -> Option<&TransferEngine> {
        self.engine.as_deref()
    }
}

fn config_fingerprint(config: &Config) -> String {
    let json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
    digest[..16].to_string()
}
