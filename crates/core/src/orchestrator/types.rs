//! Types for the submission orchestrator and the torrent sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Errors that stop a whole orchestrator run. Per-link failures are logged
/// and counted in the reports instead.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No torrent daemon is configured.
    #[error("no active torrent daemon")]
    NoActiveDaemon,

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),

    /// The daemon could not be queried at all.
    #[error("torrent client error: {0}")]
    TorrentClient(#[from] crate::torrent_client::TorrentClientError),
}

/// Outcome of submitting one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    pub document_id: String,
    pub submitted: usize,
    /// Already in the library.
    pub skipped: usize,
    pub failed: usize,
    /// Lost a race with another writer; retried on the next pass.
    pub conflicts: usize,
}

/// Outcome of one torrent sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub tracked: usize,
    pub transitions: usize,
    /// Links whose torrent the daemon no longer reports.
    pub regressed: usize,
    pub completed: usize,
    pub conflicts: usize,
    pub transfers_succeeded: usize,
    pub transfers_failed: usize,
}

/// Job runner state as shown by the API.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobRunnerStatus {
    pub running: bool,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub last_library_sync_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            OrchestratorError::NoActiveDaemon.to_string(),
            "no active torrent daemon"
        );
        assert_eq!(
            OrchestratorError::DocumentNotFound("doc-1".to_string()).to_string(),
            "document not found: doc-1"
        );
    }

    #[test]
    fn test_reports_serialize() {
        let report = SweepReport {
            tracked: 3,
            completed: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tracked"], 3);
        assert_eq!(json["completed"], 1);
    }
}
