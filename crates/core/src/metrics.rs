//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Link gate (batches accepted or rejected)
//! - Submission and torrent sweep
//! - Transfers
//! - Library reconciliation and background jobs

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Gate
// =============================================================================

/// Gate batches by result.
pub static GATE_BATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("magpie_gate_batches_total", "Total link batches seen by the gate"),
        &["result"], // "accepted", "empty", "invalid", "duplicate", "no_preview", "error"
    )
    .unwrap()
});

/// Links persisted by the gate.
pub static LINKS_ACCEPTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("magpie_links_accepted_total", "Total links persisted").unwrap()
});

// =============================================================================
// Submission & sweep
// =============================================================================

/// Link submissions by result.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("magpie_submissions_total", "Total link submissions to the daemon"),
        &["result"], // "submitted", "skipped", "failed", "conflict"
    )
    .unwrap()
});

/// Status transitions written by the torrent sweep.
pub static SWEEP_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "magpie_sweep_transitions_total",
            "Link status transitions applied by the torrent sweep",
        ),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Transfers
// =============================================================================

/// Transfers by result.
pub static TRANSFERS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("magpie_transfers_total", "Total file transfers"),
        &["result"], // "success", "failure"
    )
    .unwrap()
});

/// Transfer duration in seconds.
pub static TRANSFER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("magpie_transfer_duration_seconds", "Duration of file transfers")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["result"],
    )
    .unwrap()
});

/// Rollbacks executed after a failed transfer.
pub static TRANSFER_ROLLBACKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("magpie_transfer_rollbacks_total", "Total transfer rollbacks").unwrap()
});

// =============================================================================
// Library & jobs
// =============================================================================

/// Catalog entries matched against the library, by pass.
pub static LIBRARY_MATCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "magpie_library_matches_total",
            "Catalog entries matched to library items",
        ),
        &["pass"], // "code", "title"
    )
    .unwrap()
});

/// Background job runs by job and result.
pub static JOB_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("magpie_job_runs_total", "Background job runs"),
        &["job", "result"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(GATE_BATCHES.clone()),
        Box::new(LINKS_ACCEPTED.clone()),
        Box::new(SUBMISSIONS.clone()),
        Box::new(SWEEP_TRANSITIONS.clone()),
        Box::new(TRANSFERS.clone()),
        Box::new(TRANSFER_DURATION.clone()),
        Box::new(TRANSFER_ROLLBACKS.clone()),
        Box::new(LIBRARY_MATCHES.clone()),
        Box::new(JOB_RUNS.clone()),
    ]
}
