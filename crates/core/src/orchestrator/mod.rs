//! Download orchestration.
//!
//! - **Submission**: hands accepted links to the torrent daemon, one at a
//!   time in document order.
//! - **Sweep**: keeps link status in step with the daemon and triggers the
//!   transfer of completed catalog downloads.
//! - **Runner**: runs the sweep and the library sync on a schedule.

mod config;
mod runner;
mod submission;
mod sweep;
mod types;

pub use config::{DownloadsConfig, JobsConfig, PathMapping};
pub use runner::JobRunner;
pub use submission::SubmissionOrchestrator;
pub use sweep::{find_videos, map_torrent_status, TorrentSweeper};
pub use types::{JobRunnerStatus, OrchestratorError, SubmissionReport, SweepReport};
