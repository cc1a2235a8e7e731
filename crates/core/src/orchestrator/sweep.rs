//! Torrent state sweep.
//!
//! Diffs the daemon's torrent list against tracked links, writes the new
//! statuses and hands freshly completed catalog downloads to the transfer
//! engine. Every link is handled on its own: a failure is logged and the
//! sweep moves on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::metrics;
use crate::store::{
    CatalogEntryPatch, CatalogStatus, DownloadStatus, DownloadUrl, DownloadUrlUpdate,
    RecordStore, StoreError,
};
use crate::torrent_client::{TorrentClient, TorrentInfo, TorrentState};
use crate::transfer::TransferEngine;

use super::config::DownloadsConfig;
use super::submission::advance_catalog_entries;
use super::types::{OrchestratorError, SweepReport};

/// Map a daemon torrent to the local link status. `None` keeps the current one.
pub fn map_torrent_status(torrent: &TorrentInfo) -> Option<DownloadStatus> {
    if torrent.is_complete() {
        return Some(DownloadStatus::Downloaded);
    }
    match torrent.state {
        TorrentState::Downloading
        | TorrentState::Stalled
        | TorrentState::Queued
        | TorrentState::Seeding => Some(DownloadStatus::Downloading),
        TorrentState::Paused => Some(DownloadStatus::Paused),
        TorrentState::Checking => Some(DownloadStatus::Checking),
        TorrentState::Error => Some(DownloadStatus::Error),
        TorrentState::Unknown => None,
    }
}

pub struct TorrentSweeper {
    store: Arc<dyn RecordStore>,
    torrent_client: Option<Arc<dyn TorrentClient>>,
    transfer: Option<Arc<TransferEngine>>,
    downloads: DownloadsConfig,
    item_delay: Duration,
}

impl TorrentSweeper {
    pub fn new(
        store: Arc<dyn RecordStore>,
        torrent_client: Option<Arc<dyn TorrentClient>>,
        downloads: DownloadsConfig,
    ) -> Self {
        Self {
            store,
            torrent_client,
            transfer: None,
            downloads,
            item_delay: Duration::ZERO,
        }
    }

    /// Completed catalog downloads are only transferred when an engine is set.
    pub fn with_transfer_engine(mut self, engine: Arc<TransferEngine>) -> Self {
        self.transfer = Some(engine);
        self
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    pub async fn sweep(&self) -> Result<SweepReport, OrchestratorError> {
        let client = self
            .torrent_client
            .as_ref()
            .ok_or(OrchestratorError::NoActiveDaemon)?;

        let links = self
            .store
            .list_download_urls_by_status(&DownloadStatus::TRACKED)?;
        let mut report = SweepReport {
            tracked: links.len(),
            ..Default::default()
        };
        if links.is_empty() {
            return Ok(report);
        }

        let torrents: HashMap<String, TorrentInfo> = client
            .list_torrents()
            .await?
            .into_iter()
            .map(|t| (t.hash.to_lowercase(), t))
            .collect();
        debug!(tracked = links.len(), torrents = torrents.len(), "Sweeping torrents");

        for (idx, link) in links.iter().enumerate() {
            if idx > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            self.sweep_link(link, torrents.get(&link.hash.to_lowercase()), &mut report)
                .await;
        }

        info!(
            tracked = report.tracked,
            transitions = report.transitions,
            regressed = report.regressed,
            completed = report.completed,
            transfers_failed = report.transfers_failed,
            "Torrent sweep finished"
        );
        Ok(report)
    }

    async fn sweep_link(
        &self,
        link: &DownloadUrl,
        torrent: Option<&TorrentInfo>,
        report: &mut SweepReport,
    ) {
        let next = match torrent {
            None => DownloadStatus::Undownload,
            Some(t) => match map_torrent_status(t) {
                Some(status) => status,
                None => return,
            },
        };
        if next == link.status {
            return;
        }

        match self
            .store
            .update_download_url_status(&link.id, link.version, DownloadUrlUpdate::status(next))
        {
            Ok(_) => {}
            Err(StoreError::Conflict { .. }) => {
                warn!(link_id = %link.id, "Link changed concurrently, leaving it for the next sweep");
                report.conflicts += 1;
                return;
            }
            Err(e) => {
                warn!(link_id = %link.id, error = %e, "Failed to update link status");
                return;
            }
        }

        debug!(
            link_id = %link.id,
            hash = %link.hash,
            from = link.status.as_str(),
            to = next.as_str(),
            "Link status changed"
        );
        metrics::SWEEP_TRANSITIONS
            .with_label_values(&[next.as_str()])
            .inc();
        report.transitions += 1;

        if !link.is_catalog_linked() {
            return;
        }

        match next {
            DownloadStatus::Undownload => {
                info!(link_id = %link.id, hash = %link.hash, "Torrent gone from daemon, link reset");
                report.regressed += 1;
                self.regress_catalog_entries(&link.linked_catalog_entry_ids);
            }
            DownloadStatus::Downloading => {
                advance_catalog_entries(
                    self.store.as_ref(),
                    &link.linked_catalog_entry_ids,
                    CatalogStatus::Downloading,
                );
            }
            DownloadStatus::Downloaded => {
                report.completed += 1;
                advance_catalog_entries(
                    self.store.as_ref(),
                    &link.linked_catalog_entry_ids,
                    CatalogStatus::Downloaded,
                );
                if let Some(torrent) = torrent {
                    self.transfer_completed(link, torrent, report).await;
                }
            }
            _ => {}
        }
    }

    /// Entries already filed into the library keep their status.
    fn regress_catalog_entries(&self, entry_ids: &[String]) {
        for id in entry_ids {
            match self.store.get_catalog_entry(id) {
                Ok(Some(entry)) => {
                    if matches!(
                        entry.status,
                        CatalogStatus::Transfered | CatalogStatus::Added | CatalogStatus::Undownload
                    ) {
                        continue;
                    }
                    if let Err(e) = self
                        .store
                        .update_catalog_entry(id, CatalogEntryPatch::status(CatalogStatus::Undownload))
                    {
                        warn!(catalog_entry = %id, error = %e, "Failed to regress catalog entry");
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(catalog_entry = %id, error = %e, "Catalog lookup failed"),
            }
        }
    }

    async fn transfer_completed(
        &self,
        link: &DownloadUrl,
        torrent: &TorrentInfo,
        report: &mut SweepReport,
    ) {
        let Some(engine) = &self.transfer else {
            debug!(link_id = %link.id, "No transfer engine configured, skipping transfer");
            return;
        };
        let Some(daemon_path) = torrent.local_content_path() else {
            warn!(link_id = %link.id, hash = %link.hash, "Daemon reported no content path");
            report.transfers_failed += 1;
            return;
        };
        let Some(code) = self.link_code(link) else {
            warn!(link_id = %link.id, "No catalog code for completed link");
            report.transfers_failed += 1;
            return;
        };

        let root = self.downloads.local_path(daemon_path);
        let videos = match find_videos(&root, &self.downloads).await {
            Ok(videos) => videos,
            Err(e) => {
                warn!(link_id = %link.id, path = %root.display(), error = %e, "Failed to list downloaded files");
                report.transfers_failed += 1;
                return;
            }
        };
        if videos.is_empty() {
            warn!(link_id = %link.id, path = %root.display(), "No video files in completed download");
            return;
        }

        for video in &videos {
            match engine.transfer(video, &code).await {
                Ok(outcome) => {
                    debug!(link_id = %link.id, destination = %outcome.destination.display(), "Transferred");
                    report.transfers_succeeded += 1;
                }
                Err(e) => {
                    warn!(link_id = %link.id, file = %video.display(), error = %e, "Transfer failed");
                    report.transfers_failed += 1;
                }
            }
        }
    }

    /// Code of the first linked catalog entry, else the document's code.
    fn link_code(&self, link: &DownloadUrl) -> Option<String> {
        for id in &link.linked_catalog_entry_ids {
            if let Ok(Some(entry)) = self.store.get_catalog_entry(id) {
                return Some(entry.code);
            }
        }
        self.store
            .get_document(&link.document_id)
            .ok()
            .flatten()
            .and_then(|doc| doc.catalog_code)
    }
}

/// Video files under `root` (or `root` itself), sorted by path.
pub async fn find_videos(root: &Path, downloads: &DownloadsConfig) -> std::io::Result<Vec<PathBuf>> {
    let mut videos = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(path) = pending.pop() {
        let meta = tokio::fs::metadata(&path).await?;
        if meta.is_dir() {
            let mut entries = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push(entry.path());
            }
        } else if meta.is_file()
            && downloads.is_video(&path)
            && !downloads.is_excluded(&path)
            && meta.len() >= downloads.min_video_size_bytes
        {
            videos.push(path);
        }
    }

    videos.sort();
    Ok(videos)
}
