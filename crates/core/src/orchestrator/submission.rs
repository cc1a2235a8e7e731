//! Submission of accepted documents to the torrent daemon.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::media_server::LibrarySnapshot;
use crate::metrics;
use crate::store::{
    CatalogEntryPatch, CatalogStatus, Document, DownloadStatus, DownloadUrl, DownloadUrlUpdate,
    RecordStore, StoreError,
};
use crate::torrent_client::{AddTorrentRequest, TorrentClient};

use super::config::DownloadsConfig;
use super::types::{OrchestratorError, SubmissionReport};

/// Hands `undownload` links of a document to the torrent daemon.
///
/// Links are processed in document order. A failing link is logged, stays
/// `undownload` for the next run and never stops its siblings.
pub struct SubmissionOrchestrator {
    store: Arc<dyn RecordStore>,
    torrent_client: Option<Arc<dyn TorrentClient>>,
    classifier: Option<Arc<dyn Classifier>>,
    snapshot: Arc<LibrarySnapshot>,
    downloads: DownloadsConfig,
    item_delay: Duration,
}

impl SubmissionOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        torrent_client: Option<Arc<dyn TorrentClient>>,
        snapshot: Arc<LibrarySnapshot>,
        downloads: DownloadsConfig,
    ) -> Self {
        Self {
            store,
            torrent_client,
            classifier: None,
            snapshot,
            downloads,
            item_delay: Duration::ZERO,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    /// Submit the pending links of one stored document.
    pub async fn submit_document(
        &self,
        document_id: &str,
    ) -> Result<SubmissionReport, OrchestratorError> {
        let document = self
            .store
            .get_document(document_id)?
            .ok_or_else(|| OrchestratorError::DocumentNotFound(document_id.to_string()))?;
        self.submit(&document).await
    }

    /// Retry links that never reached the daemon.
    ///
    /// A link the sweep reset because its torrent disappeared is left alone;
    /// only an explicit [`submit`](Self::submit) sends it again.
    pub async fn submit_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<SubmissionReport>, OrchestratorError> {
        if self.torrent_client.is_none() {
            return Err(OrchestratorError::NoActiveDaemon);
        }

        let documents = self.store.list_documents_with_unsubmitted_links(limit)?;
        let mut reports = Vec::with_capacity(documents.len());
        for document in &documents {
            reports.push(
                self.submit_links(document, |link| link.submitted_at.is_none())
                    .await?,
            );
        }
        Ok(reports)
    }

    /// Submit every `undownload` link of `document`, in order.
    pub async fn submit(&self, document: &Document) -> Result<SubmissionReport, OrchestratorError> {
        self.submit_links(document, |_| true).await
    }

    async fn submit_links(
        &self,
        document: &Document,
        include: impl Fn(&DownloadUrl) -> bool,
    ) -> Result<SubmissionReport, OrchestratorError> {
        let client = self
            .torrent_client
            .as_ref()
            .ok_or(OrchestratorError::NoActiveDaemon)?;

        let mut report = SubmissionReport {
            document_id: document.id.clone(),
            ..Default::default()
        };

        let pending: Vec<&DownloadUrl> = document
            .download_urls
            .iter()
            .filter(|link| link.status == DownloadStatus::Undownload && include(link))
            .collect();
        if pending.is_empty() {
            return Ok(report);
        }

        // generic documents share one classification for all their links
        let mut generic_dir: Option<String> = None;

        for (idx, link) in pending.iter().enumerate() {
            if idx > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }

            let save_path = if link.is_catalog_linked() {
                if let Some(code) = document.catalog_code.as_deref() {
                    if let Some(item) = self.snapshot.read().await.find_by_code(code) {
                        info!(
                            link_id = %link.id,
                            code = %code,
                            library_item = %item.id,
                            "Already in library, skipping link"
                        );
                        metrics::SUBMISSIONS.with_label_values(&["skipped"]).inc();
                        report.skipped += 1;
                        continue;
                    }
                }
                self.downloads.base_dir.clone()
            } else {
                match &generic_dir {
                    Some(dir) => dir.clone(),
                    None => {
                        let dir = self.generic_target_dir(&document.title).await;
                        generic_dir = Some(dir.clone());
                        dir
                    }
                }
            };

            let mut request = AddTorrentRequest::magnet(&link.url).with_save_path(&save_path);
            if let Some(category) = &self.downloads.category {
                request = request.with_category(category);
            }

            if let Err(e) = client.add_torrent(request).await {
                warn!(link_id = %link.id, hash = %link.hash, error = %e, "Submission failed");
                metrics::SUBMISSIONS.with_label_values(&["failed"]).inc();
                report.failed += 1;
                continue;
            }

            match self.store.update_download_url_status(
                &link.id,
                link.version,
                DownloadUrlUpdate::submitted(Utc::now()),
            ) {
                Ok(_) => {}
                Err(StoreError::Conflict { .. }) => {
                    warn!(link_id = %link.id, "Link changed concurrently, leaving it for the next pass");
                    metrics::SUBMISSIONS.with_label_values(&["conflict"]).inc();
                    report.conflicts += 1;
                    continue;
                }
                Err(e) => {
                    warn!(link_id = %link.id, error = %e, "Failed to record submission");
                    metrics::SUBMISSIONS.with_label_values(&["failed"]).inc();
                    report.failed += 1;
                    continue;
                }
            }

            debug!(link_id = %link.id, save_path = %save_path, "Link submitted");
            metrics::SUBMISSIONS.with_label_values(&["submitted"]).inc();
            report.submitted += 1;

            if link.is_catalog_linked() {
                advance_catalog_entries(
                    self.store.as_ref(),
                    &link.linked_catalog_entry_ids,
                    CatalogStatus::Downloading,
                );
            }
        }

        info!(
            document_id = %document.id,
            submitted = report.submitted,
            skipped = report.skipped,
            failed = report.failed,
            conflicts = report.conflicts,
            "Document submission finished"
        );
        Ok(report)
    }

    /// `base_dir/category[/person]` from the classifier, or `base_dir` when
    /// there is no classifier, no title, or the classifier fails.
    async fn generic_target_dir(&self, title: &str) -> String {
        let base = self.downloads.base_dir.trim_end_matches('/').to_string();
        let Some(classifier) = &self.classifier else {
            return base;
        };
        if title.trim().is_empty() {
            return base;
        }

        match classifier.classify(&[title.to_string()]).await {
            Ok(results) => match results.into_iter().next() {
                Some(c) if !c.is_empty() => {
                    let mut dir = format!("{}/{}", base, c.source_category.trim());
                    if let Some(person) = c.person_name.as_deref().map(str::trim) {
                        if !person.is_empty() {
                            dir.push('/');
                            dir.push_str(person);
                        }
                    }
                    dir
                }
                _ => base,
            },
            Err(e) => {
                warn!(title = %title, error = %e, "Classifier failed, using base directory");
                base
            }
        }
    }
}

/// Move linked catalog entries forward to `status`; never backwards.
pub(crate) fn advance_catalog_entries(
    store: &dyn RecordStore,
    entry_ids: &[String],
    status: CatalogStatus,
) {
    for id in entry_ids {
        let entry = match store.get_catalog_entry(id) {
            Ok(Some(entry)) => entry,
            Ok(None) => continue,
            Err(e) => {
                warn!(catalog_entry = %id, error = %e, "Catalog lookup failed");
                continue;
            }
        };
        if !entry.status.can_advance_to(status) {
            continue;
        }
        if let Err(e) = store.update_catalog_entry(id, CatalogEntryPatch::status(status)) {
            warn!(catalog_entry = %id, error = %e, "Failed to advance catalog entry");
        }
    }
}
