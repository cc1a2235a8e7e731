//! Catalog-to-library reconciliation.
//!
//! [`match_library`] is a pure two-pass matcher: first by catalog code, then by
//! title containment over whatever is left. [`LibraryReconciler`] refreshes the
//! snapshot, runs the matcher and writes the outcome back to the catalog.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog_code::{squash, CodePattern};
use crate::media_server::{LibraryItem, LibrarySnapshot, MediaServer, MediaServerError};
use crate::metrics;
use crate::store::{CatalogEntry, CatalogEntryPatch, CatalogStatus, RecordStore, StoreError};

#[derive(Debug, Error)]
pub enum LibrarySyncError {
    #[error("media server error: {0}")]
    MediaServer(#[from] MediaServerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Which pass produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPass {
    Code,
    Title,
}

impl MatchPass {
    fn as_str(&self) -> &'static str {
        match self {
            MatchPass::Code => "code",
            MatchPass::Title => "title",
        }
    }
}

/// A catalog entry found in the library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryMatch {
    pub item_id: String,
    pub pass: MatchPass,
}

/// Match catalog entries against library items.
///
/// Returns catalog entry id → match. Every entry and every item is used at
/// most once.
pub fn match_library(
    entries: &[CatalogEntry],
    items: &[LibraryItem],
) -> HashMap<String, LibraryMatch> {
    let mut matches = HashMap::new();
    let mut used_items = HashSet::new();

    if let Some(pattern) = CodePattern::new(entries.iter().map(|e| e.code.as_str())) {
        // squashed code -> entry indices
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_code.entry(squash(&entry.code)).or_default().push(idx);
        }

        'items: for (item_idx, item) in items.iter().enumerate() {
            for name in item.names() {
                for found in pattern.find_iter(name) {
                    let Some(candidates) = by_code.get(&squash(found)) else {
                        continue;
                    };
                    let free = candidates
                        .iter()
                        .find(|&&idx| !matches.contains_key(&entries[idx].id));
                    if let Some(&idx) = free {
                        matches.insert(
                            entries[idx].id.clone(),
                            LibraryMatch {
                                item_id: item.id.clone(),
                                pass: MatchPass::Code,
                            },
                        );
                        used_items.insert(item_idx);
                        continue 'items;
                    }
                }
            }
        }
    }

    let lowered: Vec<String> = items.iter().map(|i| i.name.to_lowercase()).collect();
    for entry in entries {
        if matches.contains_key(&entry.id) {
            continue;
        }
        let title = entry.title.trim().to_lowercase();
        if title.is_empty() {
            continue;
        }

        let hit = lowered.iter().enumerate().find(|(idx, name)| {
            !used_items.contains(idx)
                && !name.is_empty()
                && (name.contains(&title) || title.contains(name.as_str()))
        });
        if let Some((idx, _)) = hit {
            used_items.insert(idx);
            matches.insert(
                entry.id.clone(),
                LibraryMatch {
                    item_id: items[idx].id.clone(),
                    pass: MatchPass::Title,
                },
            );
        }
    }

    matches
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibrarySyncReport {
    pub items: usize,
    pub code_matches: usize,
    pub title_matches: usize,
    /// Entries newly marked `added`.
    pub added: usize,
    /// Entries that lost `added` because the library no longer has them.
    pub reset: usize,
}

/// Periodically marks catalog entries that are already in the library.
pub struct LibraryReconciler {
    store: Arc<dyn RecordStore>,
    server: Arc<dyn MediaServer>,
    snapshot: Arc<LibrarySnapshot>,
}

impl LibraryReconciler {
    pub fn new(
        store: Arc<dyn RecordStore>,
        server: Arc<dyn MediaServer>,
        snapshot: Arc<LibrarySnapshot>,
    ) -> Self {
        Self {
            store,
            server,
            snapshot,
        }
    }

    /// Refresh the snapshot and rewrite catalog `added` state from it.
    pub async fn run(&self) -> Result<LibrarySyncReport, LibrarySyncError> {
        let item_count = self.snapshot.refresh(self.server.as_ref()).await?;
        let view = self.snapshot.read().await;

        let entries = self.store.list_catalog_entries()?;
        let matches = match_library(&entries, &view.items);

        let mut report = LibrarySyncReport {
            items: item_count,
            ..Default::default()
        };

        for entry in &entries {
            match matches.get(&entry.id) {
                Some(found) => {
                    metrics::LIBRARY_MATCHES
                        .with_label_values(&[found.pass.as_str()])
                        .inc();
                    match found.pass {
                        MatchPass::Code => report.code_matches += 1,
                        MatchPass::Title => report.title_matches += 1,
                    }

                    let unchanged = entry.status == CatalogStatus::Added
                        && entry.library_ref.as_deref() == Some(found.item_id.as_str());
                    if unchanged {
                        continue;
                    }

                    debug!(code = %entry.code, item_id = %found.item_id, "Catalog entry found in library");
                    self.store.update_catalog_entry(
                        &entry.id,
                        CatalogEntryPatch {
                            status: Some(CatalogStatus::Added),
                            library_ref: Some(Some(found.item_id.clone())),
                            added_at: entry.added_at.is_none().then(Utc::now),
                        },
                    )?;
                    report.added += 1;
                }
                None if entry.status == CatalogStatus::Added => {
                    debug!(code = %entry.code, "Catalog entry no longer in library");
                    self.store.update_catalog_entry(
                        &entry.id,
                        CatalogEntryPatch {
                            status: Some(CatalogStatus::Uncheck),
                            library_ref: Some(None),
                            added_at: None,
                        },
                    )?;
                    report.reset += 1;
                }
                None => {}
            }
        }

        info!(
            items = report.items,
            code_matches = report.code_matches,
            title_matches = report.title_matches,
            added = report.added,
            reset = report.reset,
            "Library reconciliation finished"
        );
        Ok(report)
    }
}
