//! Link preview and dedup gate.
//!
//! Turns a batch of raw candidate links into one persisted [`Document`]. A
//! batch is accepted whole or not at all: if any link already exists in the
//! store, or none of the links can be previewed, nothing is written.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::magnet::{canonical_magnet, extract_info_hash};
use crate::metrics;
use crate::preview::PreviewProvider;
use crate::store::{
    Document, LinkKind, NewDocument, NewDownloadUrl, PreviewDetail, RecordStore, StoreError,
};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no links supplied")]
    EmptyInput,

    #[error("none of the supplied links is a magnet link")]
    InvalidLink,

    #[error("links already exist: {}", .0.join(", "))]
    DuplicateLink(Vec<String>),

    #[error("none of the supplied links could be previewed")]
    NoPreviewAvailable,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    fn metric_label(&self) -> &'static str {
        match self {
            GateError::EmptyInput => "empty",
            GateError::InvalidLink => "invalid",
            GateError::DuplicateLink(_) => "duplicate",
            GateError::NoPreviewAvailable => "no_preview",
            GateError::Store(_) => "error",
        }
    }
}

/// Catalog item a batch is submitted for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRef {
    pub code: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A batch of candidate links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub catalog_entry: Option<CatalogRef>,
}

/// Validates, deduplicates and previews candidate links.
pub struct LinkGate {
    store: Arc<dyn RecordStore>,
    previews: Arc<dyn PreviewProvider>,
}

impl LinkGate {
    pub fn new(store: Arc<dyn RecordStore>, previews: Arc<dyn PreviewProvider>) -> Self {
        Self { store, previews }
    }

    /// Accept a batch and persist it as one document.
    pub async fn accept(&self, request: GateRequest) -> Result<Document, GateError> {
        let result = self.accept_inner(request).await;
        match &result {
            Ok(document) => {
                metrics::GATE_BATCHES.with_label_values(&["accepted"]).inc();
                metrics::LINKS_ACCEPTED.inc_by(document.download_urls.len() as u64);
            }
            Err(e) => {
                metrics::GATE_BATCHES
                    .with_label_values(&[e.metric_label()])
                    .inc();
            }
        }
        result
    }

    async fn accept_inner(&self, request: GateRequest) -> Result<Document, GateError> {
        let raw: Vec<&str> = request
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .collect();
        if raw.is_empty() {
            return Err(GateError::EmptyInput);
        }

        // (canonical url, hash) in input order; duplicates inside the batch are kept
        let mut links = Vec::with_capacity(raw.len());
        for input in raw {
            match extract_info_hash(input) {
                Some(hash) => links.push((canonical_magnet(&hash), hash)),
                None => warn!(input = %input, "Dropping non-magnet link"),
            }
        }
        if links.is_empty() {
            return Err(GateError::InvalidLink);
        }

        let mut canonical: Vec<String> = links.iter().map(|(url, _)| url.clone()).collect();
        canonical.sort();
        canonical.dedup();

        let existing = self.store.find_by_canonical_urls(&canonical)?;
        if !existing.is_empty() {
            let mut urls: Vec<String> = existing.into_iter().map(|u| u.url).collect();
            urls.sort();
            urls.dedup();
            return Err(GateError::DuplicateLink(urls));
        }

        let mut previews: HashMap<String, Option<PreviewDetail>> = HashMap::new();
        for (url, hash) in &links {
            if previews.contains_key(hash) {
                continue;
            }
            let preview = match self.previews.get_preview(url).await {
                Ok(detail) => Some(detail),
                Err(e) => {
                    warn!(hash = %hash, error = %e, "Preview unavailable");
                    None
                }
            };
            previews.insert(hash.clone(), preview);
        }

        let resolved: Vec<&PreviewDetail> = links
            .iter()
            .filter_map(|(_, hash)| previews.get(hash).and_then(|p| p.as_ref()))
            .collect();
        if resolved.is_empty() {
            return Err(GateError::NoPreviewAvailable);
        }

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_title(&resolved, links.len()));
        let image_refs = derive_image_refs(&resolved);

        let (kind, linked_ids, catalog_code) = match &request.catalog_entry {
            Some(entry) => {
                let code = entry.code.trim().to_string();
                let linked = self
                    .store
                    .find_catalog_entry_by_code(&code)?
                    .map(|e| vec![e.id])
                    .unwrap_or_default();
                if linked.is_empty() {
                    debug!(code = %code, "No catalog row for code yet");
                }
                (LinkKind::CatalogItem, linked, Some(code))
            }
            None => (LinkKind::Generic, Vec::new(), None),
        };

        let new_links = links
            .into_iter()
            .map(|(url, hash)| NewDownloadUrl {
                preview_detail: previews.get(&hash).cloned().flatten(),
                url,
                hash,
                linked_catalog_entry_ids: linked_ids.clone(),
                kind: Some(kind),
            })
            .collect();

        let document = self.store.create_document(NewDocument {
            title,
            description: request.description,
            image_refs,
            catalog_code,
            links: new_links,
        })?;

        info!(
            document_id = %document.id,
            links = document.download_urls.len(),
            "Accepted link batch"
        );
        Ok(document)
    }
}

/// One link: the preview name. Several: `"{first} ({link_count})"`.
fn derive_title(previews: &[&PreviewDetail], link_count: usize) -> String {
    match previews.first() {
        None => String::new(),
        Some(first) if link_count <= 1 => first.name.clone(),
        Some(first) => format!("{} ({})", first.name, link_count),
    }
}

fn derive_image_refs(previews: &[&PreviewDetail]) -> Vec<String> {
    previews
        .iter()
        .flat_map(|p| p.screenshots.iter().map(|s| s.image_url.clone()))
        .collect()
}
