//! Orchestrator configuration: `[downloads]` and `[jobs]`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Rewrites a daemon-side path prefix to where the same files are visible
/// locally (the daemon often runs in another container).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadsConfig {
    /// Save path handed to the daemon.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,

    /// Daemon category for submitted torrents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default)]
    pub path_mappings: Vec<PathMapping>,

    /// Lowercase extensions counted as video, without the dot.
    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,

    /// Files whose name contains any of these (case-insensitive) are skipped.
    #[serde(default = "default_exclude_keywords")]
    pub exclude_keywords: Vec<String>,

    /// Smaller files are skipped.
    #[serde(default = "default_min_video_size")]
    pub min_video_size_bytes: u64,
}

fn default_base_dir() -> String {
    "/downloads".to_string()
}

fn default_video_extensions() -> Vec<String> {
    ["mp4", "mkv", "avi", "wmv", "mov", "ts", "m4v", "flv", "rmvb", "iso"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_keywords() -> Vec<String> {
    ["sample", "trailer", "preview"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_video_size() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            category: None,
            path_mappings: Vec::new(),
            video_extensions: default_video_extensions(),
            exclude_keywords: default_exclude_keywords(),
            min_video_size_bytes: default_min_video_size(),
        }
    }
}

impl DownloadsConfig {
    /// Translate a daemon-reported path using the longest matching mapping.
    pub fn local_path(&self, daemon_path: &str) -> PathBuf {
        let best = self
            .path_mappings
            .iter()
            .filter(|m| !m.from.is_empty() && Path::new(daemon_path).starts_with(&m.from))
            .max_by_key(|m| m.from.len());

        match best {
            Some(mapping) => {
                let rest = Path::new(daemon_path)
                    .strip_prefix(&mapping.from)
                    .unwrap_or_else(|_| Path::new(""));
                PathBuf::from(&mapping.to).join(rest)
            }
            None => PathBuf::from(daemon_path),
        }
    }

    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.video_extensions.iter().any(|v| v.eq_ignore_ascii_case(&ext)))
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        self.exclude_keywords
            .iter()
            .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Run the periodic jobs. When off, jobs only run through the API.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_library_sync_interval")]
    pub library_sync_interval_secs: u64,

    /// Pause between items inside one job run, to go easy on upstreams.
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,

    /// Documents with never-submitted links retried per sweep.
    #[serde(default = "default_retry_batch")]
    pub retry_batch_size: i64,
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_library_sync_interval() -> u64 {
    3600
}

fn default_item_delay() -> u64 {
    500
}

fn default_retry_batch() -> i64 {
    20
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sweep_interval_secs: default_sweep_interval(),
            library_sync_interval_secs: default_library_sync_interval(),
            item_delay_ms: default_item_delay(),
            retry_batch_size: default_retry_batch(),
        }
    }
}
