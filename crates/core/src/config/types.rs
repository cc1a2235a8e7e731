use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::classifier::ClassifierConfig;
use crate::llm::{LlmConfig, LlmProvider};
use crate::media_server::MediaServerConfig;
use crate::metadata::MetadataConfig;
use crate::notify::NotifyConfig;
use crate::orchestrator::{DownloadsConfig, JobsConfig};
use crate::preview::PreviewConfig;
use crate::transfer::{Corner, LibraryConfig, TransferMethod};
use crate::translator::TranslatorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub torrent_client: Option<TorrentClientConfig>,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub media_server: Option<MediaServerConfig>,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("magpie.db")
}

/// Torrent daemon configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TorrentClientConfig {
    pub backend: TorrentClientBackend,
    /// Required when backend = "qbittorrent"
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TorrentClientBackend {
    #[serde(rename = "qbittorrent")]
    QBittorrent,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Save path used when a request has none
    #[serde(default)]
    pub download_path: Option<String>,
}

fn default_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub downloads: DownloadsConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torrent_client: Option<SanitizedTorrentClientConfig>,
    pub preview: PreviewConfig,
    pub metadata: SanitizedMetadataConfig,
    pub library: SanitizedLibraryConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_server: Option<SanitizedMediaServerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<SanitizedLlmConfig>,
    pub classifier_enabled: bool,
    pub translator: TranslatorConfig,
    pub jobs: JobsConfig,
    pub notify_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTorrentClientConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub credentials_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMetadataConfig {
    pub url: String,
    pub token_configured: bool,
}

/// Library settings without the filesystem-irrelevant image knobs.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLibraryConfig {
    pub root: PathBuf,
    pub transfer_method: TransferMethod,
    pub directory_rule: String,
    pub filename_rule: String,
    pub nfo_title_rule: String,
    pub watermark_enabled: bool,
    pub watermark_start_corner: Corner,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMediaServerConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub item_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            downloads: config.downloads.clone(),
            torrent_client: config.torrent_client.as_ref().map(|tc| {
                let qb = tc.qbittorrent.as_ref();
                SanitizedTorrentClientConfig {
                    backend: match tc.backend {
                        TorrentClientBackend::QBittorrent => "qbittorrent".to_string(),
                    },
                    url: qb.map(|q| q.url.clone()),
                    credentials_configured: qb.is_some_and(|q| !q.password.is_empty()),
                }
            }),
            preview: config.preview.clone(),
            metadata: SanitizedMetadataConfig {
                url: config.metadata.url.clone(),
                token_configured: config.metadata.token.as_deref().is_some_and(|t| !t.is_empty()),
            },
            library: SanitizedLibraryConfig {
                root: config.library.root.clone(),
                transfer_method: config.library.transfer_method,
                directory_rule: config.library.directory_rule.clone(),
                filename_rule: config.library.filename_rule.clone(),
                nfo_title_rule: config.library.nfo_title_rule.clone(),
                watermark_enabled: config.library.watermark.enabled,
                watermark_start_corner: config.library.watermark.start_corner,
            },
            media_server: config
                .media_server
                .as_ref()
                .map(|m| SanitizedMediaServerConfig {
                    url: m.url.clone(),
                    api_key_configured: !m.api_key.is_empty(),
                    item_types: m.item_types.clone(),
                }),
            llm: config.llm.as_ref().map(|l| SanitizedLlmConfig {
                provider: match l.provider {
                    LlmProvider::Anthropic => "anthropic".to_string(),
                    LlmProvider::Ollama => "ollama".to_string(),
                },
                model: l.model.clone(),
                api_key_configured: l.api_key.as_deref().is_some_and(|k| !k.is_empty()),
            }),
            classifier_enabled: config.classifier.enabled,
            translator: config.translator.clone(),
            jobs: config.jobs.clone(),
            notify_configured: config.notify.webhook_url.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "magpie.db");
        assert!(config.torrent_client.is_none());
        assert!(config.media_server.is_none());
        assert!(!config.jobs.enabled);
    }

    #[test]
    fn test_deserialize_with_torrent_client() {
        let toml = r#"
[torrent_client]
backend = "qbittorrent"

[torrent_client.qbittorrent]
url = "http://localhost:8081"
username = "admin"
password = "secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let tc = config.torrent_client.as_ref().unwrap();
        assert_eq!(tc.backend, TorrentClientBackend::QBittorrent);

        let qb = tc.qbittorrent.as_ref().unwrap();
        assert_eq!(qb.url, "http://localhost:8081");
        assert_eq!(qb.timeout_secs, 30); // default
        assert!(qb.download_path.is_none());
    }

    #[test]
    fn test_deserialize_full_sections() {
        let toml = r#"
[downloads]
base_dir = "/data/downloads"

[library]
root = "/media/library"
transfer_method = "hardlink"

[library.watermark]
enabled = true
start_corner = "bottom_right"

[media_server]
url = "http://jellyfin:8096"
api_key = "key"

[llm]
provider = "ollama"
model = "qwen2.5"

[translator]
enabled = true

[jobs]
enabled = true
sweep_interval_secs = 30
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.downloads.base_dir, "/data/downloads");
        assert_eq!(config.library.transfer_method, TransferMethod::Hardlink);
        assert_eq!(config.library.watermark.start_corner, Corner::BottomRight);
        assert_eq!(config.media_server.as_ref().unwrap().item_types, vec!["Movie"]);
        assert!(config.translator.enabled);
        assert_eq!(config.jobs.sweep_interval_secs, 30);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[torrent_client]
backend = "qbittorrent"

[torrent_client.qbittorrent]
url = "http://localhost:8081"
username = "admin"
password = "secret"

[media_server]
url = "http://jellyfin:8096"
api_key = "jelly-key"

[notify]
webhook_url = "http://hooks.local/magpie"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);

        let tc = sanitized.torrent_client.as_ref().unwrap();
        assert_eq!(tc.backend, "qbittorrent");
        assert!(tc.credentials_configured);
        assert!(sanitized.media_server.as_ref().unwrap().api_key_configured);
        assert!(sanitized.notify_configured);
        assert!(!sanitized.metadata.token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("jelly-key"));
    }
}
