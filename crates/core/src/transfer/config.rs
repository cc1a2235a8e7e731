//! `[library]` configuration for the transfer engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a completed download is placed into the library tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    /// Rename, falling back to copy + remove across filesystems.
    #[default]
    Move,
    Copy,
    Hardlink,
    Symlink,
}

impl TransferMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMethod::Move => "move",
            TransferMethod::Copy => "copy",
            TransferMethod::Hardlink => "hardlink",
            TransferMethod::Symlink => "symlink",
        }
    }
}

/// Image corner, walked clockwise when placing several marks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    #[default]
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub fn next(self) -> Corner {
        match self {
            Corner::TopLeft => Corner::TopRight,
            Corner::TopRight => Corner::BottomRight,
            Corner::BottomRight => Corner::BottomLeft,
            Corner::BottomLeft => Corner::TopLeft,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory holding `<kind>.png` mark images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks_dir: Option<PathBuf>,
    /// Mark height as a fraction of the base image height.
    #[serde(default = "default_size_ratio")]
    pub size_ratio: f32,
    #[serde(default)]
    pub start_corner: Corner,
}

fn default_size_ratio() -> f32 {
    0.12
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            marks_dir: None,
            size_ratio: default_size_ratio(),
            start_corner: Corner::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root of the media library tree.
    #[serde(default)]
    pub root: PathBuf,

    #[serde(default)]
    pub transfer_method: TransferMethod,

    /// Directory template, `/`-separated, relative to `root`.
    #[serde(default = "default_directory_rule")]
    pub directory_rule: String,

    /// File stem template; the source extension is kept.
    #[serde(default = "default_filename_rule")]
    pub filename_rule: String,

    /// Template for the NFO `<title>`.
    #[serde(default = "default_nfo_title_rule")]
    pub nfo_title_rule: String,

    /// Titles are cut to this many characters before expansion.
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,

    /// Download preview images into `extrafanart/`.
    #[serde(default)]
    pub extrafanart: bool,

    /// Download poster, thumb and fanart next to the file.
    #[serde(default = "default_true")]
    pub download_images: bool,

    #[serde(default = "default_image_timeout")]
    pub image_timeout_secs: u32,

    #[serde(default)]
    pub watermark: WatermarkConfig,
}

fn default_directory_rule() -> String {
    "{actor}/{number}".to_string()
}

fn default_filename_rule() -> String {
    "{number}{suffix}".to_string()
}

fn default_nfo_title_rule() -> String {
    "{number} {title}".to_string()
}

fn default_max_title_len() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_image_timeout() -> u32 {
    30
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            transfer_method: TransferMethod::default(),
            directory_rule: default_directory_rule(),
            filename_rule: default_filename_rule(),
            nfo_title_rule: default_nfo_title_rule(),
            max_title_len: default_max_title_len(),
            extrafanart: false,
            download_images: true,
            image_timeout_secs: default_image_timeout(),
            watermark: WatermarkConfig::default(),
        }
    }
}
