//! Torrent daemon abstraction.
//!
//! This module provides a `TorrentClient` trait for handing magnet links to an
//! external daemon and reading back its torrent list.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
