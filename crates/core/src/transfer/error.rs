//! Error types for the transfer engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum TransferError {
    /// No catalog code could be read from the file name.
    #[error("cannot parse a code from file name: {0}")]
    UnparsableFilename(String),

    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The metadata provider has no candidate for the code.
    #[error("no metadata found for {0}")]
    MetadataNotFound(String),

    /// The metadata provider failed while resolving the code.
    #[error("metadata unavailable for {code}: {reason}")]
    MetadataUnavailable { code: String, reason: String },

    /// The computed destination file is already there.
    #[error("destination already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("library root is not configured")]
    NotConfigured,

    #[error("HTTP client setup failed: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error happened before anything on disk was touched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnparsableFilename(_)
                | Self::SourceMissing(_)
                | Self::MetadataNotFound(_)
                | Self::MetadataUnavailable { .. }
                | Self::TargetExists(_)
                | Self::NotConfigured
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransferError::TargetExists(PathBuf::from("/lib/ABC-123/ABC-123.mp4"));
        assert_eq!(
            err.to_string(),
            "destination already exists: /lib/ABC-123/ABC-123.mp4"
        );

        let err = TransferError::MetadataUnavailable {
            code: "ABC-123".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(err.to_string(), "metadata unavailable for ABC-123: timeout");
    }

    #[test]
    fn test_precondition_errors() {
        assert!(TransferError::NotConfigured.is_precondition());
        assert!(TransferError::TargetExists(PathBuf::from("/x")).is_precondition());
        assert!(!TransferError::io("/x", std::io::Error::other("boom")).is_precondition());
    }
}
