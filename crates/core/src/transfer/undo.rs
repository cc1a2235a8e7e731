//! Record of filesystem side effects, unwound in reverse on failure.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::error::TransferError;
use super::ops::move_file;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry {
    CreatedDir(PathBuf),
    CreatedFile(PathBuf),
    /// A file was moved from `from` to `to`; undo moves it back.
    MovedFile { from: PathBuf, to: PathBuf },
}

/// What a rollback managed to undo.
#[derive(Debug, Default)]
pub struct RollbackReport {
    pub files_removed: usize,
    pub files_restored: usize,
    pub dirs_removed: usize,
    pub errors: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    /// Create `path` and any missing parents, recording each directory made.
    pub async fn create_dir_all(&mut self, path: &Path) -> Result<(), TransferError> {
        let mut missing = Vec::new();
        let mut current = Some(path);
        while let Some(dir) = current {
            if fs::try_exists(dir).await.unwrap_or(false) {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }

        for dir in missing.into_iter().rev() {
            match fs::create_dir(&dir).await {
                Ok(()) => self.record(UndoEntry::CreatedDir(dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(TransferError::io(dir, e)),
            }
        }
        Ok(())
    }

    /// Write a new file. Existing files are never overwritten.
    pub async fn write_new(&mut self, path: &Path, bytes: &[u8]) -> Result<(), TransferError> {
        use tokio::io::AsyncWriteExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        self.record(UndoEntry::CreatedFile(path.to_path_buf()));

        file.write_all(bytes)
            .await
            .map_err(|e| TransferError::io(path, e))?;
        file.flush().await.map_err(|e| TransferError::io(path, e))?;
        Ok(())
    }

    /// Undo every recorded effect, newest first.
    ///
    /// Keeps going past individual failures so as much as possible is undone.
    pub async fn rollback(self) -> RollbackReport {
        let mut report = RollbackReport::default();

        for entry in self.entries.into_iter().rev() {
            match entry {
                UndoEntry::CreatedFile(path) => match fs::remove_file(&path).await {
                    Ok(()) => report.files_removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => report
                        .errors
                        .push(format!("remove {}: {}", path.display(), e)),
                },
                UndoEntry::MovedFile { from, to } => match move_file(&to, &from).await {
                    Ok(()) => report.files_restored += 1,
                    Err(e) => report.errors.push(format!(
                        "restore {} -> {}: {}",
                        to.display(),
                        from.display(),
                        e
                    )),
                },
                UndoEntry::CreatedDir(path) => match fs::remove_dir(&path).await {
                    Ok(()) => report.dirs_removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        // not empty: something we did not create lives there
                        debug!(path = %path.display(), error = %e, "Keeping directory");
                    }
                },
            }
        }

        if !report.is_clean() {
            warn!(errors = ?report.errors, "Rollback finished with errors");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_dir_all_records_only_new_dirs() {
        let temp = TempDir::new().unwrap();
        let existing = temp.path().join("existing");
        std::fs::create_dir(&existing).unwrap();

        let mut undo = UndoLog::new();
        let target = existing.join("a").join("b");
        undo.create_dir_all(&target).await.unwrap();

        assert!(target.is_dir());
        assert_eq!(
            undo.entries(),
            &[
                UndoEntry::CreatedDir(existing.join("a")),
                UndoEntry::CreatedDir(target.clone()),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_new_refuses_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("movie.nfo");
        std::fs::write(&path, "keep").unwrap();

        let mut undo = UndoLog::new();
        let result = undo.write_new(&path, b"new").await;

        assert!(matches!(result, Err(TransferError::Io { .. })));
        assert!(undo.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_rollback_unwinds_in_reverse() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.mp4");
        std::fs::write(&source, "video").unwrap();

        let mut undo = UndoLog::new();
        let dest_dir = temp.path().join("lib").join("ABC-123");
        undo.create_dir_all(&dest_dir).await.unwrap();

        let dest = dest_dir.join("ABC-123.mp4");
        move_file(&source, &dest).await.unwrap();
        undo.record(UndoEntry::MovedFile {
            from: source.clone(),
            to: dest.clone(),
        });
        undo.write_new(&dest_dir.join("ABC-123.nfo"), b"<movie/>")
            .await
            .unwrap();

        let report = undo.rollback().await;

        assert!(report.is_clean());
        assert_eq!(report.files_removed, 1);
        assert_eq!(report.files_restored, 1);
        assert_eq!(report.dirs_removed, 2);
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "video");
        assert!(!temp.path().join("lib").exists());
    }

    #[tokio::test]
    async fn test_rollback_keeps_non_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("created");

        let mut undo = UndoLog::new();
        undo.create_dir_all(&dir).await.unwrap();
        std::fs::write(dir.join("foreign.txt"), "not ours").unwrap();

        let report = undo.rollback().await;
        assert_eq!(report.dirs_removed, 0);
        assert!(dir.join("foreign.txt").exists());
    }
}
