//! Placing a file into the library with the configured transfer method.

use std::io;
use std::path::Path;

use tokio::fs;
use tracing::debug;

use super::config::TransferMethod;
use super::error::TransferError;
use super::undo::{UndoEntry, UndoLog};

fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18)
}

/// Rename `from` to `to`, copying and removing when they sit on different
/// filesystems. A failed copy leaves no partial file behind.
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(from = %from.display(), to = %to.display(), "Cross-device move, copying");
            if let Err(e) = fs::copy(from, to).await {
                let _ = fs::remove_file(to).await;
                return Err(e);
            }
            fs::remove_file(from).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
async fn symlink(source: &Path, dest: &Path) -> io::Result<()> {
    fs::symlink(source, dest).await
}

#[cfg(windows)]
async fn symlink(source: &Path, dest: &Path) -> io::Result<()> {
    fs::symlink_file(source, dest).await
}

/// Put `source` at `dest` and record the effect in `undo`.
///
/// Only [`TransferMethod::Move`] touches the source.
pub async fn place(
    method: TransferMethod,
    source: &Path,
    dest: &Path,
    undo: &mut UndoLog,
) -> Result<(), TransferError> {
    let result = match method {
        TransferMethod::Move => move_file(source, dest).await,
        TransferMethod::Copy => fs::copy(source, dest).await.map(|_| ()),
        TransferMethod::Hardlink => fs::hard_link(source, dest).await,
        TransferMethod::Symlink => symlink(source, dest).await,
    };

    if let Err(e) = result {
        // copy may have left a partial file
        if method == TransferMethod::Copy {
            let _ = fs::remove_file(dest).await;
        }
        return Err(TransferError::io(dest, e));
    }

    undo.record(match method {
        TransferMethod::Move => UndoEntry::MovedFile {
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
        },
        _ => UndoEntry::CreatedFile(dest.to_path_buf()),
    });
    debug!(method = method.as_str(), dest = %dest.display(), "File placed");
    Ok(())
}
