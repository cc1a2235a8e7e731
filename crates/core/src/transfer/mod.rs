//! Transactional media transfer.
//!
//! A completed download is filed into the library tree in two phases:
//!
//! 1. **Planning**: parse the file name, check the source, resolve metadata,
//!    translate, expand the rule templates and make sure the destination is
//!    free. Nothing on disk changes.
//! 2. **Mutation**: create directories, place the file, write artwork and the
//!    NFO. Every effect goes into an [`UndoLog`]; on any error the log is
//!    unwound in reverse before the error is returned.
//!
//! The transfer log row is `PROCESSING` for the whole run and ends as
//! `SUCCESS` or `FAILURE`.

mod config;
mod engine;
mod error;
mod filename;
mod images;
mod nfo;
mod ops;
mod rules;
mod undo;

pub use config::{Corner, LibraryConfig, TransferMethod, WatermarkConfig};
pub use engine::{TransferEngine, TransferOutcome};
pub use error::TransferError;
pub use filename::{parse_filename, FileAttributes, MarkKind};
pub use rules::{sanitize_component, RuleContext};
pub use undo::{RollbackReport, UndoEntry, UndoLog};
