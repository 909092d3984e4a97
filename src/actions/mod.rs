//! File actions module.
//!
//! This module provides functionality for:
//! - Safe deletion via the trash crate, with confirmed permanent fallback
//! - No-clobber moves into a destination directory
//! - An append-only audit log of every attempted operation
//!
//! # Safety
//!
//! Actions are applied per file and never abort a batch. A group whose
//! keeper has disappeared is left untouched, so the last copy of a file is
//! never removed.
//!
//! ```no_run
//! use dupekeep::actions::{apply_action, ActionKind};
//! use dupekeep::duplicates::SelectionDecision;
//!
//! let decisions: Vec<SelectionDecision> = Vec::new();
//! let records = apply_action(&decisions, &ActionKind::Delete, false, None);
//! for record in &records {
//!     println!("{:?} {}", record.outcome, record.source.display());
//! }
//! ```

pub mod audit;
pub mod delete;
pub mod executor;
pub mod relocate;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use audit::{AuditError, AuditLog, AuditOperation, AuditOutcome, AuditRecord};
pub use delete::{delete_file, DeleteMethod, DeleteMode};
pub use executor::{ActionExecutor, ActionKind, ActionSummary};
pub use relocate::move_file;

use crate::duplicates::SelectionDecision;

/// Why a single delete or move did not happen.
#[derive(Debug, Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Path is a directory or otherwise not a plain file.
    #[error("Not a file: {0}")]
    NotAFile(PathBuf),

    /// Moving a symlink would relocate the link, not the data.
    #[error("Refusing to move symlink {0}")]
    SymlinkSource(PathBuf),

    /// Trash operation failed.
    #[error("Trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File being deleted
        path: PathBuf,
        /// Reason reported by the platform
        message: String,
    },

    /// Permanent removal needed but not confirmed.
    #[error("Permanent deletion of {0} requires confirmation")]
    ConfirmationRequired(PathBuf),

    /// Move destination is not an existing directory.
    #[error("Destination is not a directory: {0}")]
    DestinationInvalid(PathBuf),

    /// Every candidate name in the destination is taken.
    #[error("No free name for {source_path} in {dest_dir}")]
    NoFreeName {
        /// File being moved
        source_path: PathBuf,
        /// Destination directory
        dest_dir: PathBuf,
    },

    /// A cross-device copy did not produce the expected number of bytes.
    #[error("Copy of {path} is incomplete ({actual} of {expected} bytes)")]
    CopyMismatch {
        /// File being moved
        path: PathBuf,
        /// Source size
        expected: u64,
        /// Bytes written
        actual: u64,
    },

    /// Any other I/O failure.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    pub(crate) fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

/// Callback trait for action progress reporting.
pub trait ActionProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_start(&self, total: usize);

    /// Called after each file with its position and outcome.
    fn on_file(&self, index: usize, path: &Path, success: bool);

    /// Called when the batch is done.
    fn on_complete(&self, succeeded: usize, failed: usize);
}

/// Apply `kind` to every removal in `decisions`.
///
/// Deletions go to the trash; `confirm` allows a permanent fallback when
/// the trash is unavailable. Moves ignore `confirm`. Each record is written
/// to `audit` (when given) before this returns.
pub fn apply_action(
    decisions: &[SelectionDecision],
    kind: &ActionKind,
    confirm: bool,
    audit: Option<Arc<AuditLog>>,
) -> Vec<AuditRecord> {
    let mut executor = ActionExecutor::new();
    if let Some(log) = audit {
        executor = executor.with_audit_log(log);
    }
    executor.apply(decisions, kind, confirm)
}
