//! Safe file deletion using the trash crate.
//!
//! # Overview
//!
//! Deletion prefers the system trash so a mistaken cleanup can be undone.
//! Permanent removal happens only when the caller has confirmed it, either
//! because it asked for [`DeleteMode::Permanent`] outright or because the
//! trash was unavailable and a fallback was allowed. The method that was
//! actually used is reported back so it can be recorded in the audit log.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::actions::delete::{delete_file, DeleteMode};
//! use std::path::Path;
//!
//! match delete_file(Path::new("/path/to/duplicate.txt"), DeleteMode::Trash, false) {
//!     Ok((method, size)) => println!("Removed {size} bytes via {method}"),
//!     Err(e) => eprintln!("Failed: {e}"),
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ActionError;

/// How the caller wants files removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Move to the system trash, falling back to permanent removal only
    /// with confirmation
    #[default]
    Trash,
    /// Remove permanently (requires confirmation)
    Permanent,
}

/// How a file was actually removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMethod {
    /// Moved to the system trash
    Trash,
    /// Removed permanently because the caller asked for it
    Permanent,
    /// Removed permanently because the trash failed
    PermanentFallback,
}

impl DeleteMethod {
    /// Whether the file can be restored from the trash.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        self == Self::Trash
    }
}

impl std::fmt::Display for DeleteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Trash => "trash",
            Self::Permanent => "permanent",
            Self::PermanentFallback => "permanent (trash unavailable)",
        })
    }
}

/// Delete a single file to the system trash.
///
/// Returns the size of the removed file.
///
/// # Errors
///
/// - [`ActionError::NotFound`] if the file doesn't exist
/// - [`ActionError::PermissionDenied`] if the file can't be inspected
/// - [`ActionError::TrashFailed`] if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<u64, ActionError> {
    let size = existing_file_size(path)?;

    trash::delete(path).map_err(|e| {
        log::warn!("Trash operation failed for {}: {}", path.display(), e);
        ActionError::TrashFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Permanently delete a single file.
///
/// **WARNING**: This operation cannot be undone.
///
/// # Errors
///
/// - [`ActionError::NotFound`] if the file doesn't exist
/// - [`ActionError::PermissionDenied`] if deletion is not allowed
/// - [`ActionError::Io`] for any other failure
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let size = existing_file_size(path)?;

    fs::remove_file(path).map_err(|e| {
        log::error!("Permanent delete failed for {}: {}", path.display(), e);
        ActionError::from_io(path, e)
    })?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Delete `path` according to `mode`.
///
/// `confirm` gates every permanent removal. In [`DeleteMode::Trash`] it
/// also decides whether a failed trash operation may fall back to
/// permanent deletion.
///
/// # Errors
///
/// Returns [`ActionError::ConfirmationRequired`] when a permanent removal
/// was needed but not confirmed, or the underlying deletion error.
pub fn delete_file(
    path: &Path,
    mode: DeleteMode,
    confirm: bool,
) -> Result<(DeleteMethod, u64), ActionError> {
    match mode {
        DeleteMode::Permanent => {
            if !confirm {
                return Err(ActionError::ConfirmationRequired(path.to_path_buf()));
            }
            permanent_delete(path).map(|size| (DeleteMethod::Permanent, size))
        }
        DeleteMode::Trash => match delete_to_trash(path) {
            Ok(size) => Ok((DeleteMethod::Trash, size)),
            Err(ActionError::TrashFailed { path, message }) => {
                if !confirm {
                    return Err(ActionError::TrashFailed { path, message });
                }
                log::warn!(
                    "Trash unavailable for {} ({}), deleting permanently",
                    path.display(),
                    message
                );
                permanent_delete(&path).map(|size| (DeleteMethod::PermanentFallback, size))
            }
            Err(e) => Err(e),
        },
    }
}

fn existing_file_size(path: &Path) -> Result<u64, ActionError> {
    let metadata = fs::symlink_metadata(path).map_err(|e| ActionError::from_io(path, e))?;
    if metadata.is_dir() {
        return Err(ActionError::NotAFile(path.to_path_buf()));
    }
    Ok(metadata.len())
}
