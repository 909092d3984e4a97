//! Moving files without overwriting anything at the destination.
//!
//! A file is first hard-linked to its new name, which fails atomically if
//! the name is taken, and then unlinked from its old one. When linking is
//! not possible (different filesystem, unsupported), the contents are
//! copied into a freshly created file, the copy's size is checked, and only
//! then is the source removed. Name collisions are resolved by appending
//! `_1`, `_2`, ... to the file stem.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::ActionError;

/// Give up after this many colliding names.
const MAX_SUFFIX: u32 = 10_000;

/// Destination name for `file_name` with collision suffix `n` (0 = none).
///
/// ```
/// use dupekeep::actions::relocate::candidate_name;
/// use std::ffi::OsStr;
///
/// assert_eq!(candidate_name(OsStr::new("photo.jpg"), 0), "photo.jpg");
/// assert_eq!(candidate_name(OsStr::new("photo.jpg"), 2), "photo_2.jpg");
/// assert_eq!(candidate_name(OsStr::new("README"), 1), "README_1");
/// ```
#[must_use]
pub fn candidate_name(file_name: &std::ffi::OsStr, n: u32) -> OsString {
    if n == 0 {
        return file_name.to_os_string();
    }

    let as_path = Path::new(file_name);
    let stem = as_path.file_stem().unwrap_or(file_name);
    let mut name = stem.to_os_string();
    name.push(format!("_{n}"));
    if let Some(ext) = as_path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// First path in `dest_dir` for `file_name` that does not exist yet.
///
/// The answer can go stale before it is used; [`move_file`] does not rely
/// on it and re-checks atomically.
#[must_use]
pub fn unique_destination(dest_dir: &Path, file_name: &std::ffi::OsStr) -> Option<PathBuf> {
    (0..=MAX_SUFFIX)
        .map(|n| dest_dir.join(candidate_name(file_name, n)))
        .find(|p| fs::symlink_metadata(p).is_err())
}

/// Move `source` into `dest_dir`, returning the final path.
///
/// Never replaces an existing file.
///
/// # Errors
///
/// - [`ActionError::NotFound`] if the source is gone
/// - [`ActionError::SymlinkSource`] if the source is a symlink
/// - [`ActionError::DestinationInvalid`] if `dest_dir` is not a directory
/// - [`ActionError::NoFreeName`] if every suffixed name is taken
/// - [`ActionError::CopyMismatch`] if a cross-device copy came out short
/// - [`ActionError::Io`] for any other failure
pub fn move_file(source: &Path, dest_dir: &Path) -> Result<PathBuf, ActionError> {
    let metadata = fs::symlink_metadata(source).map_err(|e| ActionError::from_io(source, e))?;
    if metadata.is_dir() {
        return Err(ActionError::NotAFile(source.to_path_buf()));
    }
    if metadata.file_type().is_symlink() {
        return Err(ActionError::SymlinkSource(source.to_path_buf()));
    }
    if !dest_dir.is_dir() {
        return Err(ActionError::DestinationInvalid(dest_dir.to_path_buf()));
    }
    let Some(file_name) = source.file_name() else {
        return Err(ActionError::NotAFile(source.to_path_buf()));
    };

    for n in 0..=MAX_SUFFIX {
        let target = dest_dir.join(candidate_name(file_name, n));
        match place(source, &target, metadata.len()) {
            Ok(()) => {
                if n > 0 {
                    log::info!(
                        "Destination name taken, moved {} as {}",
                        source.display(),
                        target.display()
                    );
                } else {
                    log::info!("Moved {} -> {}", source.display(), target.display());
                }
                return Ok(target);
            }
            Err(Placement::Taken) => {
                log::trace!("Name taken: {}", target.display());
            }
            Err(Placement::Failed(e)) => return Err(e),
        }
    }

    Err(ActionError::NoFreeName {
        source_path: source.to_path_buf(),
        dest_dir: dest_dir.to_path_buf(),
    })
}

enum Placement {
    Taken,
    Failed(ActionError),
}

fn place(source: &Path, target: &Path, expected_len: u64) -> Result<(), Placement> {
    match fs::hard_link(source, target) {
        Ok(()) => {
            return fs::remove_file(source).map_err(|e| {
                // Leave things as they were: one name, at the source
                let _ = fs::remove_file(target);
                Placement::Failed(ActionError::from_io(source, e))
            });
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Placement::Taken),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !source.exists() => {
            return Err(Placement::Failed(ActionError::from_io(source, e)));
        }
        Err(e) => {
            log::debug!(
                "Hard link {} -> {} failed ({}), copying instead",
                source.display(),
                target.display(),
                e
            );
        }
    }

    copy_then_remove(source, target, expected_len)
}

fn copy_then_remove(source: &Path, target: &Path, expected_len: u64) -> Result<(), Placement> {
    let mut dest = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Placement::Taken),
        Err(e) => return Err(Placement::Failed(ActionError::from_io(target, e))),
    };

    let copied = File::open(source)
        .and_then(|mut src| {
            let n = io::copy(&mut src, &mut dest)?;
            dest.sync_all()?;
            let perms = src.metadata()?.permissions();
            fs::set_permissions(target, perms)?;
            Ok(n)
        })
        .map_err(|e| ActionError::from_io(source, e));

    let copied = match copied {
        Ok(n) if n == expected_len => n,
        Ok(n) => {
            let _ = fs::remove_file(target);
            return Err(Placement::Failed(ActionError::CopyMismatch {
                path: source.to_path_buf(),
                expected: expected_len,
                actual: n,
            }));
        }
        Err(e) => {
            let _ = fs::remove_file(target);
            return Err(Placement::Failed(e));
        }
    };

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(target);
        return Err(Placement::Failed(ActionError::from_io(source, e)));
    }

    log::debug!("Copied {} bytes to {}", copied, target.display());
    Ok(())
}
