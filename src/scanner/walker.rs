//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and collecting [`FileRecord`] snapshots of candidate files.
//!
//! # Features
//!
//! - Deterministic, name-sorted traversal order
//! - Symlinks skipped by default; loop detection when following them, and
//!   each file is reported once however many links lead to it
//! - Gitignore-style exclusion patterns via the `ignore` crate, pruning
//!   excluded directories before they are read
//! - Size filtering (min/max) and hidden file filtering
//! - Empty files are never candidates
//! - Cooperative cancellation via a [`CancelCheck`]
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),  // Skip files under 1KB
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::{Parallelism, WalkDir};

use super::{FileRecord, ScanError, WalkerConfig};
use crate::signal::CancelCheck;

/// Directory walker for candidate discovery.
///
/// Enumeration is single-threaded and yields entries sorted by file name
/// within each directory, so two walks of an unchanged tree agree.
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional cancellation check, polled once per entry
    cancel_check: Option<CancelCheck>,
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("cancel_check", &self.cancel_check.is_some())
            .finish()
    }
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupekeep::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// ```
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            cancel_check: None,
        }
    }

    /// Set a cancellation check.
    ///
    /// When the check returns `true` the walker stops yielding entries.
    #[must_use]
    pub fn with_cancel_check(mut self, check: CancelCheck) -> Self {
        self.cancel_check = Some(check);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_check.as_ref().is_some_and(|check| check())
    }

    /// Build the exclusion matcher from configured patterns.
    fn build_gitignore(&self) -> Option<Gitignore> {
        if self.config.excluded_globs.is_empty() {
            return None;
        }

        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in &self.config.excluded_globs {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid exclude pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build exclude patterns: {}", e);
                None
            }
        }
    }

    /// Check whether a path is excluded.
    fn is_excluded(root: &Path, gitignore: &Gitignore, path: &Path, is_dir: bool) -> bool {
        let relative_path = path.strip_prefix(root).unwrap_or(path);
        let path_str = relative_path.to_string_lossy();
        let normalized_path = if cfg!(windows) {
            path_str.replace('\\', "/")
        } else {
            path_str.into_owned()
        };

        gitignore.matched(normalized_path, is_dir).is_ignore()
    }

    /// Check if a file passes size filters.
    fn passes_size_filter(&self, size: u64) -> bool {
        if let Some(min) = self.config.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.config.max_size {
            if size > max {
                return false;
            }
        }
        true
    }

    /// Walk the directory tree, yielding file records.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration; the caller decides whether to surface them.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dupekeep::scanner::{Walker, WalkerConfig};
    /// use std::path::Path;
    ///
    /// let walker = Walker::new(Path::new("."), WalkerConfig::default());
    /// let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
    /// println!("Found {} files", files.len());
    /// ```
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let prune_root = self.root.clone();

        let walk_dir = WalkDir::new(&self.root)
            .parallelism(Parallelism::Serial)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                // Excluded entries are dropped here so excluded
                // directories are never descended into.
                if let Some(gi) = &gitignore {
                    children.retain(|child| match child {
                        Ok(entry) => {
                            let excluded = Self::is_excluded(
                                &prune_root,
                                gi,
                                &entry.path(),
                                entry.file_type().is_dir(),
                            );
                            if excluded {
                                log::trace!("Excluding: {}", entry.path().display());
                            }
                            !excluded
                        }
                        Err(_) => true,
                    });
                }

                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        let mut iter = walk_dir.into_iter();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        std::iter::from_fn(move || loop {
            if self.is_cancelled() {
                log::debug!("Walker: cancellation requested, stopping iteration");
                return None;
            }

            let entry_result = iter.next()?;
            let item = match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if entry.depth == 0 {
                        continue;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        continue;
                    }

                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        continue;
                    }

                    let metadata = if self.config.follow_symlinks {
                        std::fs::metadata(&path)
                    } else {
                        std::fs::symlink_metadata(&path)
                    };

                    match metadata {
                        Ok(m) => {
                            if self.config.follow_symlinks
                                && m.is_file()
                                && !Self::first_sighting(&path, &mut seen)
                            {
                                continue;
                            }
                            self.process_file_entry(path, &m)
                        }
                        Err(e) => Some(Err(Self::handle_io_error(&path, e))),
                    }
                }
                Err(e) => Some(Err(self.handle_jwalk_error(e))),
            };

            if let Some(item) = item {
                return Some(item);
            }
        })
    }

    /// Record the resolved location of `path`; false if it was seen before
    /// under another name.
    fn first_sighting(path: &Path, seen: &mut HashSet<PathBuf>) -> bool {
        match std::fs::canonicalize(path) {
            Ok(canonical) => {
                let first = seen.insert(canonical);
                if !first {
                    log::debug!("Skipping {}: same file reached through a link", path.display());
                }
                first
            }
            Err(e) => {
                log::debug!("Could not resolve {}: {}", path.display(), e);
                true
            }
        }
    }

    /// Turn a regular file into a record if it passes the filters.
    fn process_file_entry(
        &self,
        path: PathBuf,
        metadata: &Metadata,
    ) -> Option<Result<FileRecord, ScanError>> {
        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();

        // Empty files are trivially identical and never candidates
        if size == 0 {
            log::trace!("Skipping empty file: {}", path.display());
            return None;
        }

        if !self.passes_size_filter(size) {
            log::trace!(
                "Skipping file due to size filter ({}): {}",
                size,
                path.display()
            );
            return None;
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        Some(Ok(FileRecord::new(path, size, modified)))
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Handle jwalk errors, typically unreadable directories.
    fn handle_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);

        if error.loop_ancestor().is_some() {
            log::warn!("Symlink loop detected at {}", path.display());
            return ScanError::SymlinkLoop(path);
        }

        match error.io_error().map(std::io::Error::kind) {
            Some(kind) => Self::handle_io_error(&path, std::io::Error::new(kind, error.to_string())),
            None => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}
