//! Scanner module for directory enumeration and file hashing.
//!
//! This module provides functionality for:
//! - Directory enumeration using jwalk, with exclusion rules
//! - Quick fingerprints (head + tail sample) and full BLAKE3 digests
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`hasher`]: BLAKE3 quick fingerprint and streaming full digest
//!
//! The multi-pass pipeline that drives both lives in
//! [`crate::duplicates::finder`].
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("."), config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher, QUICK_SAMPLE_SIZE};
pub use walker::Walker;

/// Snapshot of a candidate file taken at enumeration time.
///
/// Records are never refreshed during a scan. If the file changes after
/// the snapshot the record goes stale; that is not detected mid-scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Head + tail fingerprint, set by the quick-hash pass
    #[serde(skip)]
    pub quick_digest: Option<Hash>,
    /// Full content digest, set by the full-hash pass
    #[serde(skip)]
    pub full_digest: Option<Hash>,
}

impl FileRecord {
    /// Create a record without any digests.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            quick_digest: None,
            full_digest: None,
        }
    }
}

/// Exclusion rules applied while enumerating.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Off by default so link cycles cannot trap the walk.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Size floor in bytes; smaller files are skipped.
    pub min_size: Option<u64>,

    /// Size ceiling in bytes; larger files are skipped.
    pub max_size: Option<u64>,

    /// Gitignore-style glob patterns to exclude.
    pub excluded_globs: Vec<String>,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(
        follow_symlinks: bool,
        skip_hidden: bool,
        min_size: Option<u64>,
        max_size: Option<u64>,
        excluded_globs: Vec<String>,
    ) -> Self {
        Self {
            follow_symlinks,
            skip_hidden,
            min_size,
            max_size,
            excluded_globs,
        }
    }
}

/// Errors that can occur during enumeration.
///
/// None of these are fatal to a scan; they are reported as warnings.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path vanished between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A symlink cycle was detected while following links.
    #[error("Symlink loop detected at {0}")]
    SymlinkLoop(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file vanished before it could be read.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
