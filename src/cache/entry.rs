//! Cache entry definitions.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::scanner::Hash;

/// Which of the two digests a lookup or store refers to.
///
/// A quick fingerprint depends on how many bytes were sampled from each
/// end, so it only matches a row written with the same sample size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestKind {
    /// Head + tail fingerprint
    Quick {
        /// Bytes sampled from each end
        sample_size: u64,
    },
    /// Whole-content digest
    Full,
}

impl DigestKind {
    /// Quick fingerprint taken with `sample_size` bytes from each end.
    #[must_use]
    pub const fn quick(sample_size: usize) -> Self {
        Self::Quick {
            sample_size: sample_size as u64,
        }
    }

    /// Column holding this digest in the `hashes` table.
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Quick { .. } => "quick",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for DigestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// A single row of the hash cache.
///
/// Digests are only trusted while `size` and `modified` match the file on
/// disk exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Absolute path (primary key)
    pub path: PathBuf,
    /// Size when the digests were computed
    pub size: u64,
    /// Modification time when the digests were computed
    pub modified: SystemTime,
    /// Cached quick fingerprint
    pub quick: Option<Hash>,
    /// Sample size the quick fingerprint was taken with
    pub quick_sample: Option<u64>,
    /// Cached full digest
    pub full: Option<Hash>,
    /// Last time the entry was read or written
    pub last_access: SystemTime,
}

impl CacheEntry {
    /// Whether the entry still describes a file with this size and mtime.
    #[must_use]
    pub fn is_valid_for(&self, size: u64, modified: SystemTime) -> bool {
        self.size == size && system_time_to_nanos(self.modified) == system_time_to_nanos(modified)
    }

    /// The stored digest of the given kind.
    #[must_use]
    pub fn digest(&self, kind: DigestKind) -> Option<Hash> {
        match kind {
            DigestKind::Quick { sample_size } if self.quick_sample == Some(sample_size) => {
                self.quick
            }
            DigestKind::Quick { .. } => None,
            DigestKind::Full => self.full,
        }
    }
}

/// Nanoseconds relative to the Unix epoch; negative before it.
pub(crate) fn system_time_to_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}

pub(crate) fn nanos_to_system_time(nanos: i64) -> SystemTime {
    if nanos >= 0 {
        UNIX_EPOCH + Duration::from_nanos(nanos.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
    }
}
