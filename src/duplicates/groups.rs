//! Size grouping and confirmed duplicate groups.
//!
//! # Overview
//!
//! Size grouping is the first pass of duplicate detection: files with
//! different sizes cannot be duplicates, so singleton sizes are dropped
//! without reading any content.
//!
//! Confirmed groups are represented by [`DuplicateGroup`], whose
//! constructor enforces the group invariants (two or more members, one
//! shared size).
//!
//! Bucketing here always preserves first-seen order, so an unchanged tree
//! produces the same groups in the same order on every run.
//!
//! # Example
//!
//! ```
//! use dupekeep::scanner::FileRecord;
//! use dupekeep::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileRecord::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()),
//!     FileRecord::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//!
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::collections::HashMap;
use std::hash::Hash as StdHash;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::scanner::hasher::serialize_hex;
use crate::scanner::{FileRecord, Hash};

/// A group of files with the same size.
#[derive(Debug, Clone)]
pub struct SizeGroup {
    /// File size in bytes (shared by all files in this group)
    pub size: u64,
    /// Files with this exact size, in enumeration order
    pub files: Vec<FileRecord>,
}

impl SizeGroup {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Potential space savings (all copies minus one).
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }
}

/// Confirmed set of files with identical content.
///
/// Immutable once built. Members keep the order in which they were
/// enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    #[serde(rename = "hash", serialize_with = "serialize_hex")]
    digest: Hash,
    size: u64,
    wasted_bytes: u64,
    files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Build a group from files that share `digest`.
    ///
    /// Returns `None` if fewer than two files are given or their sizes
    /// disagree.
    #[must_use]
    pub fn new(digest: Hash, files: Vec<FileRecord>) -> Option<Self> {
        if files.len() < 2 {
            return None;
        }
        let size = files[0].size;
        if files.iter().any(|f| f.size != size) {
            log::warn!(
                "Refusing to group files with digest {} but differing sizes",
                crate::scanner::hash_to_hex(&digest)
            );
            return None;
        }

        let wasted_bytes = size * (files.len() as u64 - 1);
        Some(Self {
            digest,
            size,
            wasted_bytes,
            files,
        })
    }

    /// Full-content digest shared by all members.
    #[must_use]
    pub fn digest(&self) -> &Hash {
        &self.digest
    }

    /// Digest as lowercase hex.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        crate::scanner::hash_to_hex(&self.digest)
    }

    /// Size of each member in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes reclaimable by keeping one copy: `(count - 1) * size`.
    #[must_use]
    pub fn wasted_bytes(&self) -> u64 {
        self.wasted_bytes
    }

    /// Members in enumeration order.
    #[must_use]
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group has no members; never true for a built group.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Whether `path` is a member.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

/// Statistics from the size grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Total number of files processed
    pub total_files: usize,
    /// Total size of all files in bytes
    pub total_size: u64,
    /// Number of unique file sizes
    pub unique_sizes: usize,
    /// Number of files that could be duplicates (in groups of 2+)
    pub potential_duplicates: usize,
    /// Number of files eliminated as unique (singleton sizes)
    pub eliminated_unique: usize,
    /// Number of size groups with 2+ files
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of files eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Split items into buckets by key, preserving first-seen order of both
/// buckets and their members.
pub(crate) fn bucket_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<(K, Vec<T>)>
where
    K: Eq + StdHash + Clone,
    F: FnMut(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, Vec<T>)> = Vec::new();

    for item in items {
        let k = key(&item);
        match index.get(&k) {
            Some(&i) => buckets[i].1.push(item),
            None => {
                index.insert(k.clone(), buckets.len());
                buckets.push((k, vec![item]));
            }
        }
    }

    buckets
}

/// Group files by size, keeping only sizes shared by two or more files.
///
/// Groups come back in the order their first member was seen.
///
/// # Example
///
/// ```
/// use dupekeep::scanner::FileRecord;
/// use dupekeep::duplicates::group_by_size;
/// use std::path::PathBuf;
/// use std::time::SystemTime;
///
/// let files = vec![
///     FileRecord::new(PathBuf::from("/a.txt"), 100, SystemTime::now()),
///     FileRecord::new(PathBuf::from("/c.txt"), 200, SystemTime::now()),
///     FileRecord::new(PathBuf::from("/b.txt"), 100, SystemTime::now()),
/// ];
///
/// let (groups, stats) = group_by_size(files);
///
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].size, 100);
/// assert_eq!(stats.eliminated_unique, 1);
/// ```
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileRecord>,
) -> (Vec<SizeGroup>, GroupingStats) {
    let mut stats = GroupingStats::default();

    let buckets = bucket_by(
        files.into_iter().inspect(|f| {
            stats.total_files += 1;
            stats.total_size += f.size;
        }),
        |f| f.size,
    );
    stats.unique_sizes = buckets.len();

    let mut groups = Vec::new();
    for (size, files) in buckets {
        if files.len() < 2 {
            stats.eliminated_unique += files.len();
            log::trace!(
                "Eliminated unique size {}: {}",
                size,
                files[0].path.display()
            );
            continue;
        }
        stats.potential_duplicates += files.len();
        stats.duplicate_groups += 1;
        log::debug!(
            "Size group {} bytes: {} potential duplicates",
            size,
            files.len()
        );
        groups.push(SizeGroup { size, files });
    }

    log::info!(
        "Pass 1 complete: {} files → {} potential duplicates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (groups, stats)
}

/// Build confirmed groups from digest buckets, dropping singletons, and
/// sort them.
#[must_use]
pub fn build_groups(buckets: impl IntoIterator<Item = (Hash, Vec<FileRecord>)>) -> Vec<DuplicateGroup> {
    let mut groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter_map(|(digest, files)| DuplicateGroup::new(digest, files))
        .collect();
    sort_groups(&mut groups);
    groups
}

/// Sort groups by reclaimable bytes, largest first, then by member count.
///
/// Remaining ties fall back to the digest so the order is total.
pub fn sort_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        b.wasted_bytes
            .cmp(&a.wasted_bytes)
            .then_with(|| b.files.len().cmp(&a.files.len()))
            .then_with(|| a.digest.cmp(&b.digest))
    });
}

/// Totals over a set of confirmed groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    /// Number of groups
    pub groups: usize,
    /// Number of files across all groups
    pub files: usize,
    /// Bytes reclaimable by keeping one copy per group
    pub reclaimable_bytes: u64,
}

impl GroupSummary {
    /// Summarize `groups`.
    #[must_use]
    pub fn from_groups(groups: &[DuplicateGroup]) -> Self {
        Self {
            groups: groups.len(),
            files: groups.iter().map(DuplicateGroup::len).sum(),
            reclaimable_bytes: groups.iter().map(DuplicateGroup::wasted_bytes).sum(),
        }
    }
}
