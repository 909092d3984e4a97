//! Keeper selection strategies.
//!
//! A strategy picks exactly one file per [`DuplicateGroup`] to keep; every
//! other member becomes a removal candidate. Ties on the strategy's own
//! criterion fall back to the shorter path, then to plain lexicographic
//! path order, so the choice is deterministic.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::groups::DuplicateGroup;
use crate::scanner::hasher::serialize_hex;
use crate::scanner::{FileRecord, Hash};

/// Rule for choosing which copy in a group survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Keep the copy with the earliest modification time
    #[default]
    KeepOldest,
    /// Keep the copy with the latest modification time
    KeepNewest,
    /// Keep the copy with the shortest path
    KeepShortestPath,
    /// Keep the copy whose file name sorts first
    KeepFirstAlphabetical,
}

impl SelectionStrategy {
    /// Every strategy, in display order.
    pub const ALL: [Self; 4] = [
        Self::KeepOldest,
        Self::KeepNewest,
        Self::KeepShortestPath,
        Self::KeepFirstAlphabetical,
    ];

    /// Canonical kebab-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::KeepOldest => "keep-oldest",
            Self::KeepNewest => "keep-newest",
            Self::KeepShortestPath => "keep-shortest-path",
            Self::KeepFirstAlphabetical => "keep-first-alphabetical",
        }
    }

    fn primary(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            Self::KeepOldest => a.modified.cmp(&b.modified),
            Self::KeepNewest => b.modified.cmp(&a.modified),
            Self::KeepShortestPath => Ordering::Equal,
            Self::KeepFirstAlphabetical => a.path.file_name().cmp(&b.path.file_name()),
        }
    }

    /// Total order used to rank members; the smallest is kept.
    fn rank(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        self.primary(a, b)
            .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
            .then_with(|| a.path.cmp(&b.path))
    }

    /// Pick the member to keep.
    #[must_use]
    pub fn choose_keeper<'a>(self, group: &'a DuplicateGroup) -> &'a FileRecord {
        let mut keeper = &group.files()[0];
        for candidate in &group.files()[1..] {
            if self.rank(candidate, keeper) == Ordering::Less {
                keeper = candidate;
            }
        }
        keeper
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognized strategy name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown selection strategy '{0}' (expected one of: keep-oldest, keep-newest, keep-shortest-path, keep-first-alphabetical)")]
pub struct UnknownStrategy(pub String);

impl FromStr for SelectionStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "keep-oldest" | "oldest" => Ok(Self::KeepOldest),
            "keep-newest" | "newest" => Ok(Self::KeepNewest),
            "keep-shortest-path" | "shortest-path" | "shortest" => Ok(Self::KeepShortestPath),
            "keep-first-alphabetical" | "first-alphabetical" | "alphabetical" => {
                Ok(Self::KeepFirstAlphabetical)
            }
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Outcome of applying a strategy to one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionDecision {
    /// Digest of the group this decision came from
    #[serde(serialize_with = "serialize_hex")]
    pub group_digest: Hash,
    /// File that stays
    pub keeper: PathBuf,
    /// Files to delete or move, in group order, each listed once
    pub removals: Vec<PathBuf>,
    /// Size of each file in the group
    pub size: u64,
}

impl SelectionDecision {
    /// Bytes freed if every removal succeeds.
    #[must_use]
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * self.removals.len() as u64
    }
}

/// Apply `strategy` to every group, one decision per group.
#[must_use]
pub fn apply_strategy(
    groups: &[DuplicateGroup],
    strategy: SelectionStrategy,
) -> Vec<SelectionDecision> {
    groups
        .iter()
        .map(|group| {
            let keeper = strategy.choose_keeper(group).path.clone();
            let mut listed: HashSet<&Path> = HashSet::new();
            let removals = group
                .files()
                .iter()
                .filter(|f| f.path != keeper && listed.insert(&f.path))
                .map(|f| f.path.clone())
                .collect();
            SelectionDecision {
                group_digest: *group.digest(),
                keeper,
                removals,
                size: group.size(),
            }
        })
        .collect()
}

/// Apply a strategy given by name.
///
/// # Errors
///
/// Returns [`UnknownStrategy`] if the name is not recognized.
pub fn select(
    groups: &[DuplicateGroup],
    strategy_name: &str,
) -> Result<Vec<SelectionDecision>, UnknownStrategy> {
    let strategy: SelectionStrategy = strategy_name.parse()?;
    Ok(apply_strategy(groups, strategy))
}
