//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Size-based file grouping (Pass 1)
//! - Quick fingerprint comparison (Pass 2)
//! - Full digest comparison (Pass 3)
//! - Duplicate group management and keeper selection

pub mod finder;
pub mod groups;
pub mod selection;

pub use finder::{
    scan, DuplicateFinder, FinderConfig, FinderError, PassStats, ScanOptions, ScanResult,
    ScanState, ScanSummary, DEFAULT_WORKERS,
};
pub use groups::{
    build_groups, group_by_size, sort_groups, DuplicateGroup, GroupSummary, GroupingStats,
    SizeGroup,
};
pub use selection::{apply_strategy, select, SelectionDecision, SelectionStrategy, UnknownStrategy};
