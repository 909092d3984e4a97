//! JSON output formatter for scan results.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "strategy": "keep-oldest",
//!   "cancelled": false,
//!   "duplicates": [
//!     {
//!       "hash": "abc123...",
//!       "size": 1024,
//!       "wasted_bytes": 1024,
//!       "keeper": "/path/to/file1.txt",
//!       "files": ["/path/to/file1.txt", "/path/to/file2.txt"]
//!     }
//!   ],
//!   "warnings": [],
//!   "summary": { "total_files": 100, "duplicate_groups": 1, "...": "..." },
//!   "actions": null,
//!   "exit_code": 0,
//!   "exit_code_name": "DK000"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::actions::{ActionSummary, AuditRecord};
use crate::duplicates::{
    DuplicateGroup, PassStats, ScanResult, ScanSummary, SelectionDecision, SelectionStrategy,
};
use crate::error::ExitCode;

/// A single duplicate group in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicateGroup {
    /// BLAKE3 digest as hexadecimal string (64 characters)
    pub hash: String,
    /// File size in bytes
    pub size: u64,
    /// Bytes reclaimable by keeping one copy
    pub wasted_bytes: u64,
    /// File chosen to stay
    pub keeper: Option<String>,
    /// Every member, in discovery order
    pub files: Vec<String>,
}

impl JsonDuplicateGroup {
    fn new(group: &DuplicateGroup, decision: Option<&SelectionDecision>) -> Self {
        Self {
            hash: group.hash_hex(),
            size: group.size(),
            wasted_bytes: group.wasted_bytes(),
            keeper: decision.map(|d| d.keeper.to_string_lossy().into_owned()),
            files: group
                .files()
                .iter()
                .map(|f| f.path.to_string_lossy().into_owned())
                .collect(),
        }
    }
}

/// Summary statistics in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Files enumerated
    pub total_files: usize,
    /// Bytes across enumerated files
    pub total_size: u64,
    /// Files dropped because their size was unique
    pub eliminated_by_size: usize,
    /// Quick fingerprint pass
    pub quick_pass: PassStats,
    /// Full digest pass
    pub full_pass: PassStats,
    /// Confirmed duplicate groups
    pub duplicate_groups: usize,
    /// Duplicate files beyond one per group
    pub duplicate_files: usize,
    /// Reclaimable bytes
    pub reclaimable_space: u64,
    /// Scan wall time in milliseconds
    pub scan_duration_ms: u64,
}

impl From<&ScanSummary> for JsonSummary {
    fn from(summary: &ScanSummary) -> Self {
        Self {
            total_files: summary.total_files,
            total_size: summary.total_size,
            eliminated_by_size: summary.eliminated_by_size,
            quick_pass: summary.quick.clone(),
            full_pass: summary.full.clone(),
            duplicate_groups: summary.duplicate_groups,
            duplicate_files: summary.duplicate_files,
            reclaimable_space: summary.reclaimable_space,
            scan_duration_ms: u64::try_from(summary.scan_duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Outcome of a cleanup action in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonActions {
    /// Counts
    #[serde(flatten)]
    pub summary: ActionSummary,
    /// One record per file
    pub records: Vec<AuditRecord>,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Keeper selection strategy used
    pub strategy: SelectionStrategy,
    /// Whether the scan was cancelled
    pub cancelled: bool,
    /// Duplicate groups, largest waste first
    pub duplicates: Vec<JsonDuplicateGroup>,
    /// Non-fatal scan problems
    pub warnings: Vec<String>,
    /// Scan summary statistics
    pub summary: JsonSummary,
    /// Cleanup results, when an action ran
    pub actions: Option<JsonActions>,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DK000")
    pub exit_code_name: String,
}

impl JsonOutput {
    /// Build the report for a scan and its keeper decisions.
    ///
    /// `decisions` is expected in the same order as `result.groups`, as
    /// returned by [`crate::duplicates::apply_strategy`].
    #[must_use]
    pub fn new(
        result: &ScanResult,
        strategy: SelectionStrategy,
        decisions: &[SelectionDecision],
    ) -> Self {
        let duplicates = result
            .groups
            .iter()
            .enumerate()
            .map(|(i, group)| JsonDuplicateGroup::new(group, decisions.get(i)))
            .collect();

        Self {
            strategy,
            cancelled: result.cancelled,
            duplicates,
            warnings: result.warnings.clone(),
            summary: JsonSummary::from(&result.summary),
            actions: None,
            exit_code: ExitCode::Success.as_i32(),
            exit_code_name: ExitCode::Success.code_prefix().to_string(),
        }
    }

    /// Attach the audit records of a cleanup action.
    #[must_use]
    pub fn with_actions(mut self, records: &[AuditRecord]) -> Self {
        self.actions = Some(JsonActions {
            summary: ActionSummary::from_records(records),
            records: records.to_vec(),
        });
        self
    }

    /// Record the exit code this run will end with.
    #[must_use]
    pub fn with_exit_code(mut self, code: ExitCode) -> Self {
        self.exit_code = code.as_i32();
        self.exit_code_name = code.code_prefix().to_string();
        self
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}
