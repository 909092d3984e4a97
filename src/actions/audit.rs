//! Append-only audit log of delete and move operations.
//!
//! Records are stored as JSON Lines: one serialized [`AuditRecord`] per
//! line, flushed to disk before the append returns. Existing lines are
//! never rewritten. Reading skips lines that fail to parse (a torn final
//! line after a crash, for example) instead of failing.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::delete::DeleteMethod;

/// Errors reading or writing the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file could not be opened, written or read.
    #[error("Audit log I/O error for {path}: {source}")]
    Io {
        /// Log file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// A record could not be serialized.
    #[error("Failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("Failed to export audit log as CSV: {0}")]
    Csv(#[from] csv::Error),

    /// No platform data directory is available for the default log path.
    #[error("Could not determine a data directory for the audit log")]
    NoDataDir,
}

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    /// File removed (trash or permanent)
    Delete,
    /// File relocated to another directory
    Move,
}

/// Whether the operation took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// The file was deleted or moved
    Success,
    /// Nothing changed on disk
    Failure,
}

/// One entry in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// When the operation finished (UTC)
    pub timestamp: DateTime<Utc>,
    /// Delete or move
    pub operation: AuditOperation,
    /// File acted on
    pub source: PathBuf,
    /// Final location for a successful move
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// How a delete was carried out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<DeleteMethod>,
    /// Success or failure
    pub outcome: AuditOutcome,
    /// Failure reason, or a note about the log write itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    /// Size of the file acted on, when known
    #[serde(default)]
    pub bytes: u64,
}

impl AuditRecord {
    /// Successful delete.
    #[must_use]
    pub fn deleted(source: PathBuf, method: DeleteMethod, bytes: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: AuditOperation::Delete,
            source,
            destination: None,
            method: Some(method),
            outcome: AuditOutcome::Success,
            error_detail: None,
            bytes,
        }
    }

    /// Successful move.
    #[must_use]
    pub fn moved(source: PathBuf, destination: PathBuf, bytes: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: AuditOperation::Move,
            source,
            destination: Some(destination),
            method: None,
            outcome: AuditOutcome::Success,
            error_detail: None,
            bytes,
        }
    }

    /// Failed operation.
    #[must_use]
    pub fn failed(operation: AuditOperation, source: PathBuf, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            source,
            destination: None,
            method: None,
            outcome: AuditOutcome::Failure,
            error_detail: Some(detail.into()),
            bytes: 0,
        }
    }

    /// Whether the operation took effect.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == AuditOutcome::Success
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    operation: AuditOperation,
    source: &'a str,
    destination: &'a str,
    method: String,
    outcome: AuditOutcome,
    bytes: u64,
    error_detail: &'a str,
}

/// Durable, append-only audit log backed by a JSON Lines file.
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").field("path", &self.path).finish()
    }
}

impl AuditLog {
    /// Open (or create) the log at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file or its parent directory
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, AuditError> {
        let io_err = |source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        log::debug!("Audit log opened at {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Open the log at its default location in the data directory.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::NoDataDir`] if no data directory exists for
    /// this platform, or any error from [`AuditLog::open`].
    pub fn open_default() -> Result<Self, AuditError> {
        let path = Self::default_path().ok_or(AuditError::NoDataDir)?;
        Self::open(&path)
    }

    /// Default log location (`<data_dir>/audit.jsonl`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        crate::config::data_dir().map(|d| d.join("audit.jsonl"))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `record` and flush it to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line)
            .and_then(|()| file.sync_data())
            .map_err(|source| AuditError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Read every record from the log at `path`, oldest first.
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] if the file exists but cannot be read.
    pub fn read_all(path: &Path) -> Result<Vec<AuditRecord>, AuditError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AuditError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| AuditError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!(
                    "Skipping unreadable audit record at {}:{}: {}",
                    path.display(),
                    number + 1,
                    e
                ),
            }
        }

        Ok(records)
    }

    /// Write `records` as CSV with a header row.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Csv`] if writing fails.
    pub fn export_csv<W: Write>(records: &[AuditRecord], writer: W) -> Result<(), AuditError> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in records {
            let source = record.source.to_string_lossy();
            let destination = record
                .destination
                .as_deref()
                .map(Path::to_string_lossy)
                .unwrap_or_default();
            wtr.serialize(CsvRow {
                timestamp: record.timestamp.to_rfc3339(),
                operation: record.operation,
                source: &source,
                destination: &destination,
                method: record.method.map(|m| m.to_string()).unwrap_or_default(),
                outcome: record.outcome,
                bytes: record.bytes,
                error_detail: record.error_detail.as_deref().unwrap_or(""),
            })?;
        }
        wtr.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}
