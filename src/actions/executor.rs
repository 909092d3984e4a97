//! Batch delete and move with per-file audit records.
//!
//! Every file is processed independently: a failure is recorded and the
//! batch carries on. Each record is appended to the audit log before it is
//! handed back, so the log is never behind what the caller sees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::audit::{AuditLog, AuditOperation, AuditRecord};
use super::delete::{delete_file, DeleteMode};
use super::relocate::move_file;
use super::ActionProgressCallback;
use crate::duplicates::SelectionDecision;

/// What to do with the files chosen for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Delete (trash first)
    Delete,
    /// Move into the given directory
    MoveTo(PathBuf),
}

impl ActionKind {
    fn operation(&self) -> AuditOperation {
        match self {
            Self::Delete => AuditOperation::Delete,
            Self::MoveTo(_) => AuditOperation::Move,
        }
    }
}

/// Counts over a batch of audit records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionSummary {
    /// Operations that took effect
    pub succeeded: usize,
    /// Operations that left the file in place
    pub failed: usize,
    /// Bytes deleted or moved
    pub bytes: u64,
}

impl ActionSummary {
    /// Summarize `records`.
    #[must_use]
    pub fn from_records(records: &[AuditRecord]) -> Self {
        records.iter().fold(Self::default(), |mut acc, r| {
            if r.is_success() {
                acc.succeeded += 1;
                acc.bytes += r.bytes;
            } else {
                acc.failed += 1;
            }
            acc
        })
    }

    /// Whether every operation succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// Executes delete and move requests and audits each file.
#[derive(Default)]
pub struct ActionExecutor {
    audit: Option<Arc<AuditLog>>,
    delete_mode: DeleteMode,
    progress: Option<Arc<dyn ActionProgressCallback>>,
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("audit", &self.audit)
            .field("delete_mode", &self.delete_mode)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl ActionExecutor {
    /// Executor with trash deletion, no audit log and no progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every record to `log`.
    #[must_use]
    pub fn with_audit_log(mut self, log: Arc<AuditLog>) -> Self {
        self.audit = Some(log);
        self
    }

    /// Choose trash or permanent deletion.
    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    /// Report per-file progress.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ActionProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Delete each of `paths`.
    ///
    /// `confirm` allows permanent removal (see [`delete_file`]).
    pub fn delete(&self, paths: &[PathBuf], confirm: bool) -> Vec<AuditRecord> {
        let items = paths.iter().map(|p| (p.clone(), None)).collect();
        self.run(items, &ActionKind::Delete, confirm)
    }

    /// Move each of `paths` into `dest_dir`, renaming on collision.
    pub fn move_to(&self, paths: &[PathBuf], dest_dir: &Path) -> Vec<AuditRecord> {
        let items = paths.iter().map(|p| (p.clone(), None)).collect();
        self.run(items, &ActionKind::MoveTo(dest_dir.to_path_buf()), false)
    }

    /// Carry out `kind` on the removals of every decision.
    ///
    /// A decision whose keeper is gone, or whose keeper is also listed for
    /// removal, fails all of its removals without touching them. A removal
    /// that resolves to the keeper's file (through a symlink, say) fails on
    /// its own.
    pub fn apply(
        &self,
        decisions: &[SelectionDecision],
        kind: &ActionKind,
        confirm: bool,
    ) -> Vec<AuditRecord> {
        let mut items = Vec::new();
        for decision in decisions {
            let blocked = Self::check_keeper(decision);
            if let Some(reason) = &blocked {
                log::warn!("Skipping group of {}: {}", decision.keeper.display(), reason);
            }
            let keeper_target = std::fs::canonicalize(&decision.keeper).ok();
            items.extend(decision.removals.iter().map(|p| {
                let reason = blocked
                    .clone()
                    .or_else(|| Self::check_alias(p, keeper_target.as_deref()));
                (p.clone(), reason)
            }));
        }
        self.run(items, kind, confirm)
    }

    fn check_keeper(decision: &SelectionDecision) -> Option<String> {
        if decision.removals.contains(&decision.keeper) {
            return Some(format!(
                "keeper {} is also listed for removal",
                decision.keeper.display()
            ));
        }
        match std::fs::metadata(&decision.keeper) {
            Ok(meta) if meta.is_file() => None,
            Ok(_) => Some(format!("keeper {} is not a regular file", decision.keeper.display())),
            Err(e) => Some(format!("keeper missing: {} ({})", decision.keeper.display(), e)),
        }
    }

    fn check_alias(path: &Path, keeper_target: Option<&Path>) -> Option<String> {
        let keeper_target = keeper_target?;
        let target = std::fs::canonicalize(path).ok()?;
        if target == keeper_target {
            log::warn!(
                "Refusing to touch {}: it is the keeper's file {}",
                path.display(),
                keeper_target.display()
            );
            return Some(format!("same file as keeper ({})", keeper_target.display()));
        }
        None
    }

    fn run(
        &self,
        items: Vec<(PathBuf, Option<String>)>,
        kind: &ActionKind,
        confirm: bool,
    ) -> Vec<AuditRecord> {
        if let Some(progress) = &self.progress {
            progress.on_start(items.len());
        }

        let mut records = Vec::with_capacity(items.len());
        for (index, (path, blocked)) in items.into_iter().enumerate() {
            let record = match blocked {
                Some(reason) => AuditRecord::failed(kind.operation(), path, reason),
                None => self.perform(path, kind, confirm),
            };
            let record = self.log(record);

            if let Some(progress) = &self.progress {
                progress.on_file(index, &record.source, record.is_success());
            }
            records.push(record);
        }

        let summary = ActionSummary::from_records(&records);
        log::info!(
            "Action complete: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        if let Some(progress) = &self.progress {
            progress.on_complete(summary.succeeded, summary.failed);
        }

        records
    }

    fn perform(&self, path: PathBuf, kind: &ActionKind, confirm: bool) -> AuditRecord {
        match kind {
            ActionKind::Delete => match delete_file(&path, self.delete_mode, confirm) {
                Ok((method, size)) => AuditRecord::deleted(path, method, size),
                Err(e) => {
                    log::warn!("Delete failed for {}: {}", path.display(), e);
                    AuditRecord::failed(AuditOperation::Delete, path, e.to_string())
                }
            },
            ActionKind::MoveTo(dest_dir) => {
                let size = std::fs::symlink_metadata(&path).map_or(0, |m| m.len());
                match move_file(&path, dest_dir) {
                    Ok(dest) => AuditRecord::moved(path, dest, size),
                    Err(e) => {
                        log::warn!("Move failed for {}: {}", path.display(), e);
                        AuditRecord::failed(AuditOperation::Move, path, e.to_string())
                    }
                }
            }
        }
    }

    fn log(&self, mut record: AuditRecord) -> AuditRecord {
        let Some(audit) = &self.audit else {
            return record;
        };
        if let Err(e) = audit.append(&record) {
            log::error!(
                "Failed to write audit record for {}: {}",
                record.source.display(),
                e
            );
            let note = format!("audit log write failed: {e}");
            record.error_detail = Some(match record.error_detail.take() {
                Some(detail) => format!("{detail}; {note}"),
                None => note,
            });
        }
        record
    }
}
