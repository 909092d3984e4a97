//! Human-readable terminal report.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::actions::{ActionSummary, AuditOutcome, AuditRecord};
use crate::cache::CacheStats;
use crate::duplicates::{ScanResult, SelectionDecision, SelectionStrategy};

/// Plain-text report of a scan and its keeper decisions.
pub struct TextOutput<'a> {
    result: &'a ScanResult,
    strategy: SelectionStrategy,
    decisions: &'a [SelectionDecision],
    color: bool,
}

impl<'a> TextOutput<'a> {
    /// Report for `result`; `decisions` follow the order of its groups.
    #[must_use]
    pub fn new(
        result: &'a ScanResult,
        strategy: SelectionStrategy,
        decisions: &'a [SelectionDecision],
    ) -> Self {
        Self {
            result,
            strategy,
            decisions,
            color: true,
        }
    }

    /// Enable or disable ANSI colors.
    #[must_use]
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Write the full report.
    ///
    /// # Errors
    ///
    /// Returns any error from the writer.
    pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
        let style = Style(self.color);

        if self.result.groups.is_empty() {
            writeln!(w, "No duplicate files found.")?;
        }

        for (i, group) in self.result.groups.iter().enumerate() {
            let keeper = self.decisions.get(i).map(|d| d.keeper.as_path());
            writeln!(
                w,
                "{} {} files, {} each, {} reclaimable",
                style.bold(&format!("Group {}:", i + 1)),
                group.len(),
                ByteSize(group.size()),
                ByteSize(group.wasted_bytes())
            )?;
            for file in group.files() {
                if Some(file.path.as_path()) == keeper {
                    writeln!(w, "  {} {}", style.green("[keep]"), file.path.display())?;
                } else {
                    writeln!(w, "         {}", style.dim(&file.path.display().to_string()))?;
                }
            }
            writeln!(w)?;
        }

        let summary = &self.result.summary;
        writeln!(
            w,
            "Scanned {} files ({}) in {:.2}s",
            summary.total_files,
            ByteSize(summary.total_size),
            summary.scan_duration.as_secs_f64()
        )?;
        writeln!(
            w,
            "{} duplicate groups, {} redundant files, {} reclaimable ({:.1}%)",
            summary.duplicate_groups,
            summary.duplicate_files,
            ByteSize(summary.reclaimable_space),
            summary.wasted_percentage()
        )?;
        if summary.quick.cache_hits + summary.full.cache_hits > 0 {
            writeln!(
                w,
                "Cache hits: {} quick, {} full",
                summary.quick.cache_hits, summary.full.cache_hits
            )?;
        }
        if !self.decisions.is_empty() {
            writeln!(w, "Keeper strategy: {}", self.strategy)?;
        }
        if !self.result.warnings.is_empty() {
            writeln!(
                w,
                "{} {} files or directories could not be read (use -v for details)",
                style.yellow("Warning:"),
                self.result.warnings.len()
            )?;
            for warning in &self.result.warnings {
                log::debug!("{}", warning);
            }
        }
        if self.result.cancelled {
            writeln!(
                w,
                "{} scan was interrupted; results are partial",
                style.yellow("Note:")
            )?;
        }

        Ok(())
    }
}

/// Write one line per action record plus a summary line.
///
/// # Errors
///
/// Returns any error from the writer.
pub fn write_actions<W: Write>(records: &[AuditRecord], color: bool, mut w: W) -> io::Result<()> {
    let style = Style(color);
    for record in records {
        write_record(record, style, &mut w)?;
    }
    let summary = ActionSummary::from_records(records);
    writeln!(
        w,
        "{} succeeded, {} failed, {} freed",
        summary.succeeded,
        summary.failed,
        ByteSize(summary.bytes)
    )
}

/// Write the audit log, oldest first.
///
/// # Errors
///
/// Returns any error from the writer.
pub fn write_audit<W: Write>(records: &[AuditRecord], color: bool, mut w: W) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(w, "Audit log is empty.");
    }
    let style = Style(color);
    for record in records {
        write!(w, "{} ", record.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        write_record(record, style, &mut w)?;
    }
    Ok(())
}

/// Write cache statistics.
///
/// # Errors
///
/// Returns any error from the writer.
pub fn write_cache_stats<W: Write>(stats: &CacheStats, mut w: W) -> io::Result<()> {
    match &stats.path {
        Some(path) => writeln!(w, "Cache: {}", path.display())?,
        None => writeln!(w, "Cache: in memory")?,
    }
    writeln!(w, "Entries: {} / {}", stats.entries, stats.capacity)
}

fn write_record<W: Write>(record: &AuditRecord, style: Style, w: &mut W) -> io::Result<()> {
    let verb = match (&record.destination, record.method) {
        (Some(dest), _) => format!("moved -> {}", dest.display()),
        (None, Some(method)) => format!("deleted ({method})"),
        (None, None) => format!("{:?}", record.operation).to_lowercase(),
    };
    match record.outcome {
        AuditOutcome::Success => writeln!(
            w,
            "{} {} {}",
            style.green("ok"),
            record.source.display(),
            verb
        )?,
        AuditOutcome::Failure => writeln!(
            w,
            "{} {} {}: {}",
            style.red("FAILED"),
            record.source.display(),
            verb,
            record.error_detail.as_deref().unwrap_or("unknown error")
        )?,
    }
    if record.is_success() {
        if let Some(note) = &record.error_detail {
            writeln!(w, "   {} {}", style.yellow("note:"), note)?;
        }
    }
    Ok(())
}

#[derive(Clone, Copy)]
struct Style(bool);

impl Style {
    fn apply(self, s: &str, f: impl FnOnce(&str) -> String) -> String {
        if self.0 {
            f(s)
        } else {
            s.to_string()
        }
    }

    fn bold(self, s: &str) -> String {
        self.apply(s, |s| s.bold().to_string())
    }

    fn dim(self, s: &str) -> String {
        self.apply(s, |s| s.dim().to_string())
    }

    fn green(self, s: &str) -> String {
        self.apply(s, |s| s.green().to_string())
    }

    fn yellow(self, s: &str) -> String {
        self.apply(s, |s| s.yellow().to_string())
    }

    fn red(self, s: &str) -> String {
        self.apply(s, |s| s.red().bold().to_string())
    }
}
