//! Progress reporting for scans and cleanup actions.
//!
//! The scan pipeline reports a single overall percentage together with the
//! phase it is in. Each phase owns a fixed band of the range:
//!
//! | Phase        | Band      |
//! |--------------|-----------|
//! | enumerating  | 0         |
//! | size         | 0 - 10    |
//! | quick-hash   | 10 - 40   |
//! | full-hash    | 40 - 100  |
//!
//! Percentages delivered to a [`ProgressCallback`] never decrease within a
//! scan, even though hashing workers finish out of order.
//!
//! [`Progress`] renders the same stream with indicatif for terminal use.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::actions::ActionProgressCallback;

/// Pipeline phase attached to every progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    /// Walking the directory tree
    Enumerating,
    /// Grouping candidates by size
    SizeGrouping,
    /// Computing head + tail fingerprints
    QuickHash,
    /// Computing full-content digests
    FullHash,
    /// Scan finished
    Done,
}

impl ScanPhase {
    /// Short machine-friendly name.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Enumerating => "enumerating",
            Self::SizeGrouping => "size",
            Self::QuickHash => "quick-hash",
            Self::FullHash => "full-hash",
            Self::Done => "done",
        }
    }

    /// Start of this phase's band and its width, in percent.
    fn band(self) -> (u8, u8) {
        match self {
            Self::Enumerating => (0, 0),
            Self::SizeGrouping => (0, 10),
            Self::QuickHash => (10, 30),
            Self::FullHash => (40, 60),
            Self::Done => (100, 0),
        }
    }

    /// Overall percentage after `done` of `total` items in this phase.
    ///
    /// An empty phase counts as finished.
    #[must_use]
    pub fn percent(self, done: usize, total: usize) -> u8 {
        let (start, width) = self.band();
        let within = if total == 0 {
            u64::from(width)
        } else {
            (u64::from(width) * done.min(total) as u64) / total as u64
        };
        (u64::from(start) + within).min(100) as u8
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receiver for scan progress.
///
/// Implemented for any `Fn(u8, ScanPhase) + Send + Sync` closure.
pub trait ProgressCallback: Send + Sync {
    /// Called with the overall percentage (0-100) and the current phase.
    fn on_progress(&self, percent: u8, phase: ScanPhase);
}

impl<F> ProgressCallback for F
where
    F: Fn(u8, ScanPhase) + Send + Sync,
{
    fn on_progress(&self, percent: u8, phase: ScanPhase) {
        self(percent, phase);
    }
}

/// Serializes progress delivery and clamps it to be non-decreasing.
pub(crate) struct ProgressTracker {
    callback: Option<Arc<dyn ProgressCallback>>,
    last: Mutex<u8>,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Option<Arc<dyn ProgressCallback>>) -> Self {
        Self {
            callback,
            last: Mutex::new(0),
        }
    }

    /// Report `done` of `total` items finished in `phase`.
    pub(crate) fn report(&self, phase: ScanPhase, done: usize, total: usize) {
        let Some(callback) = &self.callback else {
            return;
        };
        let Ok(mut last) = self.last.lock() else {
            return;
        };

        let percent = phase.percent(done, total).max(*last);
        *last = percent;
        // Delivered under the lock so observers see updates in order
        callback.on_progress(percent, phase);
    }
}

/// Terminal progress bar driven by the scan percentage.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupekeep::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    /// Clear the bar from the terminal.
    pub fn finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_progress(&self, percent: u8, phase: ScanPhase) {
        if self.quiet {
            return;
        }
        let Ok(mut bar) = self.bar.lock() else {
            return;
        };

        let pb = bar.get_or_insert_with(|| {
            let pb = ProgressBar::new(100);
            pb.set_style(Self::style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        pb.set_position(u64::from(percent));
        pb.set_message(phase_message(phase));

        if phase == ScanPhase::Done {
            pb.finish_and_clear();
            *bar = None;
        }
    }
}

fn phase_message(phase: ScanPhase) -> &'static str {
    match phase {
        ScanPhase::Enumerating => "Walking directory",
        ScanPhase::SizeGrouping => "Grouping by size",
        ScanPhase::QuickHash => "Quick hashing",
        ScanPhase::FullHash => "Full hashing",
        ScanPhase::Done => "Done",
    }
}

/// Terminal progress bar for delete and move actions.
pub struct ActionProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl ActionProgress {
    /// Create a new action progress reporter.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(bar) = self.bar.lock() {
            if let Some(pb) = bar.as_ref() {
                f(pb);
            }
        }
    }
}

impl ActionProgressCallback for ActionProgress {
    fn on_start(&self, total: usize) {
        if self.quiet {
            return;
        }
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█>-"),
        );
        if let Ok(mut bar) = self.bar.lock() {
            *bar = Some(pb);
        }
    }

    fn on_file(&self, index: usize, path: &std::path::Path, _success: bool) {
        let name = truncate_path(&path.to_string_lossy(), 40);
        self.with_bar(|pb| {
            pb.set_position(index as u64 + 1);
            pb.set_message(name);
        });
    }

    fn on_complete(&self, _succeeded: usize, _failed: usize) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.finish_and_clear();
            }
        }
    }
}

/// Truncate a path for display in a progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count + 4 > max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
