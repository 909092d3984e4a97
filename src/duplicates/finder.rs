//! Duplicate finder implementation with multi-pass detection.
//!
//! # Overview
//!
//! This module orchestrates the duplicate detection pipeline:
//! 1. **Enumeration**: walk the root, applying exclusion rules
//! 2. **Pass 1 - Size grouping**: drop files with a unique size
//! 3. **Pass 2 - Quick hash**: fingerprint head + tail, re-bucket
//! 4. **Pass 3 - Full hash**: digest whole contents, confirm groups
//!
//! Passes 2 and 3 run on a fixed-size rayon pool and consult the
//! [`HashCache`] before touching file contents. Results from workers are
//! merged on the calling thread, so buckets are never mutated concurrently.
//!
//! Cancellation is cooperative: the check runs before each file and at
//! every pass boundary. A cancelled scan still returns every group whose
//! members were all fully hashed.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::duplicates::{scan, ScanOptions};
//! use std::path::Path;
//!
//! let result = scan(
//!     Path::new("."),
//!     &ScanOptions::default(),
//!     |percent, phase| println!("{percent:>3}% {phase}"),
//!     || false,
//! )
//! .unwrap();
//!
//! println!("{} duplicate groups", result.groups.len());
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use super::groups::{bucket_by, build_groups, group_by_size, DuplicateGroup, GroupSummary};
use crate::cache::{DigestKind, HashCache};
use crate::progress::{ProgressCallback, ProgressTracker, ScanPhase};
use crate::scanner::{FileRecord, Hash, HashError, Hasher, Walker, WalkerConfig, QUICK_SAMPLE_SIZE};
use crate::signal::{flag_check, CancelCheck};

/// Default number of hashing workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Not started, or reset for reuse
    Idle,
    /// Walking the directory tree
    Enumerating,
    /// Grouping by size
    PassSize,
    /// Quick fingerprint pass
    PassQuick,
    /// Full digest pass
    PassFull,
    /// Finished normally
    Completed,
    /// Stopped on request; partial results are valid
    Cancelled,
    /// Could not start (root path unusable)
    Failed,
}

impl ScanState {
    /// Whether the scan has stopped.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use ScanState::{Cancelled, Completed, Enumerating, Failed, Idle, PassFull, PassQuick, PassSize};

        match (self, next) {
            (Idle, Enumerating)
            | (Enumerating, PassSize)
            | (PassSize, PassQuick)
            | (PassQuick, PassFull)
            | (PassFull, Completed)
            | (Idle | Enumerating, Failed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Enumerating => "enumerating",
            Self::PassSize => "size pass",
            Self::PassQuick => "quick-hash pass",
            Self::PassFull => "full-hash pass",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Configuration for the duplicate finder.
#[derive(Clone)]
pub struct FinderConfig {
    /// Number of worker threads for hashing passes.
    pub io_threads: usize,
    /// Optional hash cache for faster rescans.
    pub cache: Option<Arc<HashCache>>,
    /// Walker configuration for enumeration.
    pub walker_config: WalkerConfig,
    /// Head/tail sample size for the quick fingerprint.
    pub quick_sample_size: usize,
    /// Hash large files through a memory map.
    pub use_mmap: bool,
    /// Optional cancellation check.
    pub cancel_check: Option<CancelCheck>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinderConfig")
            .field("io_threads", &self.io_threads)
            .field("cache", &self.cache.as_ref().map(|_| "<cache>"))
            .field("walker_config", &self.walker_config)
            .field("quick_sample_size", &self.quick_sample_size)
            .field("use_mmap", &self.use_mmap)
            .field("cancel_check", &self.cancel_check.as_ref().map(|_| "<check>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            io_threads: DEFAULT_WORKERS,
            cache: None,
            walker_config: WalkerConfig::default(),
            quick_sample_size: QUICK_SAMPLE_SIZE,
            use_mmap: false,
            cancel_check: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the number of hashing workers (at least one).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set the hash cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<HashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the quick fingerprint sample size.
    #[must_use]
    pub fn with_quick_sample_size(mut self, bytes: usize) -> Self {
        self.quick_sample_size = bytes.max(1);
        self
    }

    /// Enable memory-mapped hashing for large files.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the cancellation check.
    #[must_use]
    pub fn with_cancel_check(mut self, check: CancelCheck) -> Self {
        self.cancel_check = Some(check);
        self
    }

    /// Cancel when `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(self, flag: Arc<AtomicBool>) -> Self {
        self.with_cancel_check(flag_check(flag))
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_check.as_ref().is_some_and(|check| check())
    }
}

/// Options for a one-shot [`scan`] call.
#[derive(Clone)]
pub struct ScanOptions {
    /// Skip files smaller than this
    pub min_size: Option<u64>,
    /// Skip files larger than this
    pub max_size: Option<u64>,
    /// Gitignore-style exclusion globs
    pub excluded_globs: Vec<String>,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Skip dotfiles and dot-directories
    pub skip_hidden: bool,
    /// Hashing worker count
    pub worker_count: usize,
    /// Quick fingerprint sample size
    pub quick_sample_size: usize,
    /// Hash cache to consult and populate
    pub cache: Option<Arc<HashCache>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_size: None,
            max_size: None,
            excluded_globs: Vec::new(),
            follow_symlinks: false,
            skip_hidden: false,
            worker_count: DEFAULT_WORKERS,
            quick_sample_size: QUICK_SAMPLE_SIZE,
            cache: None,
        }
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("excluded_globs", &self.excluded_globs)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("skip_hidden", &self.skip_hidden)
            .field("worker_count", &self.worker_count)
            .field("quick_sample_size", &self.quick_sample_size)
            .field("cache", &self.cache.as_ref().map(|_| "<cache>"))
            .finish()
    }
}

impl ScanOptions {
    /// Exclusion rules for the walker.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::new(
            self.follow_symlinks,
            self.skip_hidden,
            self.min_size,
            self.max_size,
            self.excluded_globs.clone(),
        )
    }

    /// Finder configuration equivalent to these options.
    #[must_use]
    pub fn finder_config(&self) -> FinderConfig {
        let mut config = FinderConfig::default()
            .with_io_threads(self.worker_count)
            .with_quick_sample_size(self.quick_sample_size)
            .with_walker_config(self.walker_config());
        if let Some(cache) = &self.cache {
            config = config.with_cache(Arc::clone(cache));
        }
        config
    }
}

/// Counters for one hashing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Files entering the pass
    pub input_files: usize,
    /// Digests served from the cache
    pub cache_hits: usize,
    /// Digests computed because the cache had none
    pub cache_misses: usize,
    /// Files that could not be read
    pub failed: usize,
    /// Files not processed because of cancellation
    pub skipped: usize,
    /// Files dropped because no other file shared their digest
    pub eliminated: usize,
    /// Bytes read from disk in this pass
    pub bytes_hashed: u64,
}

impl PassStats {
    /// Percentage of input files dropped by this pass.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.input_files == 0 {
            0.0
        } else {
            (self.eliminated as f64 / self.input_files as f64) * 100.0
        }
    }
}

/// Summary statistics from a duplicate scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Files enumerated
    pub total_files: usize,
    /// Bytes across enumerated files
    pub total_size: u64,
    /// Files dropped by size grouping
    pub eliminated_by_size: usize,
    /// Quick-hash pass counters
    pub quick: PassStats,
    /// Full-hash pass counters
    pub full: PassStats,
    /// Confirmed groups
    pub duplicate_groups: usize,
    /// Files in confirmed groups beyond one keeper each
    pub duplicate_files: usize,
    /// Bytes reclaimable by keeping one copy per group
    pub reclaimable_space: u64,
    /// Cache rows purged because their file was not seen
    pub cache_purged: usize,
    /// Cache rows evicted to respect capacity
    pub cache_evicted: usize,
    /// Wall time of the whole scan
    pub scan_duration: Duration,
}

impl ScanSummary {
    /// Percentage of enumerated bytes that are reclaimable.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Reclaimable space as a human-readable string.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        bytesize::ByteSize(self.reclaimable_space).to_string()
    }

    /// Enumerated size as a human-readable string.
    #[must_use]
    pub fn total_size_display(&self) -> String {
        bytesize::ByteSize(self.total_size).to_string()
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    /// Confirmed groups, largest waste first
    pub groups: Vec<DuplicateGroup>,
    /// Non-fatal problems (unreadable files and directories)
    pub warnings: Vec<String>,
    /// Whether the scan stopped early
    pub cancelled: bool,
    /// Counters
    pub summary: ScanSummary,
}

/// Errors that abort a scan before the pipeline starts.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The root path is missing, not a directory, or unreadable.
    #[error("Invalid scan root {path}: {reason}")]
    RootPathInvalid {
        /// Root as given by the caller
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },
}

enum HashOutcome {
    Hashed {
        file: FileRecord,
        digest: Hash,
        cached: bool,
    },
    Failed(HashError),
    Skipped,
}

struct PassOutput {
    buckets: Vec<(Hash, Vec<FileRecord>)>,
    cancelled: bool,
}

/// Duplicate finder that orchestrates the multi-pass pipeline.
///
/// A finder can run any number of scans one after another; each run
/// starts from [`ScanState::Idle`].
///
/// # Example
///
/// ```no_run
/// use dupekeep::duplicates::{DuplicateFinder, FinderConfig};
/// use std::path::Path;
///
/// let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(4));
/// let result = finder.find_duplicates(Path::new("/some/path")).unwrap();
///
/// println!("Found {} duplicate groups", result.summary.duplicate_groups);
/// println!("Reclaimable space: {}", result.summary.reclaimable_display());
/// ```
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
    pool: Option<rayon::ThreadPool>,
    state: Mutex<ScanState>,
}

impl std::fmt::Debug for DuplicateFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateFinder")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl DuplicateFinder {
    /// Create a new duplicate finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let hasher = Hasher::new()
            .with_sample_size(config.quick_sample_size)
            .with_mmap(config.use_mmap);

        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(config.io_threads.max(1))
            .thread_name(|i| format!("dupekeep-hash-{i}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                log::warn!(
                    "Failed to create hashing pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                None
            }
        };

        Self {
            config,
            hasher,
            pool,
            state: Mutex::new(ScanState::Idle),
        }
    }

    /// Create a new duplicate finder with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(FinderConfig::default())
    }

    /// Current pipeline state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: ScanState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(next) {
            log::debug!("Scan state: {} -> {}", *state, next);
        } else {
            log::warn!("Unexpected scan state change: {} -> {}", *state, next);
        }
        *state = next;
    }

    fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = ScanState::Idle;
    }

    fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn validate_root(root: &Path) -> Result<PathBuf, FinderError> {
        let invalid = |reason: String| FinderError::RootPathInvalid {
            path: root.to_path_buf(),
            reason,
        };

        let metadata = std::fs::metadata(root).map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        std::fs::read_dir(root).map_err(|e| invalid(e.to_string()))?;
        std::fs::canonicalize(root).map_err(|e| invalid(e.to_string()))
    }

    /// Find all duplicate files under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::RootPathInvalid`] if the root does not exist,
    /// is not a directory, or cannot be read. Every other problem is
    /// reported in [`ScanResult::warnings`].
    pub fn find_duplicates(&self, root: &Path) -> Result<ScanResult, FinderError> {
        let start_time = Instant::now();
        self.reset();

        let root = match Self::validate_root(root) {
            Ok(root) => root,
            Err(e) => {
                log::error!("{}", e);
                self.transition(ScanState::Failed);
                return Err(e);
            }
        };

        let tracker = ProgressTracker::new(self.config.progress_callback.clone());
        let mut result = ScanResult::default();

        // Enumeration
        self.transition(ScanState::Enumerating);
        tracker.report(ScanPhase::Enumerating, 0, 1);
        log::info!("Scanning {}", root.display());

        let mut walker = Walker::new(&root, self.config.walker_config.clone());
        if let Some(check) = &self.config.cancel_check {
            walker = walker.with_cancel_check(Arc::clone(check));
        }

        let mut files = Vec::new();
        for entry in walker.walk() {
            match entry {
                Ok(file) => files.push(file),
                Err(e) => result.warnings.push(e.to_string()),
            }
        }

        result.summary.total_files = files.len();
        result.summary.total_size = files.iter().map(|f| f.size).sum();
        log::info!(
            "Enumeration complete: {} files ({})",
            files.len(),
            result.summary.total_size_display()
        );

        if self.config.is_cancelled() {
            return Ok(self.finish_cancelled(result, start_time));
        }

        let seen: HashSet<PathBuf> = if self.config.cache.is_some() {
            files.iter().map(|f| f.path.clone()).collect()
        } else {
            HashSet::new()
        };

        // Pass 1: size
        self.transition(ScanState::PassSize);
        let (size_groups, grouping) = group_by_size(files);
        result.summary.eliminated_by_size = grouping.eliminated_unique;
        tracker.report(ScanPhase::SizeGrouping, 1, 1);

        if self.config.is_cancelled() {
            return Ok(self.finish_cancelled(result, start_time));
        }

        // Pass 2: quick fingerprint
        self.transition(ScanState::PassQuick);
        let candidates = size_groups.into_iter().map(|g| g.files).collect();
        let quick = self.hash_pass(
            candidates,
            DigestKind::quick(self.hasher.sample_size()),
            &tracker,
            &mut result.summary.quick,
            &mut result.warnings,
        );
        log::info!(
            "Pass 2 complete: {} files → {} candidates ({:.1}% eliminated, {} cache hits)",
            result.summary.quick.input_files,
            quick.buckets.iter().map(|(_, f)| f.len()).sum::<usize>(),
            result.summary.quick.elimination_rate(),
            result.summary.quick.cache_hits
        );

        if quick.cancelled || self.config.is_cancelled() {
            return Ok(self.finish_cancelled(result, start_time));
        }

        // Pass 3: full digest
        self.transition(ScanState::PassFull);
        let candidates = quick.buckets.into_iter().map(|(_, files)| files).collect();
        let full = self.hash_pass(
            candidates,
            DigestKind::Full,
            &tracker,
            &mut result.summary.full,
            &mut result.warnings,
        );

        result.groups = build_groups(full.buckets);
        let totals = GroupSummary::from_groups(&result.groups);
        result.summary.duplicate_groups = totals.groups;
        result.summary.duplicate_files = totals.files - totals.groups;
        result.summary.reclaimable_space = totals.reclaimable_bytes;
        log::info!(
            "Pass 3 complete: {} duplicate groups, {} reclaimable",
            totals.groups,
            result.summary.reclaimable_display()
        );

        if full.cancelled {
            return Ok(self.finish_cancelled(result, start_time));
        }

        tracker.report(ScanPhase::Done, 1, 1);
        self.maintain_cache(Some((&root, &seen)), &mut result.summary);
        result.summary.scan_duration = start_time.elapsed();
        self.transition(ScanState::Completed);

        Ok(result)
    }

    fn finish_cancelled(&self, mut result: ScanResult, start_time: Instant) -> ScanResult {
        log::info!(
            "Scan cancelled; returning {} finalized groups",
            result.groups.len()
        );
        result.cancelled = true;
        // A partial file set says nothing about which paths are stale
        self.maintain_cache(None, &mut result.summary);
        result.summary.scan_duration = start_time.elapsed();
        self.transition(ScanState::Cancelled);
        result
    }

    fn maintain_cache(&self, seen: Option<(&Path, &HashSet<PathBuf>)>, summary: &mut ScanSummary) {
        let Some(cache) = &self.config.cache else {
            return;
        };

        if let Some((root, seen)) = seen {
            match cache.purge_stale_within(root, seen) {
                Ok(n) => summary.cache_purged = n,
                Err(e) => log::warn!("Failed to purge stale cache entries: {}", e),
            }
        }

        match cache.evict_if_over_capacity() {
            Ok(n) => summary.cache_evicted = n,
            Err(e) => log::warn!("Failed to evict cache entries: {}", e),
        }
    }

    /// Hash every file in `buckets` and split each bucket by digest.
    ///
    /// Buckets with a file skipped due to cancellation are dropped whole,
    /// so a partially hashed bucket never produces a group.
    fn hash_pass(
        &self,
        buckets: Vec<Vec<FileRecord>>,
        kind: DigestKind,
        tracker: &ProgressTracker,
        stats: &mut PassStats,
        warnings: &mut Vec<String>,
    ) -> PassOutput {
        let phase = match kind {
            DigestKind::Quick { .. } => ScanPhase::QuickHash,
            DigestKind::Full => ScanPhase::FullHash,
        };

        let bucket_count = buckets.len();
        let items: Vec<(usize, FileRecord)> = buckets
            .into_iter()
            .enumerate()
            .flat_map(|(i, files)| files.into_iter().map(move |f| (i, f)))
            .collect();
        let total = items.len();
        stats.input_files = total;

        tracker.report(phase, 0, total);
        if total == 0 {
            log::debug!("{}: no files to process", phase);
            return PassOutput {
                buckets: Vec::new(),
                cancelled: false,
            };
        }
        log::info!("{}: hashing {} files", phase, total);

        let done = AtomicUsize::new(0);
        let outcomes: Vec<(usize, HashOutcome)> = self.install(|| {
            items
                .into_par_iter()
                .map(|(idx, file)| {
                    if self.config.is_cancelled() {
                        return (idx, HashOutcome::Skipped);
                    }
                    let outcome = self.hash_file(kind, file);
                    let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                    tracker.report(phase, n, total);
                    (idx, outcome)
                })
                .collect()
        });

        let mut incomplete = vec![false; bucket_count];
        let mut hashed: Vec<Vec<(Hash, FileRecord)>> = (0..bucket_count).map(|_| Vec::new()).collect();

        for (idx, outcome) in outcomes {
            match outcome {
                HashOutcome::Hashed {
                    mut file,
                    digest,
                    cached,
                } => {
                    if cached {
                        stats.cache_hits += 1;
                    } else {
                        if self.config.cache.is_some() {
                            stats.cache_misses += 1;
                        }
                        stats.bytes_hashed += match kind {
                            DigestKind::Quick { .. } => file.size.min(self.hasher.sample_size() as u64 * 2),
                            DigestKind::Full => file.size,
                        };
                    }
                    match kind {
                        DigestKind::Quick { .. } => file.quick_digest = Some(digest),
                        DigestKind::Full => file.full_digest = Some(digest),
                    }
                    hashed[idx].push((digest, file));
                }
                HashOutcome::Failed(error) => {
                    stats.failed += 1;
                    warnings.push(error.to_string());
                }
                HashOutcome::Skipped => {
                    stats.skipped += 1;
                    incomplete[idx] = true;
                }
            }
        }

        let mut output = Vec::new();
        for (idx, files) in hashed.into_iter().enumerate() {
            if incomplete[idx] {
                continue;
            }
            for (digest, members) in bucket_by(files, |(digest, _)| *digest) {
                if members.len() < 2 {
                    stats.eliminated += members.len();
                    continue;
                }
                log::debug!(
                    "{}: {} files share digest {}",
                    phase,
                    members.len(),
                    crate::scanner::hash_to_hex(&digest)
                );
                output.push((digest, members.into_iter().map(|(_, f)| f).collect()));
            }
        }

        let cancelled = incomplete.iter().any(|&skipped| skipped);
        if cancelled {
            log::info!("{}: cancelled after {} of {} files", phase, done.load(Ordering::SeqCst), total);
        }

        PassOutput {
            buckets: output,
            cancelled,
        }
    }

    fn hash_file(&self, kind: DigestKind, file: FileRecord) -> HashOutcome {
        if let Some(cache) = &self.config.cache {
            match cache.lookup(kind, &file.path, file.size, file.modified) {
                Ok(Some(digest)) => {
                    log::trace!("{} cache hit: {}", kind, file.path.display());
                    return HashOutcome::Hashed {
                        file,
                        digest,
                        cached: true,
                    };
                }
                Ok(None) => log::trace!("{} cache miss: {}", kind, file.path.display()),
                Err(e) => log::warn!("Cache lookup failed for {}: {}", file.path.display(), e),
            }
        }

        let computed = match kind {
            DigestKind::Quick { .. } => self.hasher.quick_fingerprint(&file.path),
            DigestKind::Full => self.hasher.full_digest(&file.path),
        };

        match computed {
            Ok(digest) => {
                if let Some(cache) = &self.config.cache {
                    if let Err(e) = cache.store(kind, &file.path, file.size, file.modified, &digest) {
                        log::warn!("Failed to update cache for {}: {}", file.path.display(), e);
                    }
                }
                HashOutcome::Hashed {
                    file,
                    digest,
                    cached: false,
                }
            }
            Err(e) => {
                log::warn!("Failed to hash {}: {}", file.path.display(), e);
                HashOutcome::Failed(e)
            }
        }
    }
}

/// Scan `root` for duplicates in one call.
///
/// `on_progress` receives a non-decreasing percentage and the current
/// phase. `on_cancelled` is polled between files; returning `true` stops
/// the scan and yields the groups finalized so far.
///
/// # Errors
///
/// Returns [`FinderError::RootPathInvalid`] if the root cannot be scanned.
pub fn scan<P, C>(
    root: &Path,
    options: &ScanOptions,
    on_progress: P,
    on_cancelled: C,
) -> Result<ScanResult, FinderError>
where
    P: Fn(u8, ScanPhase) + Send + Sync + 'static,
    C: Fn() -> bool + Send + Sync + 'static,
{
    let config = options
        .finder_config()
        .with_progress_callback(Arc::new(on_progress))
        .with_cancel_check(Arc::new(on_cancelled));
    DuplicateFinder::new(config).find_duplicates(root)
}
