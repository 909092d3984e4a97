//! Command-line interface definitions for dupekeep.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Scan flags left unset fall back to the configuration file and environment.
//!
//! # Example
//!
//! ```bash
//! # Report duplicates
//! dupekeep scan ~/Downloads
//!
//! # Keep the newest copy of each file and trash the rest
//! dupekeep scan ~/Downloads --strategy keep-newest --delete --yes
//!
//! # Move duplicates aside instead of deleting them
//! dupekeep scan ~/Photos --move-to ~/dupes
//!
//! # Review what was done
//! dupekeep audit --csv > audit.csv
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::SelectionStrategy;

/// Duplicate file finder with a persistent hash cache and audited cleanup.
#[derive(Debug, Parser)]
#[command(name = "dupekeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory for duplicate files, optionally cleaning them up
    Scan(ScanArgs),
    /// Show the audit log of past delete and move operations
    Audit(AuditArgs),
    /// Inspect or maintain the hash cache
    Cache(CacheArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory path to scan for duplicates
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Gitignore-style pattern to exclude (can be specified multiple times)
    #[arg(short, long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Number of hashing workers (default: 4)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Bytes sampled from each end of a file for the quick fingerprint
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub quick_sample_size: Option<u64>,

    /// Which copy of each duplicate set to keep
    #[arg(short, long, value_name = "STRATEGY", value_parser = parse_strategy)]
    pub strategy: Option<SelectionStrategy>,

    /// Delete every copy except the keeper (to trash by default)
    #[arg(long)]
    pub delete: bool,

    /// Move every copy except the keeper into this directory
    #[arg(long, value_name = "DIR", conflicts_with = "delete")]
    pub move_to: Option<PathBuf>,

    /// Delete permanently instead of moving to trash (requires --yes)
    #[arg(long, requires = "delete")]
    pub permanent: bool,

    /// Confirm permanent deletion, including fallback when the trash is unavailable
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Path to the hash cache database
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Disable hash caching
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,

    /// Path to the audit log
    #[arg(long, value_name = "PATH")]
    pub audit_log: Option<PathBuf>,
}

impl ScanArgs {
    /// Whether a cleanup action was requested.
    #[must_use]
    pub fn has_action(&self) -> bool {
        self.delete || self.move_to.is_some()
    }
}

/// Arguments for the audit subcommand.
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Audit log to read (defaults to the configured log)
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Write the log as CSV to stdout
    #[arg(long)]
    pub csv: bool,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Cache database (defaults to the configured cache)
    #[arg(long, global = true, value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Cache operation
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache maintenance operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show entry count, capacity and location
    Stats,
    /// Remove every entry
    Clear,
    /// Remove entries for files that no longer exist
    Prune,
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

fn parse_strategy(s: &str) -> Result<SelectionStrategy, String> {
    s.parse().map_err(|e: crate::duplicates::UnknownStrategy| e.to_string())
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupekeep::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
