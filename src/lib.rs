//! dupekeep - duplicate file finder with a persistent hash cache
//!
//! Finds files with identical content using a three-pass pipeline (size,
//! head/tail fingerprint, full BLAKE3 digest), picks one copy per set to
//! keep, and deletes or moves the rest with every operation recorded in an
//! append-only audit log.

pub mod actions;
pub mod cache;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::actions::{ActionExecutor, ActionKind, ActionSummary, AuditLog, AuditRecord, DeleteMode};
use crate::cache::HashCache;
use crate::cli::{AuditArgs, CacheAction, CacheArgs, Cli, Commands, OutputFormat, ScanArgs};
use crate::config::Config;
use crate::duplicates::{apply_strategy, DuplicateFinder, ScanResult};
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::{ActionProgress, Progress};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for invalid roots, unusable audit logs and output
/// failures. Per-file problems are reported through the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref());

    match &cli.command {
        Commands::Scan(args) => run_scan(&cli, config, args),
        Commands::Audit(args) => run_audit(&cli, &config, args),
        Commands::Cache(args) => run_cache(&config, args),
    }
}

fn run_scan(cli: &Cli, mut config: Config, args: &ScanArgs) -> Result<ExitCode> {
    config.merge_scan_args(args);

    if args.permanent && !args.yes {
        bail!("--permanent deletes files irrecoverably; pass --yes to confirm");
    }

    let mut options = config.scan_options();
    if config.cache.enabled {
        options.cache = open_cache(&config);
    }

    let shutdown = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            log::warn!("Ctrl+C handling unavailable: {}", e);
            signal::ShutdownHandler::new()
        }
    };

    let quiet_progress = cli.quiet || args.output == OutputFormat::Json;
    let progress = Arc::new(Progress::new(quiet_progress));
    let finder = DuplicateFinder::new(
        options
            .finder_config()
            .with_progress_callback(progress.clone())
            .with_cancel_check(shutdown.cancel_check()),
    );

    let result = finder
        .find_duplicates(&args.path)
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;
    progress.finish();

    let decisions = apply_strategy(&result.groups, config.strategy);

    let records = if args.has_action() && result.cancelled {
        log::warn!("Scan was interrupted; skipping cleanup");
        None
    } else if args.has_action() {
        Some(run_action(cli, &config, args, &decisions)?)
    } else {
        None
    };

    let code = exit_code_for(&result, records.as_deref());

    match args.output {
        OutputFormat::Json => {
            let mut output = JsonOutput::new(&result, config.strategy, &decisions).with_exit_code(code);
            if let Some(records) = &records {
                output = output.with_actions(records);
            }
            output.write_to(io::stdout().lock())?;
        }
        OutputFormat::Text => {
            if !cli.quiet {
                let color = !cli.no_color;
                let mut stdout = io::stdout().lock();
                TextOutput::new(&result, config.strategy, &decisions)
                    .with_color(color)
                    .write_to(&mut stdout)?;
                if let Some(records) = &records {
                    output::text::write_actions(records, color, &mut stdout)?;
                }
            }
        }
    }

    Ok(code)
}

fn run_action(
    cli: &Cli,
    config: &Config,
    args: &ScanArgs,
    decisions: &[duplicates::SelectionDecision],
) -> Result<Vec<AuditRecord>> {
    let log_path = config
        .audit_log_path()
        .context("Could not determine a location for the audit log; pass --audit-log")?;
    let audit = AuditLog::open(&log_path)
        .with_context(|| format!("Failed to open audit log {}", log_path.display()))?;

    let mode = if args.permanent {
        DeleteMode::Permanent
    } else {
        DeleteMode::Trash
    };
    let quiet = cli.quiet || args.output == OutputFormat::Json;
    let executor = ActionExecutor::new()
        .with_audit_log(Arc::new(audit))
        .with_delete_mode(mode)
        .with_progress(Arc::new(ActionProgress::new(quiet)));

    let kind = match &args.move_to {
        Some(dir) => ActionKind::MoveTo(dir.clone()),
        None => ActionKind::Delete,
    };
    log::info!("Applying {:?} to {} groups", kind, decisions.len());
    Ok(executor.apply(decisions, &kind, args.yes))
}

fn exit_code_for(result: &ScanResult, records: Option<&[AuditRecord]>) -> ExitCode {
    if result.cancelled {
        return ExitCode::Interrupted;
    }
    if let Some(records) = records {
        if !ActionSummary::from_records(records).all_succeeded() {
            return ExitCode::PartialSuccess;
        }
    }
    if !result.warnings.is_empty() {
        ExitCode::PartialSuccess
    } else if result.groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    }
}

fn open_cache(config: &Config) -> Option<Arc<HashCache>> {
    let Some(path) = config.cache.resolved_path() else {
        log::warn!("No data directory available; running without a hash cache");
        return None;
    };
    match HashCache::open(&path, config.cache.capacity) {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            log::warn!("Hash cache unavailable ({}); hashing everything", e);
            None
        }
    }
}

fn run_audit(cli: &Cli, config: &Config, args: &AuditArgs) -> Result<ExitCode> {
    let path = args
        .log
        .clone()
        .or_else(|| config.audit_log_path())
        .context("Could not determine the audit log location; pass --log")?;
    let records = AuditLog::read_all(&path)
        .with_context(|| format!("Failed to read audit log {}", path.display()))?;

    if args.csv {
        AuditLog::export_csv(&records, io::stdout().lock())?;
    } else {
        output::text::write_audit(&records, !cli.no_color, io::stdout().lock())?;
    }
    Ok(ExitCode::Success)
}

fn run_cache(config: &Config, args: &CacheArgs) -> Result<ExitCode> {
    let path = args
        .path
        .clone()
        .or_else(|| config.cache.resolved_path())
        .context("Could not determine the cache location; pass --path")?;
    let cache = HashCache::open(&path, config.cache.capacity)
        .with_context(|| format!("Failed to open hash cache {}", path.display()))?;

    let mut stdout = io::stdout().lock();
    match args.action {
        CacheAction::Stats => output::text::write_cache_stats(&cache.stats()?, &mut stdout)?,
        CacheAction::Clear => {
            let removed = cache.clear()?;
            writeln!(stdout, "Removed {removed} cache entries")?;
        }
        CacheAction::Prune => {
            let removed = cache.prune_missing()?;
            writeln!(stdout, "Pruned {removed} entries for missing files")?;
        }
    }
    Ok(ExitCode::Success)
}
