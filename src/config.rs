//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults
//! 2. TOML file (`<config_dir>/config.toml`, or `--config PATH`)
//! 3. Environment variables prefixed `DUPEKEEP_` (`__` separates nested
//!    keys, e.g. `DUPEKEEP_CACHE__CAPACITY`)
//! 4. CLI flags, applied with [`Config::merge_scan_args`]
//!
//! ```toml
//! min_size = 1024
//! exclude = ["*.tmp", "node_modules/"]
//! workers = 8
//! strategy = "keep-newest"
//!
//! [cache]
//! capacity = 1000000
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_CAPACITY;
use crate::cli::ScanArgs;
use crate::duplicates::{ScanOptions, SelectionStrategy, DEFAULT_WORKERS};
use crate::scanner::QUICK_SAMPLE_SIZE;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or has the wrong shape.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Hash cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the persistent cache
    pub enabled: bool,
    /// Database file; the data directory is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Maximum number of cached files
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Configured path, or the default one.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| data_dir().map(|d| d.join("hashes.db")))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ignore files smaller than this many bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// Ignore files larger than this many bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Gitignore-style exclusion patterns
    pub exclude: Vec<String>,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Skip dotfiles and dot-directories
    pub skip_hidden: bool,
    /// Hashing worker count
    pub workers: usize,
    /// Quick fingerprint head/tail sample size in bytes
    pub quick_sample_size: usize,
    /// Keeper selection strategy
    pub strategy: SelectionStrategy,
    /// Hash cache settings
    pub cache: CacheConfig,
    /// Audit log file; the data directory is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_size: None,
            max_size: None,
            exclude: Vec::new(),
            follow_symlinks: false,
            skip_hidden: false,
            workers: DEFAULT_WORKERS,
            quick_sample_size: QUICK_SAMPLE_SIZE,
            strategy: SelectionStrategy::default(),
            cache: CacheConfig::default(),
            audit_log: None,
        }
    }
}

impl Config {
    /// Layered figment: defaults, then the TOML file, then the environment.
    ///
    /// `config_file` replaces the default file location when given.
    #[must_use]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_file.map(Path::to_path_buf).or_else(config_path) {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("DUPEKEEP_").split("__"))
    }

    /// Load configuration, failing on an invalid layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the file or environment holds
    /// values that don't fit the schema.
    pub fn try_load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(config_file).extract()?)
    }

    /// Load configuration, falling back to defaults with a warning.
    #[must_use]
    pub fn load(config_file: Option<&Path>) -> Self {
        match Self::try_load(config_file) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Apply scan flags given on the command line.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        if args.min_size.is_some() {
            self.min_size = args.min_size;
        }
        if args.max_size.is_some() {
            self.max_size = args.max_size;
        }
        self.exclude.extend(args.exclude.iter().cloned());
        self.follow_symlinks |= args.follow_symlinks;
        self.skip_hidden |= args.skip_hidden;
        if let Some(workers) = args.workers {
            self.workers = workers;
        }
        if let Some(sample) = args.quick_sample_size {
            self.quick_sample_size = usize::try_from(sample).unwrap_or(usize::MAX);
        }
        if let Some(strategy) = args.strategy {
            self.strategy = strategy;
        }
        if args.no_cache {
            self.cache.enabled = false;
        }
        if let Some(path) = &args.cache {
            self.cache.path = Some(path.clone());
        }
        if let Some(path) = &args.audit_log {
            self.audit_log = Some(path.clone());
        }
    }

    /// Scan options described by this configuration (without a cache).
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            min_size: self.min_size,
            max_size: self.max_size,
            excluded_globs: self.exclude.clone(),
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            worker_count: self.workers.max(1),
            quick_sample_size: self.quick_sample_size.max(1),
            cache: None,
        }
    }

    /// Configured audit log path, or the default one.
    #[must_use]
    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.audit_log
            .clone()
            .or_else(crate::actions::AuditLog::default_path)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dupekeep")
}

/// Platform data directory (hash cache, audit log).
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

/// Default configuration file location.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}
