//! SQLite-backed hash cache database.
//!
//! One row per absolute path holds the file's size, its modification time
//! in nanoseconds, and either or both digests. A row is only trusted while
//! size and mtime match exactly. Quick fingerprints additionally carry the
//! sample size they were taken with.
//!
//! Paths are keyed on their raw OS encoding (bytes on Unix, UTF-16 code
//! units on Windows), so names that are not valid UTF-8 never collide. Storing a digest under different metadata
//! drops whatever the row held for the old version of the file.
//!
//! Recency is tracked with a monotonic access sequence rather than wall
//! clock time, so eviction order is stable even when many rows are touched
//! within the same clock tick.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::entry::{nanos_to_system_time, system_time_to_nanos, CacheEntry, DigestKind};
use crate::scanner::Hash;

/// Default maximum number of rows kept after a scan.
pub const DEFAULT_CAPACITY: usize = 500_000;

/// Schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 2;

/// Errors raised by the hash cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The underlying SQLite call failed.
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The cache file or its directory could not be prepared.
    #[error("Cache I/O error for {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The on-disk schema was written by an incompatible version.
    #[error("Cache schema version {found} does not match expected {expected}")]
    SchemaMismatch {
        /// Version found on disk
        found: i64,
        /// Version this build writes
        expected: i64,
    },

    /// A previous holder of the connection lock panicked.
    #[error("Cache connection lock poisoned")]
    Poisoned,

    /// No platform data directory could be determined.
    #[error("Could not determine a data directory for the cache")]
    NoDataDir,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Snapshot of cache size and location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of rows
    pub entries: usize,
    /// Row limit enforced by eviction
    pub capacity: usize,
    /// Database file, `None` for in-memory caches
    pub path: Option<PathBuf>,
}

/// Persistent LRU cache of file digests.
///
/// All access goes through one connection behind a mutex, so the cache
/// can be shared across hashing workers via `Arc<HashCache>`.
pub struct HashCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    capacity: usize,
    access_clock: AtomicI64,
}

impl std::fmt::Debug for HashCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashCache")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl HashCache {
    /// Open or create the cache at `path`.
    ///
    /// An unreadable or foreign database is deleted and recreated empty.
    /// A corrupt cache only costs re-hashing, never a failed scan.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the directory cannot be created or a
    /// fresh database cannot be opened after a reset.
    pub fn open(path: &Path, capacity: usize) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        match Self::open_connection(path) {
            Ok(conn) => Self::from_connection(conn, Some(path.to_path_buf()), capacity),
            Err(e) => {
                log::warn!(
                    "Hash cache at {} is unusable ({}); recreating it",
                    path.display(),
                    e
                );
                Self::remove_database_files(path)?;
                let conn = Self::open_connection(path)?;
                Self::from_connection(conn, Some(path.to_path_buf()), capacity)
            }
        }
    }

    /// Open the cache at the platform default location.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NoDataDir`] if no data directory exists.
    pub fn open_default(capacity: usize) -> CacheResult<Self> {
        let path = Self::default_path().ok_or(CacheError::NoDataDir)?;
        Self::open(&path, capacity)
    }

    /// Create a cache that lives only as long as this value.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if SQLite cannot allocate the database.
    pub fn in_memory(capacity: usize) -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Self::from_connection(conn, None, capacity)
    }

    /// Platform default database location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        crate::config::data_dir().map(|dir| dir.join("hashes.db"))
    }

    fn open_connection(path: &Path) -> CacheResult<Connection> {
        let conn = Connection::open(path)?;
        Self::initialize(&conn)?;
        Ok(conn)
    }

    /// Set pragmas, verify the schema version and create tables.
    fn initialize(conn: &Connection) -> CacheResult<()> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version != 0 && version != SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                found: version,
                expected: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS hashes (
                path BLOB PRIMARY KEY,
                size INTEGER NOT NULL,
                mtime_ns INTEGER NOT NULL,
                quick BLOB,
                quick_sample INTEGER,
                full BLOB,
                last_access INTEGER NOT NULL,
                access_seq INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_hashes_access_seq ON hashes(access_seq);",
        )?;

        if version == 0 {
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        }

        // Touch the table so a foreign layout fails here, not mid-scan
        conn.prepare(
            "SELECT path, size, mtime_ns, quick, quick_sample, full, last_access, access_seq
             FROM hashes LIMIT 1",
        )?;

        Ok(())
    }

    fn from_connection(
        conn: Connection,
        path: Option<PathBuf>,
        capacity: usize,
    ) -> CacheResult<Self> {
        let max_seq: i64 =
            conn.query_row("SELECT COALESCE(MAX(access_seq), 0) FROM hashes", [], |row| {
                row.get(0)
            })?;

        log::debug!(
            "Opened hash cache {} (capacity {})",
            path.as_deref()
                .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string()),
            capacity
        );

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            capacity,
            access_clock: AtomicI64::new(max_seq),
        })
    }

    fn remove_database_files(path: &Path) -> CacheResult<()> {
        let mut sidecars = vec![path.to_path_buf()];
        for suffix in ["-wal", "-shm"] {
            let mut name = path.as_os_str().to_owned();
            name.push(suffix);
            sidecars.push(PathBuf::from(name));
        }

        for file in sidecars {
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(CacheError::Io { path: file, source }),
            }
        }
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    fn next_access(&self) -> i64 {
        self.access_clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn now_secs() -> i64 {
        system_time_to_nanos(SystemTime::now()) / 1_000_000_000
    }

    fn path_key(path: &Path) -> Vec<u8> {
        encode_path(path)
    }

    /// Return the cached digest if size and mtime match exactly.
    ///
    /// Quick fingerprints also need the same sample size.
    ///
    /// A hit refreshes the row's recency. A miss leaves the row alone.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn lookup(
        &self,
        kind: DigestKind,
        path: &Path,
        size: u64,
        modified: SystemTime,
    ) -> CacheResult<Option<Hash>> {
        let conn = self.lock()?;
        let key = Self::path_key(path);
        let mtime_ns = system_time_to_nanos(modified);

        let row: Option<(i64, i64, Option<Vec<u8>>, Option<i64>)> = conn
            .query_row(
                &format!(
                    "SELECT size, mtime_ns, {}, quick_sample FROM hashes WHERE path = ?1",
                    kind.column()
                ),
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((stored_size, stored_mtime, blob, stored_sample)) = row else {
            return Ok(None);
        };

        if stored_size != size as i64 || stored_mtime != mtime_ns {
            return Ok(None);
        }
        if let DigestKind::Quick { sample_size } = kind {
            if stored_sample != Some(sample_size as i64) {
                return Ok(None);
            }
        }

        let Some(hash) = blob.and_then(|b| Hash::try_from(b.as_slice()).ok()) else {
            return Ok(None);
        };

        conn.execute(
            "UPDATE hashes SET last_access = ?1, access_seq = ?2 WHERE path = ?3",
            params![Self::now_secs(), self.next_access(), key],
        )?;

        Ok(Some(hash))
    }

    /// Record a digest for `path` at the given size and mtime.
    ///
    /// If the row describes the same metadata, the other digest is kept;
    /// otherwise it is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn store(
        &self,
        kind: DigestKind,
        path: &Path,
        size: u64,
        modified: SystemTime,
        digest: &Hash,
    ) -> CacheResult<()> {
        let conn = self.lock()?;
        let (quick, quick_sample, full): (Option<&[u8]>, Option<i64>, Option<&[u8]>) = match kind {
            DigestKind::Quick { sample_size } => {
                (Some(digest.as_slice()), Some(sample_size as i64), None)
            }
            DigestKind::Full => (None, None, Some(digest.as_slice())),
        };

        conn.execute(
            "INSERT INTO hashes (path, size, mtime_ns, quick, quick_sample, full, last_access, access_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                quick_sample = CASE WHEN excluded.quick IS NULL
                                     AND hashes.size = excluded.size AND hashes.mtime_ns = excluded.mtime_ns
                                    THEN hashes.quick_sample ELSE excluded.quick_sample END,
                quick = CASE WHEN hashes.size = excluded.size AND hashes.mtime_ns = excluded.mtime_ns
                             THEN COALESCE(excluded.quick, hashes.quick) ELSE excluded.quick END,
                full = CASE WHEN hashes.size = excluded.size AND hashes.mtime_ns = excluded.mtime_ns
                            THEN COALESCE(excluded.full, hashes.full) ELSE excluded.full END,
                size = excluded.size,
                mtime_ns = excluded.mtime_ns,
                last_access = excluded.last_access,
                access_seq = excluded.access_seq",
            params![
                Self::path_key(path),
                size as i64,
                system_time_to_nanos(modified),
                quick,
                quick_sample,
                full,
                Self::now_secs(),
                self.next_access(),
            ],
        )?;

        Ok(())
    }

    /// Fetch the full row for a path, without touching its recency.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn get(&self, path: &Path) -> CacheResult<Option<CacheEntry>> {
        let conn = self.lock()?;
        let entry = conn
            .query_row(
                "SELECT size, mtime_ns, quick, quick_sample, full, last_access
                 FROM hashes WHERE path = ?1",
                params![Self::path_key(path)],
                |row| {
                    let quick: Option<Vec<u8>> = row.get(2)?;
                    let quick_sample: Option<i64> = row.get(3)?;
                    let full: Option<Vec<u8>> = row.get(4)?;
                    Ok(CacheEntry {
                        path: path.to_path_buf(),
                        size: row.get::<_, i64>(0)? as u64,
                        modified: nanos_to_system_time(row.get(1)?),
                        quick: quick.and_then(|b| Hash::try_from(b.as_slice()).ok()),
                        quick_sample: quick_sample.map(|n| n as u64),
                        full: full.and_then(|b| Hash::try_from(b.as_slice()).ok()),
                        last_access: nanos_to_system_time(
                            row.get::<_, i64>(5)?.saturating_mul(1_000_000_000),
                        ),
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Delete least-recently-used rows until the row count fits capacity.
    ///
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn evict_if_over_capacity(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM hashes", [], |row| row.get(0))?;
        let excess = count - self.capacity as i64;
        if excess <= 0 {
            return Ok(0);
        }

        let removed = conn.execute(
            "DELETE FROM hashes WHERE path IN (
                SELECT path FROM hashes ORDER BY access_seq ASC LIMIT ?1
            )",
            params![excess],
        )?;

        log::info!(
            "Evicted {} least recently used cache entries (capacity {})",
            removed,
            self.capacity
        );
        Ok(removed)
    }

    /// Remove every row whose path is not in `existing_paths`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn purge_stale(&self, existing_paths: &HashSet<PathBuf>) -> CacheResult<usize> {
        self.purge_stale_matching(existing_paths, |_| true)
    }

    /// Like [`purge_stale`](Self::purge_stale), but only considers rows
    /// located under `root`. Rows elsewhere belong to other scan roots.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn purge_stale_within(
        &self,
        root: &Path,
        existing_paths: &HashSet<PathBuf>,
    ) -> CacheResult<usize> {
        self.purge_stale_matching(existing_paths, |path| path.starts_with(root))
    }

    /// Remove rows whose file no longer exists on disk.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn prune_missing(&self) -> CacheResult<usize> {
        let paths = self.all_paths()?;
        let existing: HashSet<PathBuf> = paths.into_iter().filter(|p| p.exists()).collect();
        self.purge_stale(&existing)
    }

    fn all_paths(&self) -> CacheResult<Vec<PathBuf>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT path FROM hashes")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths.iter().filter_map(|key| decode_path(key)).collect())
    }

    fn purge_stale_matching<F>(&self, existing: &HashSet<PathBuf>, in_scope: F) -> CacheResult<usize>
    where
        F: Fn(&Path) -> bool,
    {
        let stale: Vec<PathBuf> = self
            .all_paths()?
            .into_iter()
            .filter(|p| in_scope(p) && !existing.contains(p))
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM hashes WHERE path = ?1")?;
            for path in &stale {
                removed += stmt.execute(params![Self::path_key(path)])?;
            }
        }
        tx.commit()?;

        log::debug!("Purged {} stale cache entries", removed);
        Ok(removed)
    }

    /// Number of rows in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn len(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM hashes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the cache holds no rows.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Delete every row.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn clear(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM hashes", [])?;
        Ok(removed)
    }

    /// Size and location summary.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] on database failure.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        Ok(CacheStats {
            entries: self.len()?,
            capacity: self.capacity,
            path: self.path.clone(),
        })
    }

    /// Maximum number of rows kept after eviction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Database file location, `None` for in-memory caches.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(unix)]
fn encode_path(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(unix)]
fn decode_path(key: &[u8]) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStrExt;
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(key)))
}

#[cfg(windows)]
fn encode_path(path: &Path) -> Vec<u8> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str()
        .encode_wide()
        .flat_map(u16::to_le_bytes)
        .collect()
}

#[cfg(windows)]
fn decode_path(key: &[u8]) -> Option<PathBuf> {
    use std::os::windows::ffi::OsStringExt;
    if key.len() % 2 != 0 {
        return None;
    }
    let wide: Vec<u16> = key
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Some(PathBuf::from(std::ffi::OsString::from_wide(&wide)))
}

#[cfg(not(any(unix, windows)))]
fn encode_path(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(not(any(unix, windows)))]
fn decode_path(key: &[u8]) -> Option<PathBuf> {
    std::str::from_utf8(key).ok().map(PathBuf::from)
}
