//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! The [`Hasher`] computes two kinds of digests:
//!
//! - a **quick fingerprint** over the first and last `sample_size` bytes,
//!   used to cheaply prune files that merely share a size
//! - a **full digest** over the whole file, streamed in fixed-size chunks
//!   so memory use does not depend on file size
//!
//! Files no larger than two samples are read completely for the quick
//! fingerprint, which makes it identical to the full digest for small files.
//!
//! # Example
//!
//! ```no_run
//! use dupekeep::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let quick = hasher.quick_fingerprint(Path::new("a.bin")).unwrap();
//! let full = hasher.full_digest(Path::new("a.bin")).unwrap();
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use super::HashError;

/// 256-bit digest produced by BLAKE3.
pub type Hash = [u8; 32];

/// Default head/tail sample size for the quick fingerprint (8 KiB).
pub const QUICK_SAMPLE_SIZE: usize = 8 * 1024;

/// Chunk size used when streaming a file through the full digest.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Files at or above this size are hashed through a memory map when enabled.
pub const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Stateless file hasher.
///
/// Both digests are pure functions of the file bytes; the struct only
/// carries tuning knobs.
#[derive(Debug, Clone)]
pub struct Hasher {
    sample_size: usize,
    use_mmap: bool,
    mmap_threshold: u64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 8 KiB sample and memory mapping off.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sample_size: QUICK_SAMPLE_SIZE,
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }

    /// Set the head/tail sample size. Clamped to at least one byte.
    #[must_use]
    pub fn with_sample_size(mut self, bytes: usize) -> Self {
        self.sample_size = bytes.max(1);
        self
    }

    /// Enable or disable memory-mapped hashing for large files.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the size at which memory mapping kicks in.
    #[must_use]
    pub fn with_mmap_threshold(mut self, bytes: u64) -> Self {
        self.mmap_threshold = bytes;
        self
    }

    /// The configured head/tail sample size.
    #[must_use]
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Hash the first and last `sample_size` bytes of a file.
    ///
    /// Files of at most `2 * sample_size` bytes are read in full.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn quick_fingerprint(&self, path: &Path) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let sample = self.sample_size as u64;
        let mut hasher = blake3::Hasher::new();

        if len <= sample * 2 {
            let mut content = Vec::with_capacity(len as usize);
            file.read_to_end(&mut content)
                .map_err(|e| HashError::from_io(path, e))?;
            hasher.update(&content);
        } else {
            let mut buffer = vec![0u8; self.sample_size];
            file.read_exact(&mut buffer)
                .map_err(|e| HashError::from_io(path, e))?;
            hasher.update(&buffer);

            file.seek(SeekFrom::Start(len - sample))
                .map_err(|e| HashError::from_io(path, e))?;
            file.read_exact(&mut buffer)
                .map_err(|e| HashError::from_io(path, e))?;
            hasher.update(&buffer);
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash the entire file content.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_digest(&self, path: &Path) -> Result<Hash, HashError> {
        if self.use_mmap {
            let len = std::fs::metadata(path)
                .map_err(|e| HashError::from_io(path, e))?
                .len();
            if len >= self.mmap_threshold {
                log::trace!("Hashing {} via mmap ({} bytes)", path.display(), len);
                let mut hasher = blake3::Hasher::new();
                hasher
                    .update_mmap(path)
                    .map_err(|e| HashError::from_io(path, e))?;
                return Ok(*hasher.finalize().as_bytes());
            }
        }

        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&buffer[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            }
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

/// Render a digest as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a 64-character hex string back into a digest.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}

/// Serialize a digest as a hex string.
pub(crate) fn serialize_hex<S: serde::Serializer>(
    hash: &Hash,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hash_to_hex(hash))
}
