use dupekeep::cache::{DigestKind, HashCache};
use dupekeep::duplicates::{DuplicateFinder, FinderConfig};
use filetime::FileTime;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

fn cached_finder(cache: &Arc<HashCache>) -> DuplicateFinder {
    DuplicateFinder::new(FinderConfig::default().with_cache(Arc::clone(cache)))
}

fn populate(root: &Path) {
    for i in 0..4 {
        fs::write(root.join(format!("dup{i}")), [5u8; 20_000]).unwrap();
    }
    fs::write(root.join("other"), [6u8; 20_000]).unwrap();
}

#[test]
fn test_warm_scan_matches_cold_scan() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    populate(dir.path());
    let cache = Arc::new(HashCache::open(&state.path().join("cache/hashes.db"), 1000).unwrap());

    let cold = cached_finder(&cache).find_duplicates(dir.path()).unwrap();
    let warm = cached_finder(&cache).find_duplicates(dir.path()).unwrap();

    assert_eq!(cold.groups, warm.groups);
    assert_eq!(cold.summary.quick.cache_hits, 0);
    assert_eq!(warm.summary.quick.cache_hits, 5);
    assert_eq!(warm.summary.full.cache_hits, 4);
    assert_eq!(warm.summary.full.bytes_hashed, 0);
}

#[test]
fn test_cache_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir(&data).unwrap();
    populate(&data);
    let db = dir.path().join("hashes.db");

    {
        let cache = Arc::new(HashCache::open(&db, 1000).unwrap());
        cached_finder(&cache).find_duplicates(&data).unwrap();
    }

    let cache = Arc::new(HashCache::open(&db, 1000).unwrap());
    assert_eq!(cache.len().unwrap(), 5);
    let warm = cached_finder(&cache).find_duplicates(&data).unwrap();
    assert_eq!(warm.summary.full.cache_misses, 0);
}

#[test]
fn test_modified_file_is_rehashed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("file.bin");
    fs::write(&path, b"original").unwrap();
    let old_time = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&path, old_time).unwrap();

    let cache = HashCache::in_memory(100).unwrap();
    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    cache
        .store(DigestKind::Full, &path, 8, modified, &[1u8; 32])
        .unwrap();
    assert!(cache
        .lookup(DigestKind::Full, &path, 8, modified)
        .unwrap()
        .is_some());

    fs::write(&path, b"replaced").unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    let new_modified = fs::metadata(&path).unwrap().modified().unwrap();

    assert!(cache
        .lookup(DigestKind::Full, &path, 8, new_modified)
        .unwrap()
        .is_none());
    assert!(cache
        .lookup(DigestKind::Full, &path, 9, modified)
        .unwrap()
        .is_none());
}

#[test]
fn test_touched_file_misses_during_scan() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let cache = Arc::new(HashCache::in_memory(1000).unwrap());
    cached_finder(&cache).find_duplicates(dir.path()).unwrap();

    let later = SystemTime::now() + Duration::from_secs(3600);
    filetime::set_file_mtime(dir.path().join("dup0"), FileTime::from_system_time(later)).unwrap();

    let result = cached_finder(&cache).find_duplicates(dir.path()).unwrap();
    assert_eq!(result.summary.quick.cache_hits, 4);
    assert_eq!(result.summary.quick.cache_misses, 1);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 4);
}

#[test]
fn test_lru_eviction_keeps_recently_used() {
    let cache = HashCache::in_memory(3).unwrap();
    let t = SystemTime::UNIX_EPOCH;
    let paths: Vec<PathBuf> = (0..4).map(|i| PathBuf::from(format!("/f{i}"))).collect();

    for path in &paths[..3] {
        cache.store(DigestKind::quick(8192), path, 1, t, &[0u8; 32]).unwrap();
    }
    // Refresh /f0 so /f1 becomes the oldest
    assert!(cache.lookup(DigestKind::quick(8192), &paths[0], 1, t).unwrap().is_some());
    cache.store(DigestKind::quick(8192), &paths[3], 1, t, &[0u8; 32]).unwrap();

    assert_eq!(cache.evict_if_over_capacity().unwrap(), 1);
    assert_eq!(cache.len().unwrap(), 3);
    assert!(cache.get(&paths[1]).unwrap().is_none());
    assert!(cache.get(&paths[0]).unwrap().is_some());
    assert!(cache.get(&paths[3]).unwrap().is_some());
}

#[test]
fn test_scan_evicts_to_capacity() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let cache = Arc::new(HashCache::in_memory(2).unwrap());

    let result = cached_finder(&cache).find_duplicates(dir.path()).unwrap();

    assert_eq!(cache.len().unwrap(), 2);
    assert_eq!(result.summary.cache_evicted, 3);
    assert_eq!(result.groups.len(), 1);
}

#[test]
fn test_deleted_files_are_purged_after_scan() {
    let dir = tempdir().unwrap();
    populate(dir.path());
    let cache = Arc::new(HashCache::in_memory(1000).unwrap());
    let outside = PathBuf::from("/elsewhere/keep-me");
    cache
        .store(DigestKind::quick(8192), &outside, 1, SystemTime::UNIX_EPOCH, &[0u8; 32])
        .unwrap();

    cached_finder(&cache).find_duplicates(dir.path()).unwrap();
    fs::remove_file(dir.path().join("dup3")).unwrap();
    let result = cached_finder(&cache).find_duplicates(dir.path()).unwrap();

    assert_eq!(result.summary.cache_purged, 1);
    assert_eq!(cache.len().unwrap(), 5);
    assert!(cache.get(&outside).unwrap().is_some());
}

#[test]
fn test_purge_stale_and_prune_missing() {
    let dir = tempdir().unwrap();
    let present = dir.path().join("present");
    fs::write(&present, b"x").unwrap();
    let gone = dir.path().join("gone");

    let cache = HashCache::in_memory(100).unwrap();
    let t = SystemTime::UNIX_EPOCH;
    cache.store(DigestKind::Full, &present, 1, t, &[1u8; 32]).unwrap();
    cache.store(DigestKind::Full, &gone, 1, t, &[2u8; 32]).unwrap();

    assert_eq!(cache.prune_missing().unwrap(), 1);
    assert!(cache.get(&gone).unwrap().is_none());

    let keep: HashSet<PathBuf> = HashSet::new();
    assert_eq!(cache.purge_stale(&keep).unwrap(), 1);
    assert!(cache.is_empty().unwrap());
}

#[test]
fn test_quick_and_full_digests_share_a_row() {
    let cache = HashCache::in_memory(100).unwrap();
    let path = Path::new("/shared");
    let t = SystemTime::UNIX_EPOCH;

    cache.store(DigestKind::quick(8192), path, 42, t, &[1u8; 32]).unwrap();
    cache.store(DigestKind::Full, path, 42, t, &[2u8; 32]).unwrap();

    let entry = cache.get(path).unwrap().unwrap();
    assert_eq!(entry.quick, Some([1u8; 32]));
    assert_eq!(entry.full, Some([2u8; 32]));
    assert_eq!(cache.len().unwrap(), 1);

    // New metadata invalidates the other digest
    cache.store(DigestKind::quick(8192), path, 43, t, &[3u8; 32]).unwrap();
    let entry = cache.get(path).unwrap().unwrap();
    assert_eq!(entry.full, None);
}

#[test]
fn test_changed_sample_size_matches_cold_scan() {
    let dir = tempdir().unwrap();
    let state = tempdir().unwrap();
    let content: Vec<u8> = (0..200u8).collect();
    fs::write(dir.path().join("a.bin"), &content).unwrap();
    fs::write(dir.path().join("b.bin"), &content).unwrap();
    let cache = Arc::new(HashCache::open(&state.path().join("hashes.db"), 1000).unwrap());

    let first = DuplicateFinder::new(
        FinderConfig::default()
            .with_cache(Arc::clone(&cache))
            .with_quick_sample_size(16),
    )
    .find_duplicates(dir.path())
    .unwrap();
    assert_eq!(first.groups.len(), 1);

    fs::write(dir.path().join("c.bin"), &content).unwrap();

    let warm = DuplicateFinder::new(
        FinderConfig::default()
            .with_cache(Arc::clone(&cache))
            .with_quick_sample_size(32),
    )
    .find_duplicates(dir.path())
    .unwrap();
    let cold = DuplicateFinder::new(FinderConfig::default().with_quick_sample_size(32))
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(cold.groups.len(), 1);
    assert_eq!(cold.groups[0].len(), 3);
    assert_eq!(warm.groups, cold.groups);
    assert_eq!(warm.summary.quick.cache_hits, 0);
}

#[cfg(target_os = "linux")]
#[test]
fn test_non_utf8_names_never_share_cached_digests() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let x = dir.path().join(OsStr::from_bytes(b"a\xff"));
    let y = dir.path().join(OsStr::from_bytes(b"a\xfe"));
    fs::write(&x, b"content X!").unwrap();
    fs::write(&y, b"content Y!").unwrap();
    let mtime = FileTime::from_unix_time(1_600_000_000, 0);
    filetime::set_file_mtime(&x, mtime).unwrap();
    filetime::set_file_mtime(&y, mtime).unwrap();

    let cache = Arc::new(HashCache::in_memory(100).unwrap());
    let finder = || {
        DuplicateFinder::new(
            FinderConfig::default()
                .with_cache(Arc::clone(&cache))
                .with_io_threads(1),
        )
    };

    let cold = finder().find_duplicates(dir.path()).unwrap();
    assert!(cold.groups.is_empty());
    assert_eq!(cache.len().unwrap(), 2);

    let warm = finder().find_duplicates(dir.path()).unwrap();
    assert!(warm.groups.is_empty());
    assert_eq!(warm.summary.quick.cache_hits, 2);
    assert_eq!(warm.summary.cache_purged, 0);
}
