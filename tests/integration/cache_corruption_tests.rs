use dupekeep::cache::{DigestKind, HashCache};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tempfile::tempdir;

fn store_one(cache: &HashCache, path: &Path) {
    cache
        .store(DigestKind::Full, path, 10, SystemTime::UNIX_EPOCH, &[9u8; 32])
        .unwrap();
}

#[test]
fn test_garbage_file_is_replaced() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    fs::write(&db, b"this is definitely not a sqlite database, just some bytes").unwrap();

    let cache = HashCache::open(&db, 100).unwrap();

    assert!(cache.is_empty().unwrap());
    store_one(&cache, Path::new("/data/file"));
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn test_schema_version_mismatch_resets_cache() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");

    {
        let cache = HashCache::open(&db, 100).unwrap();
        store_one(&cache, Path::new("/data/file"));
    }
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
    }

    let cache = HashCache::open(&db, 100).unwrap();
    assert!(cache.is_empty().unwrap());

    let conn = Connection::open(&db).unwrap();
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap();
    assert_ne!(version, 99);
}

#[test]
fn test_foreign_table_layout_resets_cache() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE hashes (id INTEGER PRIMARY KEY, blob BLOB);
             INSERT INTO hashes (blob) VALUES (x'00');",
        )
        .unwrap();
    }

    let cache = HashCache::open(&db, 100).unwrap();

    assert!(cache.is_empty().unwrap());
    store_one(&cache, Path::new("/data/file"));
    assert!(cache.get(Path::new("/data/file")).unwrap().is_some());
}

#[test]
fn test_missing_parent_directory_is_created() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested/deeper/hashes.db");

    let cache = HashCache::open(&db, 100).unwrap();

    assert!(db.exists());
    assert_eq!(cache.path(), Some(db.as_path()));
}

#[cfg(unix)]
#[test]
fn test_unwritable_location_is_an_error() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    fs::write(&blocker, b"file in the way").unwrap();

    assert!(HashCache::open(&blocker.join("hashes.db"), 100).is_err());
}

#[test]
fn test_text_keyed_cache_from_older_release_is_replaced() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("hashes.db");
    {
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE hashes (
                path TEXT PRIMARY KEY, size INTEGER NOT NULL, mtime_ns INTEGER NOT NULL,
                quick BLOB, full BLOB, last_access INTEGER NOT NULL, access_seq INTEGER NOT NULL
             );
             INSERT INTO hashes VALUES ('/data/file', 10, 0, NULL, NULL, 0, 1);
             PRAGMA user_version = 1;",
        )
        .unwrap();
    }

    let cache = HashCache::open(&db, 100).unwrap();
    assert!(cache.is_empty().unwrap());
    store_one(&cache, Path::new("/data/file"));
    assert!(cache.get(Path::new("/data/file")).unwrap().is_some());
}
