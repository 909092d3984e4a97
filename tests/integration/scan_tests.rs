use dupekeep::duplicates::{scan, DuplicateFinder, FinderConfig, ScanOptions, ScanState};
use dupekeep::scanner::WalkerConfig;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    File::create(&path).unwrap().write_all(content).unwrap();
    path
}

fn names(paths: impl IntoIterator<Item = PathBuf>) -> Vec<String> {
    let mut names: Vec<String> = paths
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let finder = DuplicateFinder::with_defaults();

    let result = finder.find_duplicates(dir.path()).unwrap();

    assert!(result.groups.is_empty());
    assert!(!result.cancelled);
    assert_eq!(result.summary.total_files, 0);
    assert_eq!(finder.state(), ScanState::Completed);
}

#[test]
fn test_scan_unique_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", b"content a");
    write(dir.path(), "b.txt", b"content bb");
    write(dir.path(), "c.txt", b"content ccc");

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(result.groups.is_empty());
    assert_eq!(result.summary.total_files, 3);
    assert_eq!(result.summary.eliminated_by_size, 3);
    assert_eq!(result.summary.quick.input_files, 0);
}

#[test]
fn test_scan_finds_single_group() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"hello");
    write(dir.path(), "b", b"hello");
    write(dir.path(), "c", b"world");

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    let group = &result.groups[0];
    assert_eq!(names(group.paths()), vec!["a", "b"]);
    assert_eq!(group.size(), 5);
    assert_eq!(group.hash_hex(), blake3::hash(b"hello").to_hex().to_string());
    assert_eq!(result.summary.duplicate_files, 1);
    assert_eq!(result.summary.reclaimable_space, 5);
}

#[test]
fn test_scan_nested_directories() {
    let dir = tempdir().unwrap();
    let content = vec![7u8; 4096];
    write(dir.path(), "top.bin", &content);
    write(dir.path(), "one/mid.bin", &content);
    write(dir.path(), "one/two/three/deep.bin", &content);
    write(dir.path(), "one/two/other.bin", &[8u8; 4096]);

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(
        names(result.groups[0].paths()),
        vec!["deep.bin", "mid.bin", "top.bin"]
    );
    assert_eq!(result.groups[0].wasted_bytes(), 2 * 4096);
}

#[test]
fn test_same_head_and_tail_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    let sample = 4096;
    let mut first = vec![0u8; sample * 4];
    let mut second = first.clone();
    first[sample * 2] = 1;
    second[sample * 2] = 2;
    write(dir.path(), "first.bin", &first);
    write(dir.path(), "second.bin", &second);

    let options = ScanOptions {
        quick_sample_size: sample,
        ..ScanOptions::default()
    };
    let result = scan(dir.path(), &options, |_, _| {}, || false).unwrap();

    assert!(result.groups.is_empty());
    assert_eq!(result.summary.full.input_files, 2);
    assert_eq!(result.summary.full.eliminated, 2);
}

#[test]
fn test_groups_are_disjoint_and_sorted_by_waste() {
    let dir = tempdir().unwrap();
    write(dir.path(), "small1", b"tiny");
    write(dir.path(), "small2", b"tiny");
    write(dir.path(), "big1", &[3u8; 10_000]);
    write(dir.path(), "big2", &[3u8; 10_000]);
    write(dir.path(), "big3", &[3u8; 10_000]);

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(result.groups.len(), 2);
    assert!(result.groups[0].wasted_bytes() >= result.groups[1].wasted_bytes());
    assert_eq!(names(result.groups[0].paths()), vec!["big1", "big2", "big3"]);
    for path in result.groups[0].paths() {
        assert!(!result.groups[1].contains(&path));
    }
}

#[test]
fn test_exclusion_globs() {
    let dir = tempdir().unwrap();
    write(dir.path(), "keep/a.txt", b"same bytes");
    write(dir.path(), "keep/b.txt", b"same bytes");
    write(dir.path(), "skip/c.txt", b"same bytes");
    write(dir.path(), "keep/d.log", b"same bytes");

    let walker = WalkerConfig::new(
        false,
        false,
        None,
        None,
        vec!["skip/".to_string(), "*.log".to_string()],
    );
    let finder = DuplicateFinder::new(FinderConfig::default().with_walker_config(walker));
    let result = finder.find_duplicates(dir.path()).unwrap();

    assert_eq!(result.summary.total_files, 2);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(names(result.groups[0].paths()), vec!["a.txt", "b.txt"]);
}

#[test]
fn test_size_filters() {
    let dir = tempdir().unwrap();
    write(dir.path(), "s1", b"ab");
    write(dir.path(), "s2", b"ab");
    write(dir.path(), "m1", &[1u8; 100]);
    write(dir.path(), "m2", &[1u8; 100]);
    write(dir.path(), "l1", &[2u8; 1000]);
    write(dir.path(), "l2", &[2u8; 1000]);

    let options = ScanOptions {
        min_size: Some(10),
        max_size: Some(500),
        ..ScanOptions::default()
    };
    let result = scan(dir.path(), &options, |_, _| {}, || false).unwrap();

    assert_eq!(result.summary.total_files, 2);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].size(), 100);
}

#[test]
fn test_empty_files_are_ignored() {
    let dir = tempdir().unwrap();
    write(dir.path(), "empty1", b"");
    write(dir.path(), "empty2", b"");

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(result.summary.total_files, 0);
    assert!(result.groups.is_empty());
}

#[test]
fn test_hidden_files_skipped_when_requested() {
    let dir = tempdir().unwrap();
    write(dir.path(), "visible", b"payload");
    write(dir.path(), ".hidden", b"payload");

    let options = ScanOptions {
        skip_hidden: true,
        ..ScanOptions::default()
    };
    let skipped = scan(dir.path(), &options, |_, _| {}, || false).unwrap();
    assert!(skipped.groups.is_empty());

    let included = scan(dir.path(), &ScanOptions::default(), |_, _| {}, || false).unwrap();
    assert_eq!(included.groups.len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_becomes_warning() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"duplicate payload");
    write(dir.path(), "b", b"duplicate payload");
    let locked = write(dir.path(), "c", b"duplicate payload");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read the file anyway
    if File::open(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(names(result.groups[0].paths()), vec!["a", "b"]);
    assert!(!result.warnings.is_empty());
    assert_eq!(result.summary.quick.failed, 1);
}

#[test]
fn test_invalid_roots_are_errors() {
    let dir = tempdir().unwrap();
    let file = write(dir.path(), "plain.txt", b"x");
    let finder = DuplicateFinder::with_defaults();

    assert!(finder.find_duplicates(&dir.path().join("missing")).is_err());
    assert_eq!(finder.state(), ScanState::Failed);

    let err = finder.find_duplicates(&file).unwrap_err();
    assert!(err.to_string().contains("not a directory"));
}

#[test]
fn test_progress_is_monotonic_and_completes() {
    use std::sync::{Arc, Mutex};

    let dir = tempdir().unwrap();
    for i in 0..20 {
        write(dir.path(), &format!("f{i}"), &[(i % 4) as u8; 2048]);
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let result = scan(
        dir.path(),
        &ScanOptions::default(),
        move |percent, _| sink.lock().unwrap().push(percent),
        || false,
    )
    .unwrap();

    assert_eq!(result.groups.len(), 4);
    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(seen.last().copied(), Some(100));
}

#[test]
fn test_repeated_scans_are_identical() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        write(dir.path(), &format!("dir{}/file{i}", i % 3), &[(i % 5) as u8; 3000]);
    }

    let finder = DuplicateFinder::new(FinderConfig::default().with_io_threads(3));
    let first = finder.find_duplicates(dir.path()).unwrap();
    let second = finder.find_duplicates(dir.path()).unwrap();

    assert_eq!(first.groups, second.groups);
}
