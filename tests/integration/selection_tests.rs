use dupekeep::duplicates::{apply_strategy, select, DuplicateFinder, SelectionStrategy};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_aged(root: &Path, name: &str, unix_secs: i64) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, [4u8; 512]).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn test_strategies_on_real_scan() {
    let dir = tempdir().unwrap();
    write_aged(dir.path(), "zeta.bin", 1_500_000_000);
    write_aged(dir.path(), "nested/deeper/alpha.bin", 1_700_000_000);
    write_aged(dir.path(), "nested/mid.bin", 1_600_000_000);

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    assert_eq!(result.groups.len(), 1);

    let keeper = |strategy| {
        let decisions = apply_strategy(&result.groups, strategy);
        file_name(&decisions[0].keeper)
    };

    assert_eq!(keeper(SelectionStrategy::KeepOldest), "zeta.bin");
    assert_eq!(keeper(SelectionStrategy::KeepNewest), "alpha.bin");
    assert_eq!(keeper(SelectionStrategy::KeepShortestPath), "zeta.bin");
    assert_eq!(keeper(SelectionStrategy::KeepFirstAlphabetical), "alpha.bin");
}

#[test]
fn test_every_strategy_partitions_the_group() {
    let dir = tempdir().unwrap();
    for (i, name) in ["a", "b/c", "d/e/f", "g"].iter().enumerate() {
        write_aged(dir.path(), name, 1_600_000_000 + i as i64);
    }
    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    for strategy in SelectionStrategy::ALL {
        let decisions = apply_strategy(&result.groups, strategy);
        assert_eq!(decisions.len(), 1);
        let decision = &decisions[0];

        assert!(result.groups[0].contains(&decision.keeper));
        assert!(!decision.removals.contains(&decision.keeper));
        assert_eq!(decision.removals.len(), 3);
        assert_eq!(decision.reclaimable_bytes(), 3 * 512);
    }
}

#[test]
fn test_equal_mtimes_break_ties_deterministically() {
    let dir = tempdir().unwrap();
    write_aged(dir.path(), "long/path/copy.bin", 1_600_000_000);
    write_aged(dir.path(), "copy.bin", 1_600_000_000);

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let first = apply_strategy(&result.groups, SelectionStrategy::KeepOldest);
    let second = apply_strategy(&result.groups, SelectionStrategy::KeepOldest);

    assert_eq!(first, second);
    assert_eq!(first[0].keeper, dir.path().canonicalize().unwrap().join("copy.bin"));
}

#[test]
fn test_select_by_name() {
    let dir = tempdir().unwrap();
    write_aged(dir.path(), "old", 1_000_000_000);
    write_aged(dir.path(), "new", 1_900_000_000);
    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    let decisions = select(&result.groups, "keep-newest").unwrap();
    assert_eq!(file_name(&decisions[0].keeper), "new");

    let err = select(&result.groups, "keep-biggest").unwrap_err();
    assert!(err.to_string().contains("keep-biggest"));
}
