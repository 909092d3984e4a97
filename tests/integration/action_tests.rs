use dupekeep::actions::{
    ActionExecutor, ActionKind, ActionSummary, AuditOperation, DeleteMethod, DeleteMode,
};
use dupekeep::duplicates::{
    apply_strategy, DuplicateFinder, FinderConfig, SelectionDecision, SelectionStrategy,
};
use dupekeep::scanner::WalkerConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(root: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn decision(keeper: PathBuf, removals: Vec<PathBuf>) -> SelectionDecision {
    SelectionDecision {
        group_digest: [0u8; 32],
        keeper,
        removals,
        size: 3,
    }
}

#[test]
fn test_permanent_delete_leaves_keeper() {
    let dir = tempdir().unwrap();
    for name in ["one", "two", "three"] {
        write(dir.path(), name, b"identical content");
    }
    let result = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    let decisions = apply_strategy(&result.groups, SelectionStrategy::KeepFirstAlphabetical);

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(&decisions, &ActionKind::Delete, true);

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.is_success()));
    assert!(records.iter().all(|r| r.method == Some(DeleteMethod::Permanent)));
    assert_eq!(ActionSummary::from_records(&records).bytes, 2 * 17);

    let remaining: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(remaining.len(), 1);
    assert!(dir.path().join("one").exists());
}

#[test]
fn test_permanent_delete_requires_confirmation() {
    let dir = tempdir().unwrap();
    let keeper = write(dir.path(), "keep", b"abc");
    let victim = write(dir.path(), "victim", b"abc");

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(&[decision(keeper, vec![victim.clone()])], &ActionKind::Delete, false);

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(victim.exists());
}

#[test]
fn test_missing_file_fails_without_stopping_batch() {
    let dir = tempdir().unwrap();
    let keeper = write(dir.path(), "keep", b"abc");
    let present = write(dir.path(), "present", b"abc");
    let missing = dir.path().join("missing");

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(
        &[decision(keeper, vec![missing.clone(), present.clone()])],
        &ActionKind::Delete,
        true,
    );

    assert_eq!(records.len(), 2);
    assert!(!records[0].is_success());
    assert!(records[0].error_detail.as_deref().unwrap().contains("not found"));
    assert!(records[1].is_success());
    assert!(!present.exists());
}

#[test]
fn test_missing_keeper_blocks_group() {
    let dir = tempdir().unwrap();
    let keeper = dir.path().join("vanished");
    let copy = write(dir.path(), "copy", b"abc");

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(&[decision(keeper, vec![copy.clone()])], &ActionKind::Delete, true);

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(records[0].error_detail.as_deref().unwrap().contains("keeper missing"));
    assert!(copy.exists());
}

#[test]
fn test_keeper_listed_for_removal_blocks_group() {
    let dir = tempdir().unwrap();
    let keeper = write(dir.path(), "keep", b"abc");
    let copy = write(dir.path(), "copy", b"abc");

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(
        &[decision(keeper.clone(), vec![copy.clone(), keeper.clone()])],
        &ActionKind::Delete,
        true,
    );

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| !r.is_success()));
    assert!(keeper.exists());
    assert!(copy.exists());
}

#[test]
fn test_move_renames_on_collision() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let keeper = write(src.path(), "keep.txt", b"payload");
    let first = write(src.path(), "a/name.txt", b"payload");
    let second = write(src.path(), "b/name.txt", b"payload");
    write(dest.path(), "name.txt", b"already here");

    let records = ActionExecutor::new().apply(
        &[decision(keeper.clone(), vec![first.clone(), second.clone()])],
        &ActionKind::MoveTo(dest.path().to_path_buf()),
        false,
    );

    assert!(records.iter().all(|r| r.is_success()));
    assert!(records.iter().all(|r| r.operation == AuditOperation::Move));
    assert_eq!(records[0].destination, Some(dest.path().join("name_1.txt")));
    assert_eq!(records[1].destination, Some(dest.path().join("name_2.txt")));
    assert_eq!(fs::read(dest.path().join("name.txt")).unwrap(), b"already here");
    assert_eq!(fs::read(dest.path().join("name_2.txt")).unwrap(), b"payload");
    assert!(!first.exists());
    assert!(!second.exists());
    assert!(keeper.exists());
}

#[test]
fn test_move_to_missing_directory_fails() {
    let src = tempdir().unwrap();
    let file = write(src.path(), "file", b"x");

    let records = ActionExecutor::new().move_to(&[file.clone()], &src.path().join("nope"));

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(file.exists());
}

#[cfg(unix)]
#[test]
fn test_removal_resolving_to_keeper_is_refused() {
    let dir = tempdir().unwrap();
    let real = write(dir.path(), "b_real.txt", b"only copy");
    let link = dir.path().join("a_link.txt");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(&[decision(link.clone(), vec![real.clone()])], &ActionKind::Delete, true);

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(records[0].error_detail.as_deref().unwrap().contains("same file as keeper"));
    assert_eq!(fs::read(&link).unwrap(), b"only copy");
}

#[cfg(unix)]
#[test]
fn test_followed_symlink_never_costs_the_real_file() {
    let dir = tempdir().unwrap();
    let real = write(dir.path(), "b_real.txt", b"shared bytes");
    let copy = write(dir.path(), "c_copy.txt", b"shared bytes");
    let link = dir.path().join("a_link.txt");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let config = FinderConfig::default().with_walker_config(WalkerConfig {
        follow_symlinks: true,
        ..Default::default()
    });
    let result = DuplicateFinder::new(config).find_duplicates(dir.path()).unwrap();
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].len(), 2);
    assert!(!result.groups[0].contains(&real));

    let decisions = apply_strategy(&result.groups, SelectionStrategy::KeepFirstAlphabetical);
    assert_eq!(decisions[0].keeper.file_name().unwrap(), "a_link.txt");

    let executor = ActionExecutor::new().with_delete_mode(DeleteMode::Permanent);
    let records = executor.apply(&decisions, &ActionKind::Delete, true);

    assert!(records.iter().all(|r| r.is_success()));
    assert!(!copy.exists());
    assert_eq!(fs::read(&real).unwrap(), b"shared bytes");
    assert_eq!(fs::read(&link).unwrap(), b"shared bytes");
}

#[cfg(unix)]
#[test]
fn test_symlink_is_not_moved() {
    let src = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let keeper = write(src.path(), "keep.txt", b"payload");
    let real = write(src.path(), "elsewhere/real.txt", b"payload");
    let link = src.path().join("link.txt");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let records = ActionExecutor::new().move_to(&[link.clone()], dest.path());

    assert_eq!(records.len(), 1);
    assert!(!records[0].is_success());
    assert!(link.exists());
    assert!(real.exists());
    assert!(keeper.exists());
    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}
