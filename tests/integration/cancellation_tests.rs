use dupekeep::duplicates::{scan, DuplicateFinder, FinderConfig, ScanOptions, ScanState};
use dupekeep::progress::ScanPhase;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn populate(root: &Path) {
    for i in 0..6 {
        fs::write(root.join(format!("a{i}")), [1u8; 1000]).unwrap();
        fs::write(root.join(format!("b{i}")), [2u8; 2000]).unwrap();
    }
}

#[test]
fn test_cancel_before_scan_starts() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag));
    let result = finder.find_duplicates(dir.path()).unwrap();

    assert!(result.cancelled);
    assert!(result.groups.is_empty());
    assert_eq!(finder.state(), ScanState::Cancelled);
}

#[test]
fn test_cancel_after_quick_pass_yields_no_groups() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    let reader = Arc::clone(&flag);

    let result = scan(
        dir.path(),
        &ScanOptions::default(),
        move |percent, phase| {
            if phase == ScanPhase::QuickHash && percent >= 40 {
                setter.store(true, Ordering::SeqCst);
            }
        },
        move || reader.load(Ordering::SeqCst),
    )
    .unwrap();

    assert!(result.cancelled);
    assert!(result.groups.is_empty());
    assert_eq!(result.summary.quick.input_files, 12);
    assert_eq!(result.summary.full.input_files, 0);
}

#[test]
fn test_cancel_during_full_pass_keeps_only_complete_groups() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);
    let reader = Arc::clone(&flag);

    let options = ScanOptions {
        worker_count: 1,
        ..ScanOptions::default()
    };
    let result = scan(
        dir.path(),
        &options,
        move |percent, phase| {
            if phase == ScanPhase::FullHash && percent >= 70 {
                setter.store(true, Ordering::SeqCst);
            }
        },
        move || reader.load(Ordering::SeqCst),
    )
    .unwrap();

    assert!(result.cancelled);
    assert!(result.summary.full.skipped > 0);
    assert!(result.groups.len() <= 1);
    for group in &result.groups {
        // Every returned group is a complete, fully verified set
        assert_eq!(group.len(), 6);
        assert!(group.files().iter().all(|f| f.full_digest.is_some()));
    }
}

#[test]
fn test_finder_is_reusable_after_cancel() {
    let dir = tempdir().unwrap();
    populate(dir.path());

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(Arc::clone(&flag)));
    assert!(finder.find_duplicates(dir.path()).unwrap().cancelled);

    flag.store(false, Ordering::SeqCst);
    let result = finder.find_duplicates(dir.path()).unwrap();

    assert!(!result.cancelled);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(finder.state(), ScanState::Completed);
}
