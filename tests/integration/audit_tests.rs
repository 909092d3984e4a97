use dupekeep::actions::{
    apply_action, ActionExecutor, ActionKind, AuditLog, AuditOperation, AuditOutcome, DeleteMode,
};
use dupekeep::duplicates::{apply_strategy, DuplicateFinder, SelectionStrategy};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_move_action_is_audited() {
    let data = tempdir().unwrap();
    let state = tempdir().unwrap();
    let dest = state.path().join("quarantine");
    fs::create_dir(&dest).unwrap();
    for name in ["a.dat", "b.dat", "c.dat"] {
        fs::write(data.path().join(name), [1u8; 300]).unwrap();
    }

    let result = DuplicateFinder::with_defaults()
        .find_duplicates(data.path())
        .unwrap();
    let decisions = apply_strategy(&result.groups, SelectionStrategy::KeepFirstAlphabetical);

    let log_path = state.path().join("audit.jsonl");
    let log = Arc::new(AuditLog::open(&log_path).unwrap());
    let records = apply_action(&decisions, &ActionKind::MoveTo(dest.clone()), false, Some(log));

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.is_success()));

    let logged = AuditLog::read_all(&log_path).unwrap();
    assert_eq!(logged, records);
    assert!(logged.iter().all(|r| r.operation == AuditOperation::Move));
    assert_eq!(fs::read_dir(&dest).unwrap().count(), 2);
}

#[test]
fn test_failures_are_audited_too() {
    let state = tempdir().unwrap();
    let log_path = state.path().join("audit.jsonl");
    let executor = ActionExecutor::new()
        .with_delete_mode(DeleteMode::Permanent)
        .with_audit_log(Arc::new(AuditLog::open(&log_path).unwrap()));

    let missing = state.path().join("never-existed");
    let records = executor.delete(&[missing.clone()], true);

    let logged = AuditLog::read_all(&log_path).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].outcome, AuditOutcome::Failure);
    assert_eq!(logged[0].source, missing);
    assert_eq!(logged[0], records[0]);
}

#[test]
fn test_log_is_append_only_across_sessions() {
    let state = tempdir().unwrap();
    let log_path = state.path().join("audit.jsonl");

    for i in 0..3 {
        let file = state.path().join(format!("victim{i}"));
        fs::write(&file, b"bytes").unwrap();
        let executor = ActionExecutor::new()
            .with_delete_mode(DeleteMode::Permanent)
            .with_audit_log(Arc::new(AuditLog::open(&log_path).unwrap()));
        executor.delete(&[file], true);
    }

    let logged = AuditLog::read_all(&log_path).unwrap();
    assert_eq!(logged.len(), 3);
    assert!(logged.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    let sources: Vec<_> = logged
        .iter()
        .map(|r| r.source.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(sources, vec!["victim0", "victim1", "victim2"]);
}

#[test]
fn test_truncated_line_is_skipped() {
    let state = tempdir().unwrap();
    let log_path = state.path().join("audit.jsonl");
    let file = state.path().join("victim");
    fs::write(&file, b"bytes").unwrap();

    ActionExecutor::new()
        .with_delete_mode(DeleteMode::Permanent)
        .with_audit_log(Arc::new(AuditLog::open(&log_path).unwrap()))
        .delete(&[file], true);

    let mut content = fs::read_to_string(&log_path).unwrap();
    content.push_str("{\"timestamp\":\"2026-");
    fs::write(&log_path, content).unwrap();

    assert_eq!(AuditLog::read_all(&log_path).unwrap().len(), 1);
}

#[test]
fn test_csv_export() {
    let state = tempdir().unwrap();
    let log_path = state.path().join("audit.jsonl");
    let file = state.path().join("gone.txt");
    fs::write(&file, b"twelve bytes").unwrap();

    ActionExecutor::new()
        .with_delete_mode(DeleteMode::Permanent)
        .with_audit_log(Arc::new(AuditLog::open(&log_path).unwrap()))
        .delete(&[file.clone(), state.path().join("missing.txt")], true);

    let records = AuditLog::read_all(&log_path).unwrap();
    let mut out = Vec::new();
    AuditLog::export_csv(&records, &mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(
        lines[0],
        "timestamp,operation,source,destination,method,outcome,bytes,error_detail"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",delete,"));
    assert!(lines[1].contains(",permanent,success,12,"));
    assert!(lines[2].contains(",failure,0,"));
}

#[test]
fn test_missing_log_reads_empty() {
    let state = tempdir().unwrap();
    assert!(AuditLog::read_all(&state.path().join("none.jsonl"))
        .unwrap()
        .is_empty());
}
