// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn owner(pid: u32) -> LockOwner {
    LockOwner {
        pid,
        hostname: "testhost".to_string(),
        instance_id: format!("inst-{pid}"),
        acquired_at_ms: 1_000,
    }
}

#[test]
fn acquire_writes_owner_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".exclusive-lock");

    let lock = ExclusiveLock::acquire(&path, &owner(42)).unwrap();
    assert!(ExclusiveLock::is_held(&path));

    let read = ExclusiveLock::read_owner(&path).unwrap();
    assert_eq!(read.pid, 42);
    assert_eq!(read.instance_id, "inst-42");
    drop(lock);
}

#[test]
fn second_acquire_fails_and_reports_current_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".exclusive-lock");

    let _held = ExclusiveLock::acquire(&path, &owner(1)).unwrap();
    let err = ExclusiveLock::acquire(&path, &owner(2)).unwrap_err();
    match err {
        LockError::Held { owner: Some(current) } => assert_eq!(current.pid, 1),
        other => panic!("expected Held with owner, got {other:?}"),
    }

    // The loser must not have clobbered the holder's identity
    assert_eq!(ExclusiveLock::read_owner(&path).unwrap().pid, 1);
}

#[test]
fn drop_removes_sentinel_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".exclusive-lock");

    {
        let _lock = ExclusiveLock::acquire(&path, &owner(1)).unwrap();
        assert!(path.exists());
    }
    assert!(!ExclusiveLock::is_held(&path));
}

#[test]
fn release_then_reacquire_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".exclusive-lock");

    let first = ExclusiveLock::acquire(&path, &owner(1)).unwrap();
    first.release();
    let second = ExclusiveLock::acquire(&path, &owner(2)).unwrap();
    assert_eq!(ExclusiveLock::read_owner(&path).unwrap().pid, 2);
    drop(second);
}

#[test]
fn read_owner_of_missing_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(ExclusiveLock::read_owner(&dir.path().join("nope")).is_none());
}
