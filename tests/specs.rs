//! Behavioral specifications for the vc CLI.
//!
//! These tests are black-box: they invoke the `vc` binary and verify stdout,
//! stderr, and exit codes against a temp project directory.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use assert_cmd::Command;
use predicates::str::contains;
use std::path::Path;

fn vc(project: &Path) -> Command {
    let mut cmd = Command::cargo_bin("vc").unwrap();
    cmd.current_dir(project);
    cmd
}

fn init_project(project: &Path) {
    vc(project).arg("init").assert().success();
}

// ── init / doctor ───────────────────────────────────────────────────────────

#[test]
fn init_creates_database_and_feed() {
    let dir = tempfile::tempdir().unwrap();
    vc(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("initialized"));

    assert!(dir.path().join(".beads").is_dir());
    let name = dir.path().file_name().unwrap().to_string_lossy().to_string();
    assert!(dir.path().join(".beads").join(format!("{name}.db")).exists());
    assert!(dir.path().join(".beads/issues.jsonl").exists());
}

#[test]
fn init_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already exists"));
}

#[test]
fn doctor_passes_after_init() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .arg("doctor")
        .assert()
        .success()
        .stdout(contains("all checks passed"));
}

#[test]
fn doctor_without_database_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    vc(dir.path()).arg("doctor").assert().code(2);
}

// ── precondition flags ──────────────────────────────────────────────────────

#[test]
fn execute_rejects_zero_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args(["execute", "--poll-interval", "0"])
        .assert()
        .code(2)
        .stderr(contains("poll interval"));
}

#[test]
fn execute_rejects_auto_pr_without_auto_commit() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args(["execute", "--enable-auto-pr"])
        .assert()
        .code(2)
        .stderr(contains("auto-commit"));
}

#[test]
fn execute_without_database_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    vc(dir.path())
        .arg("execute")
        .assert()
        .code(2)
        .stderr(contains("vc init"));
}

// ── status / stale / activity ───────────────────────────────────────────────

#[test]
fn status_reports_no_executor_on_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("executor: not running"));
}

#[test]
fn stale_reports_nothing_on_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .arg("stale")
        .assert()
        .success()
        .stdout(contains("no stale claims"));
}

#[test]
fn activity_reports_no_events_on_fresh_store() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .arg("activity")
        .assert()
        .success()
        .stdout(contains("no events"));
}

// ── cleanup ─────────────────────────────────────────────────────────────────

#[test]
fn cleanup_events_dry_run_is_not_supported() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args(["cleanup", "events", "--dry-run"])
        .assert()
        .code(2)
        .stderr(contains("not yet supported"));
}

#[test]
fn cleanup_events_reports_deleted_count() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args(["cleanup", "events"])
        .assert()
        .success()
        .stdout(contains("events_deleted=0"));
}

// ── pause / resume ──────────────────────────────────────────────────────────

#[test]
fn pause_without_executor_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args(["pause", "vc-1"])
        .assert()
        .code(2)
        .stderr(contains("no executor is running"));
}

// ── polecat mode ────────────────────────────────────────────────────────────

#[test]
fn polecat_success_emits_json_result_and_exit_zero() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());

    // With `--agent /bin/sh` the brief itself is the script: emit a
    // structured result record and exit cleanly.
    let task = r#"printf '%s\n' '{"type":"result","success":true,"summary":"done"}'"#;
    let output = vc(dir.path())
        .args(["execute", "--polecat-mode", "--agent", "/bin/sh", "--task", task])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["status"], "succeeded");
    assert!(result["duration_ms"].is_u64());
    assert!(result["events"].is_array());
    similar_asserts::assert_eq!(result["errors"], serde_json::json!([]));
}

#[test]
fn polecat_failure_exits_one_with_failed_status() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());

    let output = vc(dir.path())
        .args(["execute", "--polecat-mode", "--agent", "/bin/sh", "--task", "exit 3"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["status"], "failed");
}

#[test]
fn polecat_rejects_task_and_issue_together() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());
    vc(dir.path())
        .args([
            "execute",
            "--polecat-mode",
            "--task",
            "x",
            "--issue",
            "vc-1",
        ])
        .assert()
        .code(2)
        .stderr(contains("not both"));
}

#[test]
fn polecat_events_capture_parsed_output() {
    let dir = tempfile::tempdir().unwrap();
    init_project(dir.path());

    let task = r#"printf 'Step 1 of 2\n'; printf 'Modified: src/x.rs\n'; printf '%s\n' '{"type":"result","success":true}'"#;
    let output = vc(dir.path())
        .args(["execute", "--polecat-mode", "--agent", "/bin/sh", "--task", task])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let result: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let events = result["events"].as_array().unwrap();
    let types: Vec<&str> = events
        .iter()
        .filter_map(|e| e["type"].as_str())
        .collect();
    assert!(types.contains(&"agent_spawned"));
    assert!(types.contains(&"progress"));
    assert!(types.contains(&"file_modified"));
    assert!(types.contains(&"agent_completed"));
    similar_asserts::assert_eq!(
        result["files_changed"],
        serde_json::json!(["src/x.rs"])
    );
}

