// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::AgentConfig;
use std::sync::Arc;
use std::time::Duration;
use vc_agent::fake;
use vc_core::test_support::IssueBuilder;
use vc_core::SystemClock;
use vc_store::{EmbeddedStore, IssueStore, StorePaths};

fn deps(agent: &fake::ScriptedAgent, dir: &tempfile::TempDir) -> PolecatDeps<SystemClock> {
    let mut agent_config = AgentConfig {
        program: agent.program.clone(),
        args: agent.args.clone(),
        ..AgentConfig::default()
    };
    agent_config.timeout = Duration::from_secs(10);
    agent_config.kill_grace = Duration::from_millis(500);

    PolecatDeps {
        store: None,
        agent: agent_config,
        gates: Vec::new(),
        workspace: dir.path().to_path_buf(),
        clock: SystemClock,
    }
}

#[tokio::test]
async fn text_task_success_produces_result_json() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::emit_lines(
        &["Modified: src/fix.rs", &fake::result_line(true)],
        0,
    );
    let result = run_polecat(&deps(&agent, &dir), PolecatTask::Text("fix it".into())).await;

    assert!(result.success);
    assert_eq!(result.status, "succeeded");
    assert_eq!(result.exit_code(), 0);
    assert_eq!(result.files_changed, vec!["src/fix.rs"]);
    assert!(result.errors.is_empty());
    assert!(!result.events.is_empty());

    // The result serializes with snake_case fields
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "succeeded");
    assert!(json["duration_ms"].is_u64());
    assert!(json["events"].is_array());
}

#[tokio::test]
async fn failing_agent_yields_failed_status_and_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::emit_lines(&["error: nope"], 2);
    let result = run_polecat(&deps(&agent, &dir), PolecatTask::Text("fix it".into())).await;

    assert!(!result.success);
    assert_eq!(result.status, "failed");
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn timeout_yields_timeout_status() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::graceful_on_interrupt();
    let mut polecat_deps = deps(&agent, &dir);
    polecat_deps.agent.timeout = Duration::from_millis(300);

    let result = run_polecat(&polecat_deps, PolecatTask::Text("slow".into())).await;
    assert!(!result.success);
    assert_eq!(result.status, "timeout");
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn empty_task_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::emit_lines(&[], 0);
    let result = run_polecat(&deps(&agent, &dir), PolecatTask::Text("  ".into())).await;
    assert!(!result.success);
    assert_eq!(result.errors, vec!["empty task"]);
}

#[tokio::test]
async fn issue_task_formats_brief_from_store() {
    let dir = tempfile::tempdir().unwrap();
    let store_dir = tempfile::tempdir().unwrap();
    let paths = StorePaths::for_database(&store_dir.path().join("t.db"));
    let store = Arc::new(EmbeddedStore::open(paths).unwrap());
    store
        .create_issue(
            IssueBuilder::new("vc-5")
                .title("fix the widget")
                .description("Processing: widget details")
                .build(),
        )
        .unwrap();

    let agent = fake::echo_stdin();
    let mut polecat_deps = deps(&agent, &dir);
    polecat_deps.store = Some(store as Arc<dyn IssueStore>);

    let result = run_polecat(
        &polecat_deps,
        PolecatTask::Issue(vc_core::IssueId::new("vc-5")),
    )
    .await;
    assert!(result.success);
    // The echoed brief contains the description, parsed as a progress event
    assert!(result
        .events
        .iter()
        .any(|e| e.message.contains("Processing: widget details")));
}

#[tokio::test]
async fn missing_issue_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::emit_lines(&[], 0);
    let result = run_polecat(
        &deps(&agent, &dir),
        PolecatTask::Issue(vc_core::IssueId::new("ghost")),
    )
    .await;
    assert!(!result.success);
    assert!(result.errors[0].contains("no store"));
}

#[tokio::test]
async fn gate_regression_fails_polecat_run() {
    let dir = tempfile::tempdir().unwrap();
    let agent = fake::ScriptedAgent {
        program: "/bin/sh".to_string(),
        args: vec![
            "-c".to_string(),
            format!("touch BROKEN; printf '%s\\n' '{}'", fake::result_line(true)),
        ],
    };
    let mut polecat_deps = deps(&agent, &dir);
    polecat_deps.gates = vec![crate::gates::GateConfig::new("test", "test ! -f BROKEN")];

    let result = run_polecat(&polecat_deps, PolecatTask::Text("break it".into())).await;
    assert!(!result.success);
    assert_eq!(result.status, "failed");
    assert!(result.errors.iter().any(|e| e.contains("gate regression")));
}
