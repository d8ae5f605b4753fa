// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::gates::GateConfig;
use crate::test_helpers::harness;
use std::time::Duration;
use vc_agent::fake;
use vc_core::test_support::open_issue;
use vc_core::{EventType, InstanceId, IssueStatus};
use vc_store::IssueStore;

const INSTANCE: &str = "inst-test";

/// Seed, claim, and run one issue through the pipeline.
async fn run_issue(
    h: &crate::test_helpers::Harness,
    issue_id: &str,
    cancel: &tokio_util::sync::CancellationToken,
) -> ClaimResult {
    let issue = open_issue(issue_id, 1);
    h.store.create_issue(issue.clone()).unwrap();
    h.store
        .claim_issue(&issue.id, &InstanceId::new(INSTANCE))
        .unwrap();

    let runner = vc_agent::AgentRunner::new(vc_core::SystemClock);
    h.deps
        .run_claim(&InstanceId::new(INSTANCE), &issue, &runner, cancel)
        .await
}

fn event_types(h: &crate::test_helpers::Harness, issue_id: &str) -> Vec<EventType> {
    h.store
        .get_agent_events_by_issue(&issue_id.into())
        .unwrap()
        .iter()
        .map(|e| e.event_type)
        .collect()
}

#[tokio::test]
async fn successful_claim_closes_issue_in_order() {
    let agent = fake::emit_lines(
        &["Step 1 of 1", "Modified: src/lib.rs", &fake::result_line(true)],
        0,
    );
    let h = harness(&agent, Vec::new());
    let cancel = tokio_util::sync::CancellationToken::new();

    let result = run_issue(&h, "vc-1", &cancel).await;
    assert!(result.closed);
    assert!(!result.released);

    let issue = h.store.get_issue(&"vc-1".into()).unwrap().unwrap();
    assert!(issue.is_closed());
    assert!(issue.closed_at.is_some());

    let types = event_types(&h, "vc-1");
    // Strict order for the claim's framing events
    assert_eq!(types[0], EventType::IssueClaimed);
    assert_eq!(types[1], EventType::SandboxCreationStarted);
    assert_eq!(types[2], EventType::SandboxCreationCompleted);
    assert!(types.contains(&EventType::AssessmentStarted));
    assert!(types.contains(&EventType::AssessmentCompleted));
    assert!(types.contains(&EventType::AgentSpawned));
    assert!(types.contains(&EventType::AgentCompleted));
    assert!(types.contains(&EventType::AnalysisStarted));
    assert!(types.contains(&EventType::AnalysisCompleted));
    assert!(types.contains(&EventType::ResultsProcessingStarted));
    assert!(types.contains(&EventType::ResultsProcessingCompleted));
    assert_eq!(types[types.len() - 2], EventType::SandboxCleanupStarted);
    assert_eq!(types[types.len() - 1], EventType::SandboxCleanupCompleted);

    // Per-claim persisted timestamps are nondecreasing
    let events = h.store.get_agent_events_by_issue(&"vc-1".into()).unwrap();
    for pair in events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    // Sandbox was created and removed
    assert!(h.git.calls().iter().any(|c| c.starts_with("worktree_add")));
    assert!(h.git.calls().iter().any(|c| c.starts_with("worktree_remove")));
    assert!(!h.deps.sandboxes.path_for(&"vc-1".into()).exists());
}

#[tokio::test]
async fn sandbox_failure_aborts_and_releases() {
    let agent = fake::emit_lines(&[&fake::result_line(true)], 0);
    let h = harness(&agent, Vec::new());
    h.git.fail_worktree_add();

    let result = run_issue(&h, "vc-1", &tokio_util::sync::CancellationToken::new()).await;
    assert!(result.released);
    assert!(!result.closed);

    let issue = h.store.get_issue(&"vc-1".into()).unwrap().unwrap();
    assert_eq!(issue.status, IssueStatus::Open);

    let types = event_types(&h, "vc-1");
    assert!(!types.contains(&EventType::AgentSpawned));
    let events = h.store.get_agent_events_by_issue(&"vc-1".into()).unwrap();
    let creation = events
        .iter()
        .find(|e| e.event_type == EventType::SandboxCreationCompleted)
        .unwrap();
    assert_eq!(creation.data["success"], false);
}

#[tokio::test]
async fn failed_agent_releases_claim() {
    let agent = fake::emit_lines(&["error: it broke"], 1);
    let h = harness(&agent, Vec::new());

    let result = run_issue(&h, "vc-1", &tokio_util::sync::CancellationToken::new()).await;
    assert!(result.released);

    let issue = h.store.get_issue(&"vc-1".into()).unwrap().unwrap();
    assert_eq!(issue.status, IssueStatus::Open);
    assert!(!issue.has_label("interrupted"));

    let exec = h.store.get_execution_state(&"vc-1".into()).unwrap().unwrap();
    assert!(exec.is_pending());
    assert_eq!(exec.executor_instance_id, None);
}

#[tokio::test]
async fn gate_regression_fails_the_claim() {
    // The agent plants a file the test gate forbids
    let agent = fake::ScriptedAgent {
        program: "/bin/sh".to_string(),
        args: vec![
            "-c".to_string(),
            format!("touch BROKEN; printf '%s\\n' '{}'", fake::result_line(true)),
        ],
    };
    let gates = vec![
        GateConfig::new("build", "true"),
        GateConfig::new("test", "test ! -f BROKEN"),
    ];
    let h = harness(&agent, gates);

    let result = run_issue(&h, "vc-1", &tokio_util::sync::CancellationToken::new()).await;
    assert!(result.released);
    assert!(!result.closed);

    let events = h.store.get_agent_events_by_issue(&"vc-1".into()).unwrap();
    let fail = events
        .iter()
        .find(|e| e.event_type == EventType::QualityGateFail)
        .unwrap();
    assert_eq!(fail.data["failing_gate"], "test");
}

#[tokio::test]
async fn interrupt_checkpoints_labels_and_releases() {
    let agent = fake::graceful_on_interrupt();
    let h = harness(&agent, Vec::new());

    let cancel = tokio_util::sync::CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        trigger.cancel();
    });

    let result = run_issue(&h, "vc-1", &cancel).await;
    assert!(result.released);
    assert!(result.interrupted);

    let issue = h.store.get_issue(&"vc-1".into()).unwrap().unwrap();
    assert_eq!(issue.status, IssueStatus::Open);
    assert!(issue.has_label("interrupted"));

    let exec = h.store.get_execution_state(&"vc-1".into()).unwrap().unwrap();
    assert!(exec.is_pending());
    assert!(exec.checkpoint.as_deref().unwrap_or("").contains("working"));
}

#[tokio::test]
async fn discovered_issues_flow_through_dedup() {
    let agent = fake::emit_lines(&[&fake::result_line(true)], 0);
    let h = harness(&agent, Vec::new());
    h.supervisor.discover(vec![vc_agent::CandidateIssue {
        title: "follow-up bug".to_string(),
        description: "found while working".to_string(),
        kind: vc_core::IssueKind::Bug,
    }]);

    let result = run_issue(&h, "vc-1", &tokio_util::sync::CancellationToken::new()).await;
    assert!(result.closed);

    let filed = h.store.get_issue(&"vc-disc-1".into()).unwrap().unwrap();
    assert_eq!(filed.title, "follow-up bug");
    let deps = h.store.get_dependencies(&"vc-disc-1".into()).unwrap();
    assert_eq!(deps[0].kind, vc_core::DependencyKind::DiscoveredFrom);
    assert_eq!(deps[0].depends_on, "vc-1");

    let types = event_types(&h, "vc-1");
    assert!(types.contains(&EventType::DeduplicationBatchStarted));
    assert!(types.contains(&EventType::DeduplicationBatchCompleted));
}

#[tokio::test]
async fn auto_commit_runs_on_success_only_when_enabled() {
    let agent = fake::emit_lines(&[&fake::result_line(true)], 0);
    let mut h = harness(&agent, Vec::new());
    assert!(!h.git.calls().iter().any(|c| c.starts_with("commit_all")));

    // Rebuild deps with auto-commit on
    h.deps.config.enable_auto_commit = true;
    run_issue(&h, "vc-2", &tokio_util::sync::CancellationToken::new()).await;
    assert!(h.git.calls().iter().any(|c| c.starts_with("commit_all")));
    // No PR without the PR flag
    assert!(!h.git.calls().iter().any(|c| c.starts_with("open_pr")));
}

#[tokio::test]
async fn resumed_claim_feeds_checkpoint_to_agent() {
    let agent = fake::echo_stdin();
    let h = harness(&agent, Vec::new());
    let issue = open_issue("vc-1", 1);
    h.store.create_issue(issue.clone()).unwrap();
    h.store
        .save_checkpoint(&issue.id, "Executing: resumed work")
        .unwrap();
    h.store
        .claim_issue(&issue.id, &InstanceId::new(INSTANCE))
        .unwrap();

    let runner = vc_agent::AgentRunner::new(vc_core::SystemClock);
    h.deps
        .run_claim(
            &InstanceId::new(INSTANCE),
            &issue,
            &runner,
            &tokio_util::sync::CancellationToken::new(),
        )
        .await;

    let events = h.store.get_agent_events_by_issue(&"vc-1".into()).unwrap();
    let spawned = events
        .iter()
        .find(|e| e.event_type == EventType::AgentSpawned)
        .unwrap();
    assert_eq!(spawned.data["resumed_from_checkpoint"], true);
    // The echoed checkpoint line was parsed as progress
    assert!(events.iter().any(|e| {
        e.event_type == EventType::Progress
            && e.message.contains("Executing: resumed work")
    }));
}

#[test]
fn brief_includes_populated_sections_only() {
    let mut issue = open_issue("vc-9", 1);
    issue.title = "fix the parser".to_string();
    issue.description = "it breaks on empty input".to_string();
    issue.acceptance_criteria = "no panic on empty input".to_string();

    // Empty sections (design here) are omitted entirely
    let expected = "\
# vc-9: fix the parser

## Description

it breaks on empty input

## Acceptance criteria

no panic on empty input
";
    similar_asserts::assert_eq!(format_brief(&issue), expected);
}
