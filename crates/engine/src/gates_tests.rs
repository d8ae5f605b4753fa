// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tokio::sync::mpsc;
use vc_agent::{EventScope, EventSink};
use vc_core::{AgentEvent, SystemClock};

fn gate(name: &str, command: &str) -> GateConfig {
    GateConfig::new(name, command)
}

async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Run gates in a temp workspace; returns (outcome, events).
async fn run_gates(
    gates: Vec<GateConfig>,
    setup: impl FnOnce(&std::path::Path),
    mutate: impl FnOnce(&std::path::Path),
) -> (GatesOutcome, Vec<AgentEvent>) {
    let dir = tempfile::tempdir().unwrap();
    setup(dir.path());

    let runner = GateRunner::new(gates, SystemClock);
    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);

    let baseline = runner.baseline(dir.path(), "head-1", &sink).await;
    mutate(dir.path());
    let outcome = runner
        .run(dir.path(), &baseline, &sink, &tokio_util::sync::CancellationToken::new())
        .await;

    drop(sink);
    (outcome, collect(rx).await)
}

#[test]
fn fingerprint_covers_gates_and_head() {
    let runner = GateRunner::new(vec![gate("build", "true")], SystemClock);
    let a = runner.fingerprint("head-1");
    assert_eq!(a, runner.fingerprint("head-1"));
    assert_ne!(a, runner.fingerprint("head-2"));

    let other = GateRunner::new(vec![gate("build", "false")], SystemClock);
    assert_ne!(a, other.fingerprint("head-1"));
}

#[tokio::test]
async fn all_passing_gates_pass() {
    let (outcome, events) = run_gates(
        vec![gate("build", "true"), gate("test", "true")],
        |_| {},
        |_| {},
    )
    .await;

    assert!(outcome.passed());
    assert_eq!(outcome.failing_gate, None);
    assert!(outcome.reports.iter().all(|r| r.status == GateStatus::Passed));

    let type_list: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert!(type_list.contains(&vc_core::EventType::BaselineCacheMiss));
    assert!(type_list.contains(&vc_core::EventType::QualityGatesStarted));
    assert!(type_list.contains(&vc_core::EventType::QualityGatesProgress));
    assert!(type_list.contains(&vc_core::EventType::QualityGatePass));
    assert!(type_list.contains(&vc_core::EventType::QualityGatesCompleted));
}

#[tokio::test]
async fn regression_fails_and_short_circuits() {
    let (outcome, events) = run_gates(
        vec![
            gate("build", "true"),
            gate("test", "test ! -f BROKEN"),
            gate("lint", "true"),
        ],
        |_| {},
        |path| std::fs::write(path.join("BROKEN"), b"x").unwrap(),
    )
    .await;

    assert!(!outcome.passed());
    assert_eq!(outcome.failing_gate.as_deref(), Some("test"));
    assert_eq!(outcome.reports[1].status, GateStatus::Failed);
    assert!(outcome.reports[1].regressed);
    // Remaining gates are skipped after the first failure
    assert_eq!(outcome.reports[2].status, GateStatus::Skipped);

    let fail_event = events
        .iter()
        .find(|e| e.event_type == vc_core::EventType::QualityGateFail)
        .unwrap();
    assert_eq!(fail_event.data["failing_gate"], "test");
}

#[tokio::test]
async fn baseline_breakage_is_tolerated_as_degraded_mode() {
    // Scenario: baseline test=fail; post-agent lint regresses.
    // Result: failing_gate=lint plus one degraded-mode event for test.
    let (outcome, events) = run_gates(
        vec![
            gate("build", "true"),
            gate("test", "test -f NEVER_EXISTS"),
            gate("lint", "test ! -f LINTBROKEN"),
        ],
        |_| {},
        |path| std::fs::write(path.join("LINTBROKEN"), b"x").unwrap(),
    )
    .await;

    assert!(!outcome.passed());
    assert_eq!(outcome.failing_gate.as_deref(), Some("lint"));

    let test_report = &outcome.reports[1];
    assert_eq!(test_report.status, GateStatus::Failed);
    assert!(!test_report.regressed);
    assert!(test_report.baseline_failed);

    let degraded: Vec<_> = events
        .iter()
        .filter(|e| e.event_type == vc_core::EventType::ExecutorDegradedMode)
        .collect();
    assert_eq!(degraded.len(), 1);
    assert_eq!(degraded[0].data["gate"], "test");
}

#[tokio::test]
async fn baseline_only_failure_still_passes_overall() {
    let (outcome, _) = run_gates(
        vec![gate("test", "test -f NEVER_EXISTS")],
        |_| {},
        |_| {},
    )
    .await;
    assert!(outcome.passed());
    assert_eq!(outcome.failing_gate, None);
}

#[tokio::test]
async fn baseline_cache_hits_on_second_use() {
    let dir = tempfile::tempdir().unwrap();
    let runner = GateRunner::new(vec![gate("build", "true")], SystemClock);
    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);

    runner.baseline(dir.path(), "head-1", &sink).await;
    runner.baseline(dir.path(), "head-1", &sink).await;
    drop(sink);

    let events = collect(rx).await;
    let hits = events
        .iter()
        .filter(|e| e.event_type == vc_core::EventType::BaselineCacheHit)
        .count();
    let misses = events
        .iter()
        .filter(|e| e.event_type == vc_core::EventType::BaselineCacheMiss)
        .count();
    assert_eq!((misses, hits), (1, 1));
}

#[tokio::test]
async fn cancellation_yields_partial_skipped_result() {
    let dir = tempfile::tempdir().unwrap();
    let runner = GateRunner::new(
        vec![gate("slow", "sleep 30"), gate("after", "true")],
        SystemClock,
    );
    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);
    let baseline = Baseline {
        fingerprint: "fp".to_string(),
        results: [("slow".to_string(), true), ("after".to_string(), true)]
            .into_iter()
            .collect(),
    };

    let cancel = tokio_util::sync::CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let outcome = runner.run(dir.path(), &baseline, &sink, &cancel).await;
    drop(sink);
    let events = collect(rx).await;

    assert!(outcome.cancelled);
    assert!(!outcome.passed());
    assert!(outcome.reports.iter().all(|r| r.status == GateStatus::Skipped));
    assert!(events
        .iter()
        .any(|e| e.event_type == vc_core::EventType::QualityGatesSkipped));
}

#[tokio::test]
async fn gate_timeout_counts_as_failure() {
    let mut slow = gate("slow", "sleep 30");
    slow.timeout = std::time::Duration::from_millis(200);
    let dir = tempfile::tempdir().unwrap();

    let runner = GateRunner::new(vec![slow], SystemClock);
    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);
    let baseline = Baseline {
        fingerprint: "fp".to_string(),
        results: [("slow".to_string(), true)].into_iter().collect(),
    };
    let outcome = runner
        .run(dir.path(), &baseline, &sink, &tokio_util::sync::CancellationToken::new())
        .await;
    drop(sink);
    drop(collect(rx).await);

    assert!(!outcome.passed());
    assert_eq!(outcome.failing_gate.as_deref(), Some("slow"));
}
