// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::fake;
use crate::sink::{EventScope, EventSink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vc_core::{AgentEvent, EventType, SystemClock};

/// Collect sink output into a vec (stand-in for the store writer).
fn collector(
    mut rx: mpsc::Receiver<AgentEvent>,
) -> (Arc<Mutex<Vec<AgentEvent>>>, tokio::task::JoinHandle<()>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink_events.lock().push(event);
        }
    });
    (events, handle)
}

async fn run_agent(
    agent: &fake::ScriptedAgent,
    tweak: impl FnOnce(&mut AgentInvocation),
    cancel: CancellationToken,
) -> (AgentOutcome, Vec<AgentEvent>) {
    let dir = tempfile::tempdir().unwrap();
    let mut invocation = fake::invocation(agent, dir.path());
    tweak(&mut invocation);

    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);
    let (events, collect_task) = collector(rx);

    let runner = AgentRunner::default();
    let outcome = runner.run(invocation, &sink, &cancel).await.unwrap();

    drop(sink);
    collect_task.await.unwrap();
    let events = events.lock().clone();
    (outcome, events)
}

fn types(events: &[AgentEvent]) -> Vec<EventType> {
    events.iter().map(|e| e.event_type).collect()
}

#[tokio::test]
async fn successful_run_emits_spawned_events_and_completed() {
    let agent = fake::emit_lines(
        &[
            "Step 1 of 2",
            r#"{"type":"tool_use","tool":"Edit","input":{"file_path":"src/a.rs"}}"#,
            "Modified: src/a.rs",
            &fake::result_line(true),
        ],
        0,
    );
    let (outcome, events) = run_agent(&agent, |_| {}, CancellationToken::new()).await;

    assert!(outcome.success);
    assert_eq!(outcome.exit_code, Some(0));
    assert!(!outcome.timed_out && !outcome.interrupted && !outcome.killed);
    assert!(outcome.report.is_some());
    assert!(outcome.tools_used.contains("Edit"));
    assert!(outcome.files_modified.contains("src/a.rs"));

    let ts = types(&events);
    assert_eq!(ts.first(), Some(&EventType::AgentSpawned));
    assert_eq!(ts.last(), Some(&EventType::AgentCompleted));
    assert!(ts.contains(&EventType::Progress));
    assert!(ts.contains(&EventType::AgentToolUse));
    assert!(ts.contains(&EventType::FileModified));

    let completed = events.last().unwrap();
    assert_eq!(completed.data["success"], true);
    assert!(completed.data["duration_ms"].is_u64());
}

#[tokio::test]
async fn nonzero_exit_fails_the_run() {
    let agent = fake::emit_lines(&["error: boom"], 3);
    let (outcome, events) = run_agent(&agent, |_| {}, CancellationToken::new()).await;

    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(3));
    let completed = events.last().unwrap();
    assert_eq!(completed.data["success"], false);
    assert_eq!(completed.data["exit_code"], 3);
    // The error line itself was parsed
    assert!(types(&events).contains(&EventType::Error));
}

#[tokio::test]
async fn report_failure_overrides_clean_exit() {
    let agent = fake::emit_lines(&[&fake::result_line(false)], 0);
    let (outcome, _) = run_agent(&agent, |_| {}, CancellationToken::new()).await;
    assert!(!outcome.success);
    assert!(outcome.report.is_some());
}

#[tokio::test]
async fn stderr_lines_flow_through_regex_parser() {
    let agent = fake::emit_stderr_lines(&["warning: unused variable `x`"]);
    let (outcome, events) = run_agent(&agent, |_| {}, CancellationToken::new()).await;
    assert!(outcome.success);
    assert!(types(&events).contains(&EventType::BuildOutput));
}

#[tokio::test]
async fn brief_is_delivered_on_stdin() {
    let agent = fake::echo_stdin();
    let (outcome, events) = run_agent(
        &agent,
        |inv| inv.brief = "Processing: the brief".to_string(),
        CancellationToken::new(),
    )
    .await;
    assert!(outcome.success);
    assert!(types(&events).contains(&EventType::Progress));
}

#[tokio::test]
async fn checkpoint_is_prepended_to_brief() {
    let agent = fake::echo_stdin();
    let (_, events) = run_agent(
        &agent,
        |inv| {
            inv.brief = "the task".to_string();
            inv.checkpoint = Some("Executing: earlier work".to_string());
        },
        CancellationToken::new(),
    )
    .await;
    // The echoed checkpoint line parses as progress, proving it was sent
    assert!(types(&events).contains(&EventType::Progress));
    let spawned = &events[0];
    assert_eq!(spawned.data["resumed_from_checkpoint"], true);
}

#[tokio::test]
async fn timeout_interrupts_gracefully() {
    let agent = fake::graceful_on_interrupt();
    let (outcome, events) = run_agent(
        &agent,
        |inv| inv.timeout = Duration::from_millis(300),
        CancellationToken::new(),
    )
    .await;

    assert!(!outcome.success);
    assert!(outcome.timed_out);
    assert!(!outcome.killed);
    let completed = events.last().unwrap();
    assert_eq!(completed.data["timed_out"], true);
    assert_eq!(completed.data["killed"], false);
}

#[tokio::test]
async fn stubborn_agent_is_hard_killed() {
    let agent = fake::ignores_interrupt();
    let (outcome, events) = run_agent(
        &agent,
        |inv| {
            inv.timeout = Duration::from_millis(300);
            inv.kill_grace = Duration::from_millis(300);
        },
        CancellationToken::new(),
    )
    .await;

    assert!(!outcome.success);
    assert!(outcome.timed_out);
    assert!(outcome.killed);
    let completed = events.last().unwrap();
    assert_eq!(completed.data["killed"], true);
}

#[tokio::test]
async fn cancellation_is_an_interrupt_with_checkpoint() {
    let agent = fake::graceful_on_interrupt();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let (outcome, events) = run_agent(&agent, |_| {}, cancel).await;

    assert!(!outcome.success);
    assert!(outcome.interrupted);
    assert!(!outcome.timed_out);
    // The "working" line it printed becomes the resume checkpoint
    assert!(outcome.checkpoint.as_deref().unwrap_or("").contains("working"));
    let completed = events.last().unwrap();
    assert_eq!(completed.data["interrupted"], true);
}

#[tokio::test]
async fn spawn_failure_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut invocation = fake::invocation(
        &fake::ScriptedAgent {
            program: "/nonexistent/agent-binary".to_string(),
            args: Vec::new(),
        },
        dir.path(),
    );
    invocation.timeout = Duration::from_secs(1);

    let (sink, _rx) = EventSink::channel(EventScope::default(), SystemClock);
    let runner = AgentRunner::default();
    let err = runner
        .run(invocation, &sink, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AgentRunnerError::SpawnFailed { .. }));
}

#[tokio::test]
async fn liveness_reflects_output_activity() {
    let runner = AgentRunner::default();
    let liveness = runner.liveness();
    let before = liveness.idle_for();

    let agent = fake::emit_lines(&["Step 1 of 1"], 0);
    let dir = tempfile::tempdir().unwrap();
    let (sink, rx) = EventSink::channel(EventScope::default(), SystemClock);
    let (_events, collect_task) = collector(rx);
    runner
        .run(fake::invocation(&agent, dir.path()), &sink, &CancellationToken::new())
        .await
        .unwrap();
    drop(sink);
    collect_task.await.unwrap();

    assert!(liveness.idle_for() < before + Duration::from_secs(60));
}
