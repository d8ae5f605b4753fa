// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Duration;
use vc_core::test_support::open_issue;
use vc_core::{AgentEvent, EventType, FakeClock, IssueId};
use vc_store::{EmbeddedStore, StorePaths};

fn scope() -> EventScope {
    EventScope {
        issue_id: Some(IssueId::new("vc-1")),
        executor_id: Some(vc_core::InstanceId::new("inst-1")),
        agent_id: Some(vc_core::AgentId::new("agent-1")),
    }
}

#[tokio::test]
async fn sink_stamps_scope_and_timestamp() {
    let clock = FakeClock::new();
    clock.set_wall_ms(5_000);
    let (sink, mut rx) = EventSink::channel(scope(), clock);

    assert!(sink.emit(AgentEvent::info(EventType::Progress, "p")).await);
    let event = rx.recv().await.unwrap();
    assert_eq!(event.timestamp, 5_000);
    assert_eq!(event.issue_id.as_ref().map(|i| i.as_str()), Some("vc-1"));
    assert_eq!(event.executor_id.as_ref().map(|i| i.as_str()), Some("inst-1"));
    assert_eq!(event.agent_id.as_ref().map(|i| i.as_str()), Some("agent-1"));
}

#[tokio::test]
async fn timestamps_are_nondecreasing_even_if_clock_jumps_back() {
    let clock = FakeClock::new();
    clock.set_wall_ms(5_000);
    let (sink, mut rx) = EventSink::channel(EventScope::default(), clock.clone());

    sink.emit(AgentEvent::info(EventType::Progress, "a")).await;
    clock.set_wall_ms(4_000);
    sink.emit(AgentEvent::info(EventType::Progress, "b")).await;

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.timestamp, 5_000);
    assert_eq!(second.timestamp, 5_000);
}

#[tokio::test]
async fn explicit_timestamps_are_preserved_when_monotonic() {
    let clock = FakeClock::new();
    let (sink, mut rx) = EventSink::channel(EventScope::default(), clock);

    let mut event = AgentEvent::info(EventType::Progress, "a");
    event.timestamp = 9_000_000;
    sink.emit(event).await;
    assert_eq!(rx.recv().await.unwrap().timestamp, 9_000_000);
}

#[tokio::test]
async fn writer_persists_in_submission_order() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StorePaths::for_database(&dir.path().join("t.db"));
    let store = Arc::new(EmbeddedStore::open(paths).unwrap());
    store.create_issue(open_issue("vc-1", 1)).unwrap();

    let clock = FakeClock::new();
    let (sink, rx) = EventSink::channel(scope(), clock);
    let writer = EventWriter::spawn(store.clone(), rx);

    for i in 0..20 {
        sink.emit(AgentEvent::info(EventType::Progress, format!("step {i}"))).await;
    }
    drop(sink);
    let written = writer.drain(Duration::from_secs(5)).await;
    assert_eq!(written, 20);

    let events = store.get_agent_events_by_issue(&IssueId::new("vc-1")).unwrap();
    assert_eq!(events.len(), 20);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.message, format!("step {i}"));
    }
    // Persisted timestamps are nondecreasing
    for pair in events.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn emit_returns_false_after_writer_dropped() {
    let clock = FakeClock::new();
    let (sink, rx) = EventSink::channel(EventScope::default(), clock);
    drop(rx);
    assert!(!sink.emit(AgentEvent::info(EventType::Progress, "p")).await);
}
