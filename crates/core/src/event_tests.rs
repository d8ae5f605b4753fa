// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::issue::IssueId;
use proptest::prelude::*;
use serde::Serialize;

#[test]
fn event_type_wire_names_are_snake_case() {
    assert_eq!(EventType::IssueClaimed.as_str(), "issue_claimed");
    assert_eq!(EventType::QualityGateFail.as_str(), "quality_gate_fail");
    assert_eq!(EventType::ExecutorDegradedMode.as_str(), "executor_degraded_mode");
    assert_eq!(EventType::AgentCompleted.as_str(), "agent_completed");
}

#[test]
fn event_type_serde_matches_as_str() {
    let all = [
        EventType::IssueClaimed,
        EventType::AgentSpawned,
        EventType::AgentToolUse,
        EventType::FileModified,
        EventType::TestRun,
        EventType::GitOperation,
        EventType::BuildOutput,
        EventType::LintOutput,
        EventType::Progress,
        EventType::Error,
        EventType::WatchdogAlert,
        EventType::QualityGatesProgress,
        EventType::DeduplicationDecision,
        EventType::BaselineCacheHit,
        EventType::SandboxCreationCompleted,
        EventType::EventCleanupCompleted,
        EventType::ContextUsage,
        EventType::AgentCompleted,
    ];
    for et in all {
        assert_eq!(
            serde_json::to_value(et).unwrap(),
            serde_json::Value::String(et.as_str().to_string()),
            "serde name mismatch for {et:?}"
        );
    }
}

#[test]
fn event_serializes_type_field_as_type() {
    let event = AgentEvent::info(EventType::AgentSpawned, "spawned");
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "agent_spawned");
    assert_eq!(json["severity"], "info");
}

#[test]
fn event_roundtrip_preserves_all_fields() {
    let mut event = AgentEvent::new(EventType::TestRun, Severity::Warning, "3 tests failed")
        .with_issue("vc-9")
        .with_executor("inst-1")
        .with_agent("agent-1")
        .with_field("tests_failed", 3)
        .with_source_line("FAIL: 3 tests failed");
    event.timestamp = 1_234_567;

    let json = serde_json::to_string(&event).unwrap();
    let back: AgentEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn minimal_event_roundtrips_with_defaults() {
    let event = AgentEvent::info(EventType::Progress, "Step 1 of 3");
    let json = serde_json::to_string(&event).unwrap();
    // Absent optionals are omitted on the wire
    assert!(!json.contains("issue_id"));
    assert!(!json.contains("source_line"));
    let back: AgentEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn severity_orders_by_escalation() {
    assert!(Severity::Info < Severity::Warning);
    assert!(Severity::Warning < Severity::Error);
    assert!(Severity::Error < Severity::Critical);
}

#[derive(Serialize)]
struct SamplePayload {
    path: String,
    lines: u64,
}

#[test]
fn to_data_flattens_payload_struct() {
    let data = to_data(&SamplePayload {
        path: "src/main.rs".into(),
        lines: 12,
    });
    assert_eq!(data.get("path").and_then(|v| v.as_str()), Some("src/main.rs"));
    assert_eq!(data.get("lines").and_then(|v| v.as_u64()), Some(12));
}

#[test]
fn to_data_non_object_yields_empty_map() {
    assert!(to_data(&"just a string").is_empty());
}

proptest! {
    #[test]
    fn event_roundtrip_property(
        message in ".{0,80}",
        timestamp in 0u64..u64::MAX / 2,
        has_issue in any::<bool>(),
        field_value in 0u64..1_000_000,
    ) {
        let mut event = AgentEvent::new(EventType::Progress, Severity::Info, message)
            .with_field("step", field_value);
        event.timestamp = timestamp;
        if has_issue {
            event.issue_id = Some(IssueId::new("vc-prop"));
        }

        let json = serde_json::to_string(&event).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, event);
    }
}
