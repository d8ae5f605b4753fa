// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::instance::InstanceId;

#[test]
fn pending_state_has_no_instance() {
    let state = ExecutionState::pending("vc-1", 100);
    assert!(state.is_pending());
    assert!(state.invariant_holds());
    assert_eq!(state.executor_instance_id, None);
}

#[test]
fn claim_binds_instance_and_sets_claimed_at() {
    let mut state = ExecutionState::pending("vc-1", 100);
    state.claim(InstanceId::new("inst-1"), 200);

    assert_eq!(state.phase, ExecutionPhase::Claimed);
    assert_eq!(state.claimed_at, Some(200));
    assert_eq!(state.executor_instance_id.as_ref().map(|i| i.as_str()), Some("inst-1"));
    assert!(state.invariant_holds());
}

#[test]
fn release_preserves_checkpoint() {
    let mut state = ExecutionState::pending("vc-1", 100);
    state.claim(InstanceId::new("inst-1"), 200);
    state.checkpoint = Some("agent context".to_string());

    state.release(300);

    assert!(state.is_pending());
    assert_eq!(state.executor_instance_id, None);
    assert_eq!(state.claimed_at, None);
    assert_eq!(state.checkpoint.as_deref(), Some("agent context"));
    assert!(state.invariant_holds());
}

#[test]
fn advance_moves_phase_without_touching_binding() {
    let mut state = ExecutionState::pending("vc-1", 100);
    state.claim(InstanceId::new("inst-1"), 200);
    state.advance(ExecutionPhase::InAgent, 250);
    assert_eq!(state.phase, ExecutionPhase::InAgent);
    assert!(state.executor_instance_id.is_some());
}

#[yare::parameterized(
    pending  = { ExecutionPhase::Pending, "pending" },
    claimed  = { ExecutionPhase::Claimed, "claimed" },
    in_agent = { ExecutionPhase::InAgent, "in_agent" },
    in_gates = { ExecutionPhase::InGates, "in_gates" },
    done     = { ExecutionPhase::Done, "done" },
    failed   = { ExecutionPhase::Failed, "failed" },
)]
fn phase_display_and_serde_agree(phase: ExecutionPhase, expected: &str) {
    assert_eq!(phase.to_string(), expected);
    assert_eq!(
        serde_json::to_value(phase).unwrap(),
        serde_json::Value::String(expected.to_string())
    );
}

#[test]
fn serde_roundtrip() {
    let mut state = ExecutionState::pending("vc-1", 100);
    state.claim(InstanceId::new("inst-1"), 200);
    state.checkpoint = Some("blob".into());

    let json = serde_json::to_string(&state).unwrap();
    let back: ExecutionState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state);
}
