// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-issue execution state.
//!
//! One row per issue that has ever been claimed. The claim transition is a
//! compare-and-swap on this row (performed by the store under its lock); the
//! helpers here express the transitions, the store enforces atomicity.

use crate::instance::InstanceId;
use crate::issue::IssueId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an issue sits in the execution pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    Pending,
    Claimed,
    InAgent,
    InGates,
    Done,
    Failed,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPhase::Pending => write!(f, "pending"),
            ExecutionPhase::Claimed => write!(f, "claimed"),
            ExecutionPhase::InAgent => write!(f, "in_agent"),
            ExecutionPhase::InGates => write!(f, "in_gates"),
            ExecutionPhase::Done => write!(f, "done"),
            ExecutionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Execution metadata for one issue.
///
/// Invariant: `executor_instance_id` is `None` exactly when `phase` is
/// `Pending`. The checkpoint blob survives release/reclaim cycles — it is the
/// mechanism that lets a later run resume where an interrupt stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub issue_id: IssueId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_instance_id: Option<InstanceId>,
    pub phase: ExecutionPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<u64>,
    pub updated_at: u64,
    /// Opaque agent-context blob, preserved across release/reclaim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

impl ExecutionState {
    pub fn pending(issue_id: impl Into<IssueId>, now: u64) -> Self {
        Self {
            issue_id: issue_id.into(),
            executor_instance_id: None,
            phase: ExecutionPhase::Pending,
            claimed_at: None,
            updated_at: now,
            checkpoint: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.phase == ExecutionPhase::Pending
    }

    /// True when the instance-id/phase pairing is consistent.
    pub fn invariant_holds(&self) -> bool {
        self.executor_instance_id.is_none() == (self.phase == ExecutionPhase::Pending)
    }

    /// Bind the row to an instance. Caller (the store) has already verified
    /// the CAS predicate under its lock.
    pub fn claim(&mut self, instance: InstanceId, now: u64) {
        self.executor_instance_id = Some(instance);
        self.phase = ExecutionPhase::Claimed;
        self.claimed_at = Some(now);
        self.updated_at = now;
    }

    /// Unbind the row, preserving the checkpoint blob.
    pub fn release(&mut self, now: u64) {
        self.executor_instance_id = None;
        self.phase = ExecutionPhase::Pending;
        self.claimed_at = None;
        self.updated_at = now;
    }

    pub fn advance(&mut self, phase: ExecutionPhase, now: u64) {
        self.phase = phase;
        self.updated_at = now;
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
