// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store mutation records.
//!
//! Every write to the store is one [`StoreRecord`] appended to the WAL and
//! folded into [`StoreState`](crate::StoreState). A record carries everything
//! needed to reproduce the mutation on replay, so snapshot + WAL replay
//! reconstructs the exact state.

use serde::{Deserialize, Serialize};
use vc_core::{
    AgentEvent, Comment, Dependency, EventId, ExecutionPhase, ExecutorInstance, InstanceId,
    InstanceStatus, Issue, IssueId, IssueStatus, Plan,
};

/// One durable store mutation.
///
/// Serializes with `{"type": "issue:created", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreRecord {
    // -- issues --
    #[serde(rename = "issue:created")]
    IssueCreated { issue: Issue },

    #[serde(rename = "issue:status")]
    IssueStatusChanged {
        id: IssueId,
        status: IssueStatus,
        at: u64,
    },

    #[serde(rename = "issue:closed")]
    IssueClosed { id: IssueId, at: u64 },

    /// The claim CAS: binds execution state to an instance and moves the
    /// issue to `in_progress` in one record.
    #[serde(rename = "issue:claimed")]
    IssueClaimed {
        id: IssueId,
        instance: InstanceId,
        at: u64,
    },

    /// Unbind and return to `open`/`pending`; checkpoint survives.
    #[serde(rename = "issue:released")]
    IssueReleased { id: IssueId, at: u64 },

    #[serde(rename = "issue:label_added")]
    LabelAdded { id: IssueId, label: String },

    #[serde(rename = "issue:label_removed")]
    LabelRemoved { id: IssueId, label: String },

    #[serde(rename = "issue:comment")]
    CommentAdded { id: IssueId, comment: Comment },

    #[serde(rename = "issue:dependency")]
    DependencyAdded { dep: Dependency },

    // -- execution state --
    #[serde(rename = "execution:phase")]
    ExecutionPhaseChanged {
        id: IssueId,
        phase: ExecutionPhase,
        at: u64,
    },

    #[serde(rename = "execution:checkpoint")]
    CheckpointSaved { id: IssueId, blob: String, at: u64 },

    // -- instances --
    #[serde(rename = "instance:registered")]
    InstanceRegistered { instance: ExecutorInstance },

    #[serde(rename = "instance:status")]
    InstanceStatusChanged {
        id: InstanceId,
        status: InstanceStatus,
        at: u64,
    },

    #[serde(rename = "instance:heartbeat")]
    Heartbeat { id: InstanceId, at: u64 },

    // -- events --
    #[serde(rename = "event:stored")]
    EventStored { event: AgentEvent },

    /// One cleanup batch; ids are bounded by `cleanup_batch_size`.
    #[serde(rename = "event:pruned")]
    EventsPruned { ids: Vec<EventId> },

    // -- plans --
    #[serde(rename = "plan:stored")]
    PlanStored { plan: Plan },

    // -- feed --
    #[serde(rename = "feed:imported")]
    ImportCompleted { at: u64 },
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
