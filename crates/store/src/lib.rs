// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vc-store: the issue store contract and its embedded implementation.
//!
//! The executor only ever talks to the [`IssueStore`] trait. The shipped
//! implementation ([`EmbeddedStore`]) is event-sourced: every mutation is a
//! [`StoreRecord`] appended to a JSONL write-ahead log, folded into an
//! in-memory [`StoreState`], and periodically compacted into a zstd snapshot
//! (the database file itself). Claims are a compare-and-swap under one mutex,
//! which is what makes two executors racing for the same issue resolve to
//! exactly one winner.

mod embedded;
pub mod freshness;
mod paths;
mod record;
mod state;
mod wal;

pub mod snapshot;

pub use embedded::EmbeddedStore;
pub use freshness::{validate_freshness, FreshnessReport};
pub use paths::StorePaths;
pub use record::StoreRecord;
pub use snapshot::{load_snapshot, write_snapshot, Snapshot, SnapshotError};
pub use state::StoreState;
pub use wal::{Wal, WalError};

use std::collections::HashMap;

use thiserror::Error;
use vc_core::{
    AgentEvent, Comment, Dependency, ExecutionPhase, ExecutionState, ExecutorInstance, Issue,
    IssueId, IssueKind, IssueStatus, InstanceId, Plan, PlanId,
};

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("issue not found: {0}")]
    IssueNotFound(IssueId),

    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("claim conflict on {0}: already bound to another instance")]
    ClaimConflict(IssueId),

    #[error("store is read-only")]
    ReadOnly,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("WAL error: {0}")]
    Wal(#[from] WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Claim conflicts are expected under contention and are not failures.
    pub fn is_claim_conflict(&self) -> bool {
        matches!(self, StoreError::ClaimConflict(_))
    }
}

/// Filter for ready-work queries.
#[derive(Debug, Clone, Default)]
pub struct WorkFilter {
    /// Maximum number of candidates to return.
    pub limit: usize,
    /// Restrict to these kinds (empty = all kinds).
    pub kinds: Vec<IssueKind>,
    /// Skip issues carrying any of these labels (e.g. `interrupted`).
    pub exclude_labels: Vec<String>,
}

impl WorkFilter {
    /// The executor's default: a small candidate window, skipping issues that
    /// were paused mid-flight (those come back via `resume`).
    pub fn ready(limit: usize) -> Self {
        Self {
            limit,
            kinds: Vec::new(),
            exclude_labels: vec!["interrupted".to_string()],
        }
    }
}

/// Filter for event queries.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub issue_id: Option<IssueId>,
    pub event_types: Vec<vc_core::EventType>,
    pub min_severity: Option<vc_core::Severity>,
    pub since_ms: Option<u64>,
    pub limit: Option<usize>,
}

/// Aggregate event counts for status output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub total: usize,
    pub critical: usize,
    pub by_issue: HashMap<IssueId, usize>,
}

/// Knobs for the three event-retention passes.
#[derive(Debug, Clone)]
pub struct EventRetention {
    pub retention_days: u64,
    /// Critical-severity events are kept longer.
    pub retention_critical_days: u64,
    pub per_issue_limit: usize,
    pub global_limit: usize,
    /// Rows pruned per WAL commit, to bound lock hold times.
    pub cleanup_batch_size: usize,
}

impl Default for EventRetention {
    fn default() -> Self {
        Self {
            retention_days: 30,
            retention_critical_days: 90,
            per_issue_limit: 1000,
            global_limit: 100_000,
            cleanup_batch_size: 500,
        }
    }
}

/// The store contract the executor consumes.
///
/// All operations are transactional with respect to one another; `claim_issue`
/// in particular is an atomic compare-and-swap (two instances racing for one
/// issue see exactly one success and one [`StoreError::ClaimConflict`]).
pub trait IssueStore: Send + Sync {
    // ── work selection / claim ──────────────────────────────────────────

    /// Open issues whose hard blockers are all closed, ordered by
    /// `(priority asc, created_at asc)`.
    fn get_ready_work(&self, filter: &WorkFilter) -> Result<Vec<Issue>, StoreError>;

    /// Atomically bind an issue to an instance and move it to `in_progress`.
    fn claim_issue(&self, issue_id: &IssueId, instance_id: &InstanceId)
        -> Result<(), StoreError>;

    /// Unbind an issue, returning it to `open`/`pending`. Preserves any
    /// checkpoint blob.
    fn release_issue(&self, issue_id: &IssueId) -> Result<(), StoreError>;

    /// Move an issue to a non-terminal status.
    fn update_issue_status(&self, issue_id: &IssueId, status: IssueStatus)
        -> Result<(), StoreError>;

    /// Close an issue (sets `closed_at`) and mark its execution state done.
    fn close_issue(&self, issue_id: &IssueId) -> Result<(), StoreError>;

    // ── issues ──────────────────────────────────────────────────────────

    fn create_issue(&self, issue: Issue) -> Result<(), StoreError>;
    fn get_issue(&self, issue_id: &IssueId) -> Result<Option<Issue>, StoreError>;
    fn list_open_issues(&self) -> Result<Vec<Issue>, StoreError>;

    // ── instances ───────────────────────────────────────────────────────

    fn register_instance(&self, instance: ExecutorInstance) -> Result<(), StoreError>;
    fn mark_instance_stopped(&self, id: &InstanceId) -> Result<(), StoreError>;
    fn get_active_instances(&self) -> Result<Vec<ExecutorInstance>, StoreError>;
    fn get_instances(&self) -> Result<Vec<ExecutorInstance>, StoreError>;
    fn record_heartbeat(&self, id: &InstanceId) -> Result<(), StoreError>;

    /// Mark instances stopped whose heartbeat is older than `max_age_ms`,
    /// keeping the `keep` most recently started rows untouched for history.
    /// Returns the number of rows transitioned.
    fn cleanup_instances(&self, max_age_ms: u64, keep: usize) -> Result<usize, StoreError>;

    // ── events ──────────────────────────────────────────────────────────

    fn store_agent_event(&self, event: AgentEvent) -> Result<(), StoreError>;
    fn get_recent_agent_events(&self, limit: usize) -> Result<Vec<AgentEvent>, StoreError>;
    fn get_agent_events_by_issue(&self, issue_id: &IssueId)
        -> Result<Vec<AgentEvent>, StoreError>;
    fn get_agent_events(&self, filter: &EventFilter) -> Result<Vec<AgentEvent>, StoreError>;
    fn get_event_counts(&self) -> Result<EventCounts, StoreError>;

    /// Pass 1: time-based pruning. Returns events deleted.
    fn cleanup_events_by_age(&self, retention: &EventRetention) -> Result<usize, StoreError>;
    /// Pass 2: per-issue cap, keeping the newest rows per issue.
    fn cleanup_events_by_issue_limit(&self, retention: &EventRetention)
        -> Result<usize, StoreError>;
    /// Pass 3: global cap, keeping the newest rows overall.
    fn cleanup_events_by_global_limit(&self, retention: &EventRetention)
        -> Result<usize, StoreError>;

    /// Compact the store: write a snapshot and truncate the WAL.
    fn vacuum(&self) -> Result<(), StoreError>;

    // ── labels / comments / dependencies ────────────────────────────────

    fn add_label(&self, issue_id: &IssueId, label: &str) -> Result<(), StoreError>;
    /// Returns whether the label was present.
    fn remove_label(&self, issue_id: &IssueId, label: &str) -> Result<bool, StoreError>;
    fn get_labels(&self, issue_id: &IssueId) -> Result<Vec<String>, StoreError>;
    fn add_comment(&self, issue_id: &IssueId, author: &str, body: &str)
        -> Result<(), StoreError>;
    fn get_comments(&self, issue_id: &IssueId) -> Result<Vec<Comment>, StoreError>;

    /// Add a dependency edge. Rejects a hard blocker pointing at a closed
    /// issue with [`StoreError::InvariantViolation`].
    fn add_dependency(&self, dep: Dependency) -> Result<(), StoreError>;
    fn get_dependencies(&self, issue_id: &IssueId) -> Result<Vec<Dependency>, StoreError>;

    // ── execution state ─────────────────────────────────────────────────

    fn get_execution_state(&self, issue_id: &IssueId)
        -> Result<Option<ExecutionState>, StoreError>;
    fn save_checkpoint(&self, issue_id: &IssueId, blob: &str) -> Result<(), StoreError>;
    fn set_execution_phase(&self, issue_id: &IssueId, phase: ExecutionPhase)
        -> Result<(), StoreError>;

    // ── plans ───────────────────────────────────────────────────────────

    fn store_plan(&self, plan: Plan) -> Result<(), StoreError>;
    fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, StoreError>;
    fn list_draft_plans(&self) -> Result<Vec<Plan>, StoreError>;
    /// Create a mission issue (kind is forced to `mission`).
    fn create_mission(&self, issue: Issue) -> Result<(), StoreError>;

    // ── freshness ───────────────────────────────────────────────────────

    /// Epoch ms of the last canonical-feed import (0 = never imported).
    fn last_import_ms(&self) -> Result<u64, StoreError>;

    /// Replace issue rows from the canonical feed and stamp the import time.
    fn import_issues(&self, issues: Vec<Issue>) -> Result<usize, StoreError>;
}
