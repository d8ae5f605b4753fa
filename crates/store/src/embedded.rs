// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded implementation of [`IssueStore`].
//!
//! One mutex over (materialized state, WAL) makes every operation a
//! transaction: records are appended and flushed before they are folded into
//! state, so state never reflects an unlogged mutation, and the claim CAS is
//! serializable because the predicate check and the write happen under the
//! same lock.

use crate::record::StoreRecord;
use crate::snapshot::{load_snapshot, write_snapshot};
use crate::state::StoreState;
use crate::wal::Wal;
use crate::{
    EventCounts, EventFilter, EventRetention, IssueStore, StoreError, StorePaths, WorkFilter,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use vc_core::{
    AgentEvent, Clock, Comment, Dependency, DependencyKind, EventId, ExecutionPhase,
    ExecutionState, ExecutorInstance, InstanceId, InstanceStatus, Issue, IssueId, IssueKind,
    IssueStatus, Plan, PlanId, PlanStatus, SystemClock,
};

struct Inner {
    state: StoreState,
    /// `None` in read-only mode.
    wal: Option<Wal>,
}

/// Event-sourced store backed by snapshot + WAL.
#[derive(Clone)]
pub struct EmbeddedStore<C: Clock = SystemClock> {
    inner: Arc<Mutex<Inner>>,
    paths: StorePaths,
    clock: C,
}

impl EmbeddedStore<SystemClock> {
    /// Open a store read-write with the system clock.
    pub fn open(paths: StorePaths) -> Result<Self, StoreError> {
        Self::open_with_clock(paths, SystemClock)
    }

    /// Open for queries only: snapshot + WAL replay, no append handle.
    ///
    /// Safe to call while another process holds the store; reads may trail
    /// the live owner by its flush window.
    pub fn open_read_only(paths: StorePaths) -> Result<Self, StoreError> {
        let (state, _) = load_state(&paths)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { state, wal: None })),
            paths,
            clock: SystemClock,
        })
    }

    /// Create an empty database at the layout (used by `init`).
    pub fn create(paths: &StorePaths) -> Result<(), StoreError> {
        write_snapshot(&paths.db_path, 0, &StoreState::default())?;
        if !paths.feed_path.exists() {
            std::fs::write(&paths.feed_path, b"")?;
        }
        Ok(())
    }
}

impl<C: Clock> EmbeddedStore<C> {
    /// Open a store read-write with an explicit clock (tests use `FakeClock`).
    pub fn open_with_clock(paths: StorePaths, clock: C) -> Result<Self, StoreError> {
        let (state, snapshot_seq) = load_state(&paths)?;
        let wal = Wal::open(&paths.wal_path, snapshot_seq)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                state,
                wal: Some(wal),
            })),
            paths,
            clock,
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    fn now(&self) -> u64 {
        self.clock.wall_ms()
    }

    /// All claimed (non-pending) execution states, for stale-claim tooling.
    pub fn list_claimed(&self) -> Result<Vec<ExecutionState>, StoreError> {
        let inner = self.inner.lock();
        let mut claimed: Vec<ExecutionState> = inner
            .state
            .execution
            .values()
            .filter(|e| !e.is_pending())
            .cloned()
            .collect();
        claimed.sort_by(|a, b| a.issue_id.cmp(&b.issue_id));
        Ok(claimed)
    }
}

/// Append records, flush, then fold into state. All-or-nothing per call.
fn commit(inner: &mut Inner, records: Vec<StoreRecord>) -> Result<(), StoreError> {
    let wal = inner.wal.as_mut().ok_or(StoreError::ReadOnly)?;
    for record in &records {
        wal.append(record)?;
    }
    wal.flush()?;
    for record in &records {
        inner.state.apply(record);
    }
    Ok(())
}

fn require_issue(state: &StoreState, id: &IssueId) -> Result<(), StoreError> {
    if state.issues.contains_key(id) {
        Ok(())
    } else {
        Err(StoreError::IssueNotFound(id.clone()))
    }
}

fn load_state(paths: &StorePaths) -> Result<(StoreState, u64), StoreError> {
    let (mut state, snapshot_seq) = match load_snapshot(&paths.db_path)? {
        Some(snapshot) => (snapshot.state, snapshot.seq),
        None => (StoreState::default(), 0),
    };

    if paths.wal_path.exists() {
        let wal = Wal::open(&paths.wal_path, snapshot_seq)?;
        let entries = wal.entries_after(snapshot_seq)?;
        let replayed = entries.len();
        for entry in entries {
            state.apply(&entry.record);
        }
        if replayed > 0 {
            tracing::info!(replayed, snapshot_seq, "replayed WAL entries after snapshot");
        }
    }

    Ok((state, snapshot_seq))
}

impl<C: Clock> IssueStore for EmbeddedStore<C> {
    fn get_ready_work(&self, filter: &WorkFilter) -> Result<Vec<Issue>, StoreError> {
        let inner = self.inner.lock();
        let state = &inner.state;

        let mut ready: Vec<Issue> = state
            .issues
            .values()
            .filter(|issue| state.is_ready(issue))
            .filter(|issue| filter.kinds.is_empty() || filter.kinds.contains(&issue.kind))
            .filter(|issue| !filter.exclude_labels.iter().any(|l| issue.has_label(l)))
            .cloned()
            .collect();

        ready.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        if filter.limit > 0 {
            ready.truncate(filter.limit);
        }
        Ok(ready)
    }

    fn claim_issue(
        &self,
        issue_id: &IssueId,
        instance_id: &InstanceId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let issue = inner
            .state
            .issues
            .get(issue_id)
            .ok_or_else(|| StoreError::IssueNotFound(issue_id.clone()))?;
        if issue.status != IssueStatus::Open {
            return Err(StoreError::ClaimConflict(issue_id.clone()));
        }
        if let Some(exec) = inner.state.execution.get(issue_id) {
            if exec.executor_instance_id.is_some() || !exec.is_pending() {
                return Err(StoreError::ClaimConflict(issue_id.clone()));
            }
        }

        let record = StoreRecord::IssueClaimed {
            id: issue_id.clone(),
            instance: instance_id.clone(),
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn release_issue(&self, issue_id: &IssueId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::IssueReleased {
            id: issue_id.clone(),
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn update_issue_status(
        &self,
        issue_id: &IssueId,
        status: IssueStatus,
    ) -> Result<(), StoreError> {
        if status == IssueStatus::Closed {
            return Err(StoreError::InvariantViolation(
                "closing must go through close_issue to set closed_at".to_string(),
            ));
        }
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::IssueStatusChanged {
            id: issue_id.clone(),
            status,
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn close_issue(&self, issue_id: &IssueId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::IssueClosed {
            id: issue_id.clone(),
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn create_issue(&self, issue: Issue) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.state.issues.contains_key(&issue.id) {
            return Err(StoreError::InvariantViolation(format!(
                "issue {} already exists",
                issue.id
            )));
        }
        commit(&mut inner, vec![StoreRecord::IssueCreated { issue }])
    }

    fn get_issue(&self, issue_id: &IssueId) -> Result<Option<Issue>, StoreError> {
        Ok(self.inner.lock().state.issues.get(issue_id).cloned())
    }

    fn list_open_issues(&self) -> Result<Vec<Issue>, StoreError> {
        let inner = self.inner.lock();
        let mut open: Vec<Issue> = inner
            .state
            .issues
            .values()
            .filter(|i| i.status == IssueStatus::Open || i.status == IssueStatus::InProgress)
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    fn register_instance(&self, instance: ExecutorInstance) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        commit(&mut inner, vec![StoreRecord::InstanceRegistered { instance }])
    }

    fn mark_instance_stopped(&self, id: &InstanceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.instances.contains_key(id) {
            return Err(StoreError::InstanceNotFound(id.clone()));
        }
        let record = StoreRecord::InstanceStatusChanged {
            id: id.clone(),
            status: InstanceStatus::Stopped,
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn get_active_instances(&self) -> Result<Vec<ExecutorInstance>, StoreError> {
        let inner = self.inner.lock();
        let mut active: Vec<ExecutorInstance> = inner
            .state
            .instances
            .values()
            .filter(|i| i.status == InstanceStatus::Running)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(active)
    }

    fn get_instances(&self) -> Result<Vec<ExecutorInstance>, StoreError> {
        let inner = self.inner.lock();
        let mut all: Vec<ExecutorInstance> = inner.state.instances.values().cloned().collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    fn record_heartbeat(&self, id: &InstanceId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if !inner.state.instances.contains_key(id) {
            return Err(StoreError::InstanceNotFound(id.clone()));
        }
        let record = StoreRecord::Heartbeat {
            id: id.clone(),
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn cleanup_instances(&self, max_age_ms: u64, keep: usize) -> Result<usize, StoreError> {
        let now = self.now();
        let mut inner = self.inner.lock();

        let mut rows: Vec<(InstanceId, u64, bool)> = inner
            .state
            .instances
            .values()
            .map(|i| {
                (
                    i.id.clone(),
                    i.last_heartbeat,
                    i.status == InstanceStatus::Running && i.is_stale(now, max_age_ms),
                )
            })
            .collect();
        // Newest heartbeats first; the first `keep` rows are history and
        // stay untouched.
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let records: Vec<StoreRecord> = rows
            .into_iter()
            .skip(keep)
            .filter(|(_, _, stale)| *stale)
            .map(|(id, _, _)| StoreRecord::InstanceStatusChanged {
                id,
                status: InstanceStatus::Stopped,
                at: now,
            })
            .collect();

        let count = records.len();
        if count > 0 {
            commit(&mut inner, records)?;
        }
        Ok(count)
    }

    fn store_agent_event(&self, event: AgentEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        commit(&mut inner, vec![StoreRecord::EventStored { event }])
    }

    fn get_recent_agent_events(&self, limit: usize) -> Result<Vec<AgentEvent>, StoreError> {
        let inner = self.inner.lock();
        let events = &inner.state.events;
        let start = events.len().saturating_sub(limit);
        // Newest first for display
        Ok(events[start..].iter().rev().cloned().collect())
    }

    fn get_agent_events_by_issue(
        &self,
        issue_id: &IssueId,
    ) -> Result<Vec<AgentEvent>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .state
            .events
            .iter()
            .filter(|e| e.issue_id.as_ref() == Some(issue_id))
            .cloned()
            .collect())
    }

    fn get_agent_events(&self, filter: &EventFilter) -> Result<Vec<AgentEvent>, StoreError> {
        let inner = self.inner.lock();
        let mut matched: Vec<AgentEvent> = inner
            .state
            .events
            .iter()
            .filter(|e| {
                filter
                    .issue_id
                    .as_ref()
                    .map(|id| e.issue_id.as_ref() == Some(id))
                    .unwrap_or(true)
            })
            .filter(|e| {
                filter.event_types.is_empty() || filter.event_types.contains(&e.event_type)
            })
            .filter(|e| filter.min_severity.map(|s| e.severity >= s).unwrap_or(true))
            .filter(|e| filter.since_ms.map(|t| e.timestamp >= t).unwrap_or(true))
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            let start = matched.len().saturating_sub(limit);
            matched.drain(..start);
        }
        Ok(matched)
    }

    fn get_event_counts(&self) -> Result<EventCounts, StoreError> {
        let inner = self.inner.lock();
        let mut counts = EventCounts {
            total: inner.state.events.len(),
            ..Default::default()
        };
        for event in &inner.state.events {
            if event.severity == vc_core::Severity::Critical {
                counts.critical += 1;
            }
            if let Some(id) = &event.issue_id {
                *counts.by_issue.entry(id.clone()).or_default() += 1;
            }
        }
        Ok(counts)
    }

    fn cleanup_events_by_age(&self, retention: &EventRetention) -> Result<usize, StoreError> {
        let now = self.now();
        let cutoff = now.saturating_sub(retention.retention_days * 86_400_000);
        let critical_cutoff =
            now.saturating_sub(retention.retention_critical_days * 86_400_000);

        let mut inner = self.inner.lock();
        let doomed: Vec<EventId> = inner
            .state
            .events
            .iter()
            .filter(|e| {
                if e.severity == vc_core::Severity::Critical {
                    e.timestamp < critical_cutoff
                } else {
                    e.timestamp < cutoff
                }
            })
            .map(|e| e.id.clone())
            .collect();

        prune_batched(&mut inner, doomed, retention.cleanup_batch_size)
    }

    fn cleanup_events_by_issue_limit(
        &self,
        retention: &EventRetention,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();

        // Group insertion indices per issue; events with no issue are exempt.
        let mut by_issue: HashMap<IssueId, Vec<usize>> = HashMap::new();
        for (idx, event) in inner.state.events.iter().enumerate() {
            if let Some(id) = &event.issue_id {
                by_issue.entry(id.clone()).or_default().push(idx);
            }
        }

        let mut doomed = Vec::new();
        for indices in by_issue.into_values() {
            if indices.len() <= retention.per_issue_limit {
                continue;
            }
            let mut ordered = indices;
            // Oldest first by timestamp, then insertion order
            ordered.sort_by_key(|&i| (inner.state.events[i].timestamp, i));
            let excess = ordered.len() - retention.per_issue_limit;
            doomed.extend(
                ordered[..excess]
                    .iter()
                    .map(|&i| inner.state.events[i].id.clone()),
            );
        }

        prune_batched(&mut inner, doomed, retention.cleanup_batch_size)
    }

    fn cleanup_events_by_global_limit(
        &self,
        retention: &EventRetention,
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let total = inner.state.events.len();
        if total <= retention.global_limit {
            return Ok(0);
        }

        let mut ordered: Vec<usize> = (0..total).collect();
        ordered.sort_by_key(|&i| (inner.state.events[i].timestamp, i));
        let excess = total - retention.global_limit;
        let doomed: Vec<EventId> = ordered[..excess]
            .iter()
            .map(|&i| inner.state.events[i].id.clone())
            .collect();

        prune_batched(&mut inner, doomed, retention.cleanup_batch_size)
    }

    fn vacuum(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let wal = inner.wal.as_mut().ok_or(StoreError::ReadOnly)?;
        wal.flush()?;
        let seq = wal.last_seq();
        write_snapshot(&self.paths.db_path, seq, &inner.state)?;
        let wal = inner.wal.as_mut().ok_or(StoreError::ReadOnly)?;
        wal.truncate()?;
        Ok(())
    }

    fn add_label(&self, issue_id: &IssueId, label: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::LabelAdded {
            id: issue_id.clone(),
            label: label.to_string(),
        };
        commit(&mut inner, vec![record])
    }

    fn remove_label(&self, issue_id: &IssueId, label: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let present = inner
            .state
            .issues
            .get(issue_id)
            .map(|i| i.has_label(label))
            .unwrap_or(false);
        if present {
            let record = StoreRecord::LabelRemoved {
                id: issue_id.clone(),
                label: label.to_string(),
            };
            commit(&mut inner, vec![record])?;
        }
        Ok(present)
    }

    fn get_labels(&self, issue_id: &IssueId) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        let issue = inner
            .state
            .issues
            .get(issue_id)
            .ok_or_else(|| StoreError::IssueNotFound(issue_id.clone()))?;
        Ok(issue.labels.iter().cloned().collect())
    }

    fn add_comment(
        &self,
        issue_id: &IssueId,
        author: &str,
        body: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::CommentAdded {
            id: issue_id.clone(),
            comment: Comment {
                author: author.to_string(),
                body: body.to_string(),
                created_at: self.now(),
            },
        };
        commit(&mut inner, vec![record])
    }

    fn get_comments(&self, issue_id: &IssueId) -> Result<Vec<Comment>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .state
            .comments
            .get(issue_id)
            .cloned()
            .unwrap_or_default())
    }

    fn add_dependency(&self, dep: Dependency) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, &dep.issue_id)?;
        let target = inner
            .state
            .issues
            .get(&dep.depends_on)
            .ok_or_else(|| StoreError::IssueNotFound(dep.depends_on.clone()))?;
        if dep.kind == DependencyKind::HardBlocker && target.is_closed() {
            return Err(StoreError::InvariantViolation(format!(
                "hard blocker on closed issue {}",
                dep.depends_on
            )));
        }
        commit(&mut inner, vec![StoreRecord::DependencyAdded { dep }])
    }

    fn get_dependencies(&self, issue_id: &IssueId) -> Result<Vec<Dependency>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .state
            .dependencies
            .iter()
            .filter(|d| &d.issue_id == issue_id)
            .cloned()
            .collect())
    }

    fn get_execution_state(
        &self,
        issue_id: &IssueId,
    ) -> Result<Option<ExecutionState>, StoreError> {
        Ok(self.inner.lock().state.execution.get(issue_id).cloned())
    }

    fn save_checkpoint(&self, issue_id: &IssueId, blob: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::CheckpointSaved {
            id: issue_id.clone(),
            blob: blob.to_string(),
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn set_execution_phase(
        &self,
        issue_id: &IssueId,
        phase: ExecutionPhase,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        require_issue(&inner.state, issue_id)?;
        let record = StoreRecord::ExecutionPhaseChanged {
            id: issue_id.clone(),
            phase,
            at: self.now(),
        };
        commit(&mut inner, vec![record])
    }

    fn store_plan(&self, plan: Plan) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.state.plans.get(&plan.id) {
            if existing.is_approved() {
                return Err(StoreError::InvariantViolation(format!(
                    "plan {} is approved and immutable",
                    plan.id
                )));
            }
        }
        commit(&mut inner, vec![StoreRecord::PlanStored { plan }])
    }

    fn get_plan(&self, id: &PlanId) -> Result<Option<Plan>, StoreError> {
        Ok(self.inner.lock().state.plans.get(id).cloned())
    }

    fn list_draft_plans(&self) -> Result<Vec<Plan>, StoreError> {
        let inner = self.inner.lock();
        let mut drafts: Vec<Plan> = inner
            .state
            .plans
            .values()
            .filter(|p| p.status == PlanStatus::Draft)
            .cloned()
            .collect();
        drafts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(drafts)
    }

    fn create_mission(&self, mut issue: Issue) -> Result<(), StoreError> {
        issue.kind = IssueKind::Mission;
        self.create_issue(issue)
    }

    fn last_import_ms(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().state.last_import_ms)
    }

    fn import_issues(&self, issues: Vec<Issue>) -> Result<usize, StoreError> {
        let now = self.now();
        let mut inner = self.inner.lock();
        let count = issues.len();
        let mut records: Vec<StoreRecord> = issues
            .into_iter()
            .map(|issue| StoreRecord::IssueCreated { issue })
            .collect();
        records.push(StoreRecord::ImportCompleted { at: now });
        commit(&mut inner, records)?;
        Ok(count)
    }
}

/// Commit prune records in `batch_size` chunks, one flush per chunk.
fn prune_batched(
    inner: &mut Inner,
    doomed: Vec<EventId>,
    batch_size: usize,
) -> Result<usize, StoreError> {
    let total = doomed.len();
    if total == 0 {
        return Ok(0);
    }
    let batch_size = batch_size.max(1);
    for chunk in doomed.chunks(batch_size) {
        let record = StoreRecord::EventsPruned {
            ids: chunk.to_vec(),
        };
        commit(inner, vec![record])?;
    }
    Ok(total)
}

#[cfg(test)]
#[path = "embedded_tests.rs"]
mod tests;
