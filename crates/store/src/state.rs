// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized store state.
//!
//! `StoreState` is the fold of all [`StoreRecord`]s ever committed. `apply` is
//! idempotent where re-delivery is possible (label adds, status changes), so a
//! replayed WAL suffix after snapshot recovery is harmless.

use crate::record::StoreRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use vc_core::{
    AgentEvent, Comment, Dependency, DependencyKind, ExecutionState, ExecutorInstance, InstanceId,
    Issue, IssueId, IssueStatus, Plan, PlanId,
};

/// In-memory image of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub issues: HashMap<IssueId, Issue>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub comments: HashMap<IssueId, Vec<Comment>>,
    #[serde(default)]
    pub execution: HashMap<IssueId, ExecutionState>,
    #[serde(default)]
    pub instances: HashMap<InstanceId, ExecutorInstance>,
    /// Insertion-ordered event rows.
    #[serde(default)]
    pub events: Vec<AgentEvent>,
    #[serde(default)]
    pub plans: HashMap<PlanId, Plan>,
    /// Epoch ms of the last canonical-feed import (0 = never).
    #[serde(default)]
    pub last_import_ms: u64,
}

impl StoreState {
    /// Fold one record into the state.
    pub fn apply(&mut self, record: &StoreRecord) {
        match record {
            StoreRecord::IssueCreated { issue } => {
                self.issues.insert(issue.id.clone(), issue.clone());
            }

            StoreRecord::IssueStatusChanged { id, status, at } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    issue.set_status(*status, *at);
                }
            }

            StoreRecord::IssueClosed { id, at } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    issue.close(*at);
                }
                if let Some(exec) = self.execution.get_mut(id) {
                    exec.advance(vc_core::ExecutionPhase::Done, *at);
                }
            }

            StoreRecord::IssueClaimed { id, instance, at } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    issue.set_status(IssueStatus::InProgress, *at);
                }
                self.execution
                    .entry(id.clone())
                    .or_insert_with(|| ExecutionState::pending(id.clone(), *at))
                    .claim(instance.clone(), *at);
            }

            StoreRecord::IssueReleased { id, at } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    if !issue.is_closed() {
                        issue.set_status(IssueStatus::Open, *at);
                    }
                }
                if let Some(exec) = self.execution.get_mut(id) {
                    exec.release(*at);
                }
            }

            StoreRecord::LabelAdded { id, label } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    issue.labels.insert(label.clone());
                }
            }

            StoreRecord::LabelRemoved { id, label } => {
                if let Some(issue) = self.issues.get_mut(id) {
                    issue.labels.remove(label);
                }
            }

            StoreRecord::CommentAdded { id, comment } => {
                self.comments.entry(id.clone()).or_default().push(comment.clone());
            }

            StoreRecord::DependencyAdded { dep } => {
                if !self.dependencies.contains(dep) {
                    self.dependencies.push(dep.clone());
                }
            }

            StoreRecord::ExecutionPhaseChanged { id, phase, at } => {
                self.execution
                    .entry(id.clone())
                    .or_insert_with(|| ExecutionState::pending(id.clone(), *at))
                    .advance(*phase, *at);
            }

            StoreRecord::CheckpointSaved { id, blob, at } => {
                let exec = self
                    .execution
                    .entry(id.clone())
                    .or_insert_with(|| ExecutionState::pending(id.clone(), *at));
                exec.checkpoint = Some(blob.clone());
                exec.updated_at = *at;
            }

            StoreRecord::InstanceRegistered { instance } => {
                self.instances.insert(instance.id.clone(), instance.clone());
            }

            StoreRecord::InstanceStatusChanged { id, status, at } => {
                if let Some(inst) = self.instances.get_mut(id) {
                    inst.status = *status;
                    inst.last_heartbeat = inst.last_heartbeat.max(*at);
                }
            }

            StoreRecord::Heartbeat { id, at } => {
                if let Some(inst) = self.instances.get_mut(id) {
                    inst.beat(*at);
                }
            }

            StoreRecord::EventStored { event } => {
                self.events.push(event.clone());
            }

            StoreRecord::EventsPruned { ids } => {
                let doomed: HashSet<&str> = ids.iter().map(|i| i.as_str()).collect();
                self.events.retain(|e| !doomed.contains(e.id.as_str()));
            }

            StoreRecord::PlanStored { plan } => {
                self.plans.insert(plan.id.clone(), plan.clone());
            }

            StoreRecord::ImportCompleted { at } => {
                self.last_import_ms = *at;
            }
        }
    }

    /// Hard-blocker targets of an issue.
    pub fn hard_blockers<'a>(
        &'a self,
        issue_id: &'a IssueId,
    ) -> impl Iterator<Item = &'a IssueId> + 'a {
        self.dependencies
            .iter()
            .filter(move |d| &d.issue_id == issue_id && d.kind == DependencyKind::HardBlocker)
            .map(|d| &d.depends_on)
    }

    /// An issue is ready when open and every hard blocker is closed.
    pub fn is_ready(&self, issue: &Issue) -> bool {
        issue.status == IssueStatus::Open
            && self.hard_blockers(&issue.id).all(|dep| {
                self.issues
                    .get(dep)
                    .map(|target| target.is_closed())
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
