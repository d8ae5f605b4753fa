// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::{AgentEvent, EventType, Severity};
use crate::execution::ExecutionState;
use crate::instance::{ExecutorInstance, InstanceId};
use crate::issue::{Issue, IssueId, IssueKind, IssueStatus, Priority};

/// Builder for test issues. Defaults: open task, P2, created at t=1_000_000.
pub struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            issue: Issue::new(id, format!("issue {id}"), IssueKind::Task, 1_000_000),
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.issue.title = title.to_string();
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.issue.description = description.to_string();
        self
    }

    pub fn kind(mut self, kind: IssueKind) -> Self {
        self.issue.kind = kind;
        self
    }

    pub fn priority(mut self, p: u8) -> Self {
        self.issue.priority = Priority::new(p).unwrap_or_default();
        self
    }

    pub fn status(mut self, status: IssueStatus) -> Self {
        if status == IssueStatus::Closed {
            self.issue.close(self.issue.created_at);
        } else {
            self.issue.status = status;
            self.issue.closed_at = None;
        }
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.issue.labels.insert(label.to_string());
        self
    }

    pub fn created_at(mut self, ts: u64) -> Self {
        self.issue.created_at = ts;
        self.issue.updated_at = ts;
        self
    }

    pub fn build(self) -> Issue {
        self.issue
    }
}

/// Shorthand: an open task issue with the given id and priority.
pub fn open_issue(id: &str, priority: u8) -> Issue {
    IssueBuilder::new(id).priority(priority).build()
}

/// A running instance row for tests.
pub fn running_instance(id: &str) -> ExecutorInstance {
    ExecutorInstance::new(id, "testhost", 4242, "0.1.0-test", 1_000_000)
}

/// A pending execution-state row for tests.
pub fn pending_execution(issue_id: &str) -> ExecutionState {
    ExecutionState::pending(issue_id, 1_000_000)
}

/// A claimed execution-state row for tests.
pub fn claimed_execution(issue_id: &str, instance_id: &str) -> ExecutionState {
    let mut state = ExecutionState::pending(issue_id, 1_000_000);
    state.claim(InstanceId::new(instance_id), 1_000_001);
    state
}

/// An info event for tests, stamped with the given timestamp.
pub fn event_at(event_type: EventType, issue_id: &str, timestamp: u64) -> AgentEvent {
    let mut event = AgentEvent::new(event_type, Severity::Info, "test event");
    event.issue_id = Some(IssueId::new(issue_id));
    event.timestamp = timestamp;
    event
}
