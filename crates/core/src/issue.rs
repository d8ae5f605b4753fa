// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue model: the tracked unit of work.
//!
//! An issue is *ready* when it is open and every hard-blocker dependency
//! points at a closed issue. Readiness itself is computed by the store,
//! under the same lock as the claim predicate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

crate::string_id! {
    /// Stable identifier for an issue.
    pub struct IssueId;
}

/// Kind of work an issue represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Task,
    Bug,
    Epic,
    Mission,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Task => write!(f, "task"),
            IssueKind::Bug => write!(f, "bug"),
            IssueKind::Epic => write!(f, "epic"),
            IssueKind::Mission => write!(f, "mission"),
        }
    }
}

/// Lifecycle status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Closed,
    Blocked,
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueStatus::Open => write!(f, "open"),
            IssueStatus::InProgress => write!(f, "in_progress"),
            IssueStatus::Closed => write!(f, "closed"),
            IssueStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Issue priority: 0 (highest) through 3 (lowest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u8);

impl Priority {
    pub const P0: Priority = Priority(0);
    pub const P1: Priority = Priority(1);
    pub const P2: Priority = Priority(2);
    pub const P3: Priority = Priority(3);

    /// Construct a priority, rejecting values outside 0–3.
    pub fn new(value: u8) -> Option<Self> {
        (value <= 3).then_some(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P2
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Kind of a dependency edge between issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Target must be closed before the source is ready.
    HardBlocker,
    /// Source was discovered while working the target.
    DiscoveredFrom,
    ParentOf,
    Related,
}

/// Directed edge `issue -> depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub issue_id: IssueId,
    pub depends_on: IssueId,
    pub kind: DependencyKind,
}

/// A comment attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub created_at: u64,
}

/// A tracked unit of work.
///
/// Invariant: `status == Closed` exactly when `closed_at` is set. The
/// [`close`](Issue::close) and [`reopen`](Issue::reopen) helpers are the only
/// mutators of that pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub design: String,
    #[serde(default)]
    pub acceptance_criteria: String,
    pub kind: IssueKind,
    #[serde(default)]
    pub priority: Priority,
    pub status: IssueStatus,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
}

impl Issue {
    /// Create a new open issue.
    pub fn new(id: impl Into<IssueId>, title: impl Into<String>, kind: IssueKind, now: u64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            design: String::new(),
            acceptance_criteria: String::new(),
            kind,
            priority: Priority::default(),
            status: IssueStatus::Open,
            created_at: now,
            updated_at: now,
            closed_at: None,
            labels: BTreeSet::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == IssueStatus::Closed
    }

    /// Close the issue, setting `closed_at`.
    pub fn close(&mut self, now: u64) {
        self.status = IssueStatus::Closed;
        self.closed_at = Some(now);
        self.updated_at = now;
    }

    /// Reopen the issue, clearing `closed_at`.
    pub fn reopen(&mut self, now: u64) {
        self.status = IssueStatus::Open;
        self.closed_at = None;
        self.updated_at = now;
    }

    /// Move to a non-terminal status. Closing must go through [`close`](Issue::close).
    pub fn set_status(&mut self, status: IssueStatus, now: u64) {
        debug_assert!(status != IssueStatus::Closed, "use close() for terminal status");
        self.status = status;
        self.closed_at = None;
        self.updated_at = now;
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
