// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor instance registration row.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::string_id! {
    /// Unique identifier (UUID) for a running executor process.
    pub struct InstanceId;
}

/// Lifecycle status of a registered executor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Stopped,
    Crashed,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Stopped => write!(f, "stopped"),
            InstanceStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// One row per running executor process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorInstance {
    pub id: InstanceId,
    pub hostname: String,
    pub pid: u32,
    pub version: String,
    pub status: InstanceStatus,
    pub started_at: u64,
    pub last_heartbeat: u64,
}

impl ExecutorInstance {
    pub fn new(
        id: impl Into<InstanceId>,
        hostname: impl Into<String>,
        pid: u32,
        version: impl Into<String>,
        now: u64,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            pid,
            version: version.into(),
            status: InstanceStatus::Running,
            started_at: now,
            last_heartbeat: now,
        }
    }

    /// Record a heartbeat. `last_heartbeat` is monotonic-nondecreasing for a
    /// live instance, so a late tick never moves it backwards.
    pub fn beat(&mut self, now: u64) {
        self.last_heartbeat = self.last_heartbeat.max(now);
    }

    /// True when no heartbeat has been written for longer than `threshold_ms`.
    pub fn is_stale(&self, now: u64, threshold_ms: u64) -> bool {
        self.status == InstanceStatus::Running
            && now.saturating_sub(self.last_heartbeat) > threshold_ms
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
