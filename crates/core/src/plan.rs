// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mission plans: a draft decomposition of a mission into ordered phases.

use crate::issue::IssueId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::string_id! {
    /// Unique identifier for a plan.
    pub struct PlanId;
}

/// Review status of a plan. Approved plans are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Refining,
    Validated,
    Approved,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Draft => write!(f, "draft"),
            PlanStatus::Refining => write!(f, "refining"),
            PlanStatus::Validated => write!(f, "validated"),
            PlanStatus::Approved => write!(f, "approved"),
        }
    }
}

/// One phase of a mission plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub phase_number: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub strategy: String,
    /// Ordered task summaries within the phase.
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_effort: Option<String>,
}

/// A mission's draft decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub mission_id: IssueId,
    pub phases: Vec<PlannedPhase>,
    /// Incremented on each refinement pass.
    pub iteration: u32,
    pub status: PlanStatus,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Plan {
    pub fn draft(
        id: impl Into<PlanId>,
        mission_id: impl Into<IssueId>,
        phases: Vec<PlannedPhase>,
        now: u64,
    ) -> Self {
        Self {
            id: id.into(),
            mission_id: mission_id.into(),
            phases,
            iteration: 1,
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == PlanStatus::Approved
    }
}
