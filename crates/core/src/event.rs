// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event records.
//!
//! Every observation the executor makes — agent output, gate progress, dedup
//! verdicts, watchdog alerts — becomes one immutable [`AgentEvent`] row.
//! Events are insertion-only; the retention passes prune them, nothing ever
//! updates one.

use crate::instance::InstanceId;
use crate::issue::IssueId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

crate::string_id! {
    /// Unique identifier (UUID) for an event row.
    pub struct EventId;
}

crate::string_id! {
    /// Identifier for one agent invocation (also the child's session id).
    pub struct AgentId;
}

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// The closed set of event types the executor emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    IssueClaimed,
    AssessmentStarted,
    AssessmentCompleted,
    AgentSpawned,
    AgentToolUse,
    AgentHeartbeat,
    AgentStateChange,
    FileModified,
    TestRun,
    GitOperation,
    BuildOutput,
    LintOutput,
    Progress,
    Error,
    WatchdogAlert,
    QualityGatesStarted,
    QualityGatesProgress,
    QualityGatesCompleted,
    QualityGatesSkipped,
    QualityGatePass,
    QualityGateFail,
    AnalysisStarted,
    AnalysisCompleted,
    ResultsProcessingStarted,
    ResultsProcessingCompleted,
    DeduplicationBatchStarted,
    DeduplicationDecision,
    DeduplicationBatchCompleted,
    BaselineCacheHit,
    BaselineCacheMiss,
    PreFlightCheckStarted,
    PreFlightCheckCompleted,
    ExecutorDegradedMode,
    ExecutorSelfHealingMode,
    BaselineTestFixStarted,
    BaselineTestFixCompleted,
    TestFailureDiagnosis,
    SandboxCreationStarted,
    SandboxCreationCompleted,
    SandboxCleanupStarted,
    SandboxCleanupCompleted,
    MissionCreated,
    EpicCompleted,
    EpicCleanupStarted,
    EpicCleanupCompleted,
    EventCleanupCompleted,
    HealthCheckCompleted,
    HealthCheckFailed,
    InstanceCleanupStarted,
    InstanceCleanupCompleted,
    ContextUsage,
    AgentCompleted,
}

impl EventType {
    /// The snake_case wire name of this event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::IssueClaimed => "issue_claimed",
            EventType::AssessmentStarted => "assessment_started",
            EventType::AssessmentCompleted => "assessment_completed",
            EventType::AgentSpawned => "agent_spawned",
            EventType::AgentToolUse => "agent_tool_use",
            EventType::AgentHeartbeat => "agent_heartbeat",
            EventType::AgentStateChange => "agent_state_change",
            EventType::FileModified => "file_modified",
            EventType::TestRun => "test_run",
            EventType::GitOperation => "git_operation",
            EventType::BuildOutput => "build_output",
            EventType::LintOutput => "lint_output",
            EventType::Progress => "progress",
            EventType::Error => "error",
            EventType::WatchdogAlert => "watchdog_alert",
            EventType::QualityGatesStarted => "quality_gates_started",
            EventType::QualityGatesProgress => "quality_gates_progress",
            EventType::QualityGatesCompleted => "quality_gates_completed",
            EventType::QualityGatesSkipped => "quality_gates_skipped",
            EventType::QualityGatePass => "quality_gate_pass",
            EventType::QualityGateFail => "quality_gate_fail",
            EventType::AnalysisStarted => "analysis_started",
            EventType::AnalysisCompleted => "analysis_completed",
            EventType::ResultsProcessingStarted => "results_processing_started",
            EventType::ResultsProcessingCompleted => "results_processing_completed",
            EventType::DeduplicationBatchStarted => "deduplication_batch_started",
            EventType::DeduplicationDecision => "deduplication_decision",
            EventType::DeduplicationBatchCompleted => "deduplication_batch_completed",
            EventType::BaselineCacheHit => "baseline_cache_hit",
            EventType::BaselineCacheMiss => "baseline_cache_miss",
            EventType::PreFlightCheckStarted => "pre_flight_check_started",
            EventType::PreFlightCheckCompleted => "pre_flight_check_completed",
            EventType::ExecutorDegradedMode => "executor_degraded_mode",
            EventType::ExecutorSelfHealingMode => "executor_self_healing_mode",
            EventType::BaselineTestFixStarted => "baseline_test_fix_started",
            EventType::BaselineTestFixCompleted => "baseline_test_fix_completed",
            EventType::TestFailureDiagnosis => "test_failure_diagnosis",
            EventType::SandboxCreationStarted => "sandbox_creation_started",
            EventType::SandboxCreationCompleted => "sandbox_creation_completed",
            EventType::SandboxCleanupStarted => "sandbox_cleanup_started",
            EventType::SandboxCleanupCompleted => "sandbox_cleanup_completed",
            EventType::MissionCreated => "mission_created",
            EventType::EpicCompleted => "epic_completed",
            EventType::EpicCleanupStarted => "epic_cleanup_started",
            EventType::EpicCleanupCompleted => "epic_cleanup_completed",
            EventType::EventCleanupCompleted => "event_cleanup_completed",
            EventType::HealthCheckCompleted => "health_check_completed",
            EventType::HealthCheckFailed => "health_check_failed",
            EventType::InstanceCleanupStarted => "instance_cleanup_started",
            EventType::InstanceCleanupCompleted => "instance_cleanup_completed",
            EventType::ContextUsage => "context_usage",
            EventType::AgentCompleted => "agent_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one observation.
///
/// Serializes to snake_case JSON and round-trips losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Epoch milliseconds, nondecreasing within a claim.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_id: Option<IssueId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor_id: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
}

impl AgentEvent {
    /// Create an event with a fresh UUID and the given type/severity/message.
    pub fn new(event_type: EventType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            id: EventId::new(uuid::Uuid::new_v4().to_string()),
            event_type,
            timestamp: 0,
            issue_id: None,
            executor_id: None,
            agent_id: None,
            severity,
            message: message.into(),
            data: Map::new(),
            source_line: None,
        }
    }

    /// Info-severity convenience constructor.
    pub fn info(event_type: EventType, message: impl Into<String>) -> Self {
        Self::new(event_type, Severity::Info, message)
    }

    pub fn with_issue(mut self, issue_id: impl Into<IssueId>) -> Self {
        self.issue_id = Some(issue_id.into());
        self
    }

    pub fn with_executor(mut self, instance_id: impl Into<InstanceId>) -> Self {
        self.executor_id = Some(instance_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<AgentId>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }
}

/// Serialize a typed payload into an event `data` map.
///
/// Non-object serializations (and serialization failures) yield an empty map;
/// payload structs are always plain field structs so this is unreachable in
/// practice.
pub fn to_data<T: Serialize>(payload: &T) -> Map<String, Value> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
