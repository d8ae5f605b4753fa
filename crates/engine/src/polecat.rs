// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polecat: the single-task, non-daemon path.
//!
//! No claim, no instance registration, no store writes. One task in, one
//! JSON result out on stdout, exit 0/1. Events are collected in memory and
//! embedded in the result instead of being persisted.

use crate::config::AgentConfig;
use crate::gates::{GateConfig, GateRunner};
use crate::pipeline::format_brief;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vc_agent::{AgentInvocation, AgentRunner, EventScope, EventSink};
use vc_core::{AgentEvent, AgentId, Clock, IssueId};
use vc_store::IssueStore;

/// Where the single task comes from.
#[derive(Debug, Clone)]
pub enum PolecatTask {
    /// Free-form task text.
    Text(String),
    /// An issue id to load and format as the brief.
    Issue(IssueId),
    /// A payload read from stdin.
    Stdin(String),
}

/// Dependencies for a polecat run.
pub struct PolecatDeps<C: Clock> {
    /// Only needed to resolve `PolecatTask::Issue`.
    pub store: Option<Arc<dyn IssueStore>>,
    pub agent: AgentConfig,
    pub gates: Vec<GateConfig>,
    pub workspace: PathBuf,
    pub clock: C,
}

/// The JSON result printed to stdout.
#[derive(Debug, Serialize)]
pub struct PolecatResult {
    pub success: bool,
    pub status: String,
    pub duration_ms: u64,
    pub files_changed: Vec<String>,
    pub events: Vec<AgentEvent>,
    pub errors: Vec<String>,
}

impl PolecatResult {
    fn failed(error: String) -> Self {
        Self {
            success: false,
            status: "failed".to_string(),
            duration_ms: 0,
            files_changed: Vec::new(),
            events: Vec::new(),
            errors: vec![error],
        }
    }

    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success)
    }
}

/// Execute exactly one task and return its result.
pub async fn run_polecat<C: Clock>(deps: &PolecatDeps<C>, task: PolecatTask) -> PolecatResult {
    let brief = match resolve_brief(deps, &task) {
        Ok(brief) => brief,
        Err(error) => return PolecatResult::failed(error),
    };

    let (sink, mut rx) = EventSink::channel(EventScope::default(), deps.clock.clone());
    let events = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let collect_events = Arc::clone(&events);
    let collector = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            collect_events.lock().push(event);
        }
    });

    let cancel = CancellationToken::new();

    // Baseline before the agent mutates the workspace
    let gate_runner = (!deps.gates.is_empty())
        .then(|| GateRunner::new(deps.gates.clone(), deps.clock.clone()));
    let baseline = match &gate_runner {
        Some(gate_runner) => Some(
            gate_runner
                .baseline(&deps.workspace, "polecat", &sink)
                .await,
        ),
        None => None,
    };

    let runner = AgentRunner::new(deps.clock.clone());
    let invocation = AgentInvocation {
        agent_id: AgentId::new(uuid::Uuid::new_v4().to_string()),
        program: deps.agent.program.clone(),
        args: deps.agent.args.clone(),
        env: deps.agent.env.clone(),
        cwd: deps.workspace.clone(),
        brief,
        checkpoint: None,
        timeout: deps.agent.timeout,
        kill_grace: deps.agent.kill_grace,
    };

    let mut errors = Vec::new();

    let outcome = match runner.run(invocation, &sink, &cancel).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            errors.push(e.to_string());
            None
        }
    };

    // Gates run against the workspace state the agent left behind
    let gates_passed = match (&gate_runner, &baseline, &outcome) {
        (Some(gate_runner), Some(baseline), Some(_)) => {
            let gates = gate_runner
                .run(&deps.workspace, baseline, &sink, &cancel)
                .await;
            if let Some(failing) = &gates.failing_gate {
                errors.push(format!("gate regression: {failing}"));
            }
            gates.passed()
        }
        (None, _, _) => true,
        _ => false,
    };

    drop(sink);
    if let Err(e) = collector.await {
        tracing::warn!(error = %e, "event collector failed");
    }

    let events = std::mem::take(&mut *events.lock());
    let (success, status, duration_ms, files_changed) = match outcome {
        Some(outcome) => {
            if let Some(report) = &outcome.report {
                errors.extend(report.errors.iter().cloned());
            }
            let status = if outcome.timed_out {
                "timeout"
            } else if outcome.success && gates_passed {
                "succeeded"
            } else {
                "failed"
            };
            (
                outcome.success && gates_passed && !outcome.timed_out,
                status.to_string(),
                outcome.duration_ms,
                outcome.files_modified.iter().cloned().collect(),
            )
        }
        None => (false, "failed".to_string(), 0, Vec::new()),
    };

    PolecatResult {
        success,
        status,
        duration_ms,
        files_changed,
        events,
        errors,
    }
}

fn resolve_brief<C: Clock>(deps: &PolecatDeps<C>, task: &PolecatTask) -> Result<String, String> {
    match task {
        PolecatTask::Text(text) | PolecatTask::Stdin(text) => {
            if text.trim().is_empty() {
                Err("empty task".to_string())
            } else {
                Ok(text.clone())
            }
        }
        PolecatTask::Issue(issue_id) => {
            let store = deps
                .store
                .as_ref()
                .ok_or_else(|| "no store available to load issue".to_string())?;
            let issue = store
                .get_issue(issue_id)
                .map_err(|e| format!("store error: {e}"))?
                .ok_or_else(|| format!("issue {issue_id} not found"))?;
            Ok(format_brief(&issue))
        }
    }
}

#[cfg(test)]
#[path = "polecat_tests.rs"]
mod tests;
