// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-claim execution pipeline.
//!
//! sandbox create -> baseline -> assess -> agent -> quality gates -> analyze
//! -> dedup -> finalize -> sandbox cleanup. Non-fatal step failures become
//! events and the pipeline moves on; only sandbox-create failure, store
//! unavailability, or cancellation short-circuit. Cleanup and the event
//! writer drain run on every path.

use crate::budget::CostTracker;
use crate::config::ExecutorConfig;
use crate::dedup::DedupEngine;
use crate::gates::GateRunner;
use crate::sandbox::{GitBackend, Sandbox, SandboxManager};
use crate::supervisor::Supervisor;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use vc_agent::{
    AgentInvocation, AgentOutcome, AgentRunner, CandidateIssue, EventScope, EventSink,
    EventWriter,
};
use vc_core::{
    AgentEvent, AgentId, Clock, EventType, ExecutionPhase, IdGen, InstanceId, Issue, IssueKind,
    Severity, UuidIdGen,
};
use vc_store::IssueStore;

/// Shared dependencies for claim execution.
pub struct PipelineDeps<C: Clock, I: IdGen = UuidIdGen> {
    pub store: Arc<dyn IssueStore>,
    pub supervisor: Arc<dyn Supervisor>,
    pub git: Arc<dyn GitBackend>,
    pub sandboxes: SandboxManager,
    pub gates: GateRunner<C>,
    pub dedup: DedupEngine<I>,
    pub budget: Arc<CostTracker<C>>,
    pub config: ExecutorConfig,
    pub clock: C,
}

/// How a claim ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimResult {
    pub closed: bool,
    pub released: bool,
    pub interrupted: bool,
}

impl<C: Clock, I: IdGen> PipelineDeps<C, I> {
    /// Drive one claimed issue through the pipeline.
    ///
    /// Never returns an error: failures are recorded as events and resolved
    /// into a release. The caller already holds the claim.
    pub async fn run_claim(
        &self,
        instance_id: &InstanceId,
        issue: &Issue,
        runner: &AgentRunner<C>,
        cancel: &CancellationToken,
    ) -> ClaimResult {
        let agent_id = AgentId::new(uuid::Uuid::new_v4().to_string());
        let scope = EventScope {
            issue_id: Some(issue.id.clone()),
            executor_id: Some(instance_id.clone()),
            agent_id: Some(agent_id.clone()),
        };
        let (sink, rx) = EventSink::channel(scope, self.clock.clone());
        let writer = EventWriter::spawn(Arc::clone(&self.store), rx);

        let result = self
            .drive(instance_id, issue, agent_id, runner, cancel, &sink)
            .await;

        drop(sink);
        writer.drain(self.config.shutdown_grace).await;
        result
    }

    async fn drive(
        &self,
        _instance_id: &InstanceId,
        issue: &Issue,
        agent_id: AgentId,
        runner: &AgentRunner<C>,
        cancel: &CancellationToken,
        sink: &EventSink<C>,
    ) -> ClaimResult {
        let now = self.clock.wall_ms();
        sink.emit(
            AgentEvent::info(EventType::IssueClaimed, format!("claimed {}", issue.id))
                .with_field("priority", u64::from(issue.priority.value()))
                .with_field("kind", issue.kind.to_string()),
        )
        .await;

        // 1. Sandbox
        sink.emit(AgentEvent::info(
            EventType::SandboxCreationStarted,
            "creating sandbox",
        ))
        .await;
        let sandbox = match self.sandboxes.create(&issue.id, now).await {
            Ok(sandbox) => {
                sink.emit(
                    AgentEvent::info(EventType::SandboxCreationCompleted, "sandbox ready")
                        .with_field("success", true)
                        .with_field("path", sandbox.path.display().to_string())
                        .with_field("branch", sandbox.branch.clone()),
                )
                .await;
                sandbox
            }
            Err(e) => {
                sink.emit(
                    AgentEvent::new(
                        EventType::SandboxCreationCompleted,
                        Severity::Error,
                        format!("sandbox creation failed: {e}"),
                    )
                    .with_field("success", false),
                )
                .await;
                self.release(issue, None, false).await;
                return ClaimResult {
                    released: true,
                    ..Default::default()
                };
            }
        };

        // 2. Baseline before the agent mutates anything
        let baseline = if self.gates.is_empty() {
            None
        } else {
            let head = match self.git.head(&self.config.parent_repo).await {
                Ok(head) => head,
                Err(e) => {
                    tracing::debug!(error = %e, "could not resolve repo head for baseline");
                    "unknown-head".to_string()
                }
            };
            Some(self.gates.baseline(&sandbox.path, &head, sink).await)
        };

        // 3. Assessment (non-fatal)
        sink.emit(AgentEvent::info(
            EventType::AssessmentStarted,
            "assessing issue",
        ))
        .await;
        match self.supervisor.assess_issue(issue).await {
            Ok(assessment) => {
                self.budget.record(assessment.usage);
                sink.emit(
                    AgentEvent::info(EventType::AssessmentCompleted, "assessment complete")
                        .with_field("confidence", assessment.confidence)
                        .with_field("estimated_effort", assessment.estimated_effort)
                        .with_field("risks", assessment.risks.len() as u64),
                )
                .await;
            }
            Err(e) => {
                sink.emit(AgentEvent::new(
                    EventType::Error,
                    Severity::Warning,
                    format!("assessment failed: {e}"),
                ))
                .await;
            }
        }

        // 4. Agent
        self.set_phase(&issue.id, ExecutionPhase::InAgent);
        let checkpoint = self
            .store
            .get_execution_state(&issue.id)
            .ok()
            .flatten()
            .and_then(|exec| exec.checkpoint);
        let invocation = AgentInvocation {
            agent_id,
            program: self.config.agent.program.clone(),
            args: self.config.agent.args.clone(),
            env: self.config.agent.env.clone(),
            cwd: sandbox.path.clone(),
            brief: format_brief(issue),
            checkpoint,
            timeout: self.config.agent.timeout,
            kill_grace: self.config.agent.kill_grace,
        };
        let outcome = match runner.run(invocation, sink, cancel).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                sink.emit(AgentEvent::new(
                    EventType::Error,
                    Severity::Error,
                    format!("agent runner failed: {e}"),
                ))
                .await;
                None
            }
        };

        // 5. Quality gates
        let gates_outcome = match (&outcome, &baseline) {
            (Some(_), Some(baseline)) => {
                self.set_phase(&issue.id, ExecutionPhase::InGates);
                Some(self.gates.run(&sandbox.path, baseline, sink, cancel).await)
            }
            _ => None,
        };

        // 6. Result analysis + 7. dedup (still run after cancellation so the
        // partial result is persisted and discovered work is not lost)
        let mut discovered: Vec<CandidateIssue> = outcome
            .as_ref()
            .and_then(|o| o.report.as_ref())
            .map(|r| r.discovered_issues.clone())
            .unwrap_or_default();

        if let Some(outcome) = &outcome {
            sink.emit(AgentEvent::info(
                EventType::AnalysisStarted,
                "analyzing agent result",
            ))
            .await;
            match self.supervisor.analyze_result(issue, outcome).await {
                Ok(analysis) => {
                    self.budget.record(analysis.usage);
                    sink.emit(
                        AgentEvent::info(EventType::AnalysisCompleted, "analysis complete")
                            .with_field("confidence", analysis.confidence)
                            .with_field("discovered", analysis.discovered_issues.len() as u64),
                    )
                    .await;
                    if let Some(diagnosis) = &analysis.test_failure_diagnosis {
                        sink.emit(
                            AgentEvent::new(
                                EventType::TestFailureDiagnosis,
                                Severity::Warning,
                                diagnosis.clone(),
                            )
                            .with_field("diagnosis", diagnosis.clone()),
                        )
                        .await;
                    }
                    discovered.extend(analysis.discovered_issues);
                }
                Err(e) => {
                    sink.emit(AgentEvent::new(
                        EventType::Error,
                        Severity::Warning,
                        format!("result analysis failed: {e}"),
                    ))
                    .await;
                }
            }
        }

        sink.emit(AgentEvent::info(
            EventType::ResultsProcessingStarted,
            "processing results",
        ))
        .await;
        if !discovered.is_empty() {
            self.dedup
                .run(&issue.id, discovered, sink, self.clock.wall_ms())
                .await;
        }
        sink.emit(AgentEvent::info(
            EventType::ResultsProcessingCompleted,
            "results processed",
        ))
        .await;

        // 8. Finalize
        let interrupted = cancel.is_cancelled()
            || outcome.as_ref().map(|o| o.interrupted).unwrap_or(false);
        let gates_passed = gates_outcome.as_ref().map(|g| g.passed()).unwrap_or(true);
        let agent_success = outcome.as_ref().map(|o| o.success).unwrap_or(false);
        let success = agent_success && gates_passed && !interrupted;

        let result = if success {
            self.finalize_success(issue, &sandbox, sink).await
        } else {
            self.release(issue, outcome.as_ref(), interrupted).await;
            ClaimResult {
                released: true,
                interrupted,
                ..Default::default()
            }
        };

        // 9. Sandbox cleanup, both paths
        sink.emit(AgentEvent::info(
            EventType::SandboxCleanupStarted,
            "cleaning up sandbox",
        ))
        .await;
        match self.sandboxes.cleanup(&sandbox).await {
            Ok(()) => {
                sink.emit(
                    AgentEvent::info(EventType::SandboxCleanupCompleted, "sandbox removed")
                        .with_field("success", true),
                )
                .await;
            }
            Err(e) => {
                sink.emit(
                    AgentEvent::new(
                        EventType::SandboxCleanupCompleted,
                        Severity::Warning,
                        format!("sandbox cleanup failed: {e}"),
                    )
                    .with_field("success", false),
                )
                .await;
            }
        }

        result
    }

    async fn finalize_success(
        &self,
        issue: &Issue,
        sandbox: &Sandbox,
        sink: &EventSink<C>,
    ) -> ClaimResult {
        if self.config.enable_auto_commit && !sandbox.main_workspace {
            let message = format!("{}: {}", issue.id, issue.title);
            match self.git.commit_all(&sandbox.path, &message).await {
                Ok(()) => {
                    sink.emit(
                        AgentEvent::info(EventType::GitOperation, "auto-commit")
                            .with_field("command", "commit")
                            .with_field("branch", sandbox.branch.clone()),
                    )
                    .await;

                    if self.config.enable_auto_pr {
                        match self
                            .git
                            .open_pr(&sandbox.path, &sandbox.branch, &issue.title)
                            .await
                        {
                            Ok(()) => {
                                sink.emit(
                                    AgentEvent::new(
                                        EventType::GitOperation,
                                        Severity::Warning,
                                        "auto-PR opened",
                                    )
                                    .with_field("command", "push")
                                    .with_field("branch", sandbox.branch.clone()),
                                )
                                .await;
                            }
                            Err(e) => {
                                sink.emit(AgentEvent::new(
                                    EventType::Error,
                                    Severity::Warning,
                                    format!("auto-PR failed: {e}"),
                                ))
                                .await;
                            }
                        }
                    }
                }
                Err(e) => {
                    sink.emit(AgentEvent::new(
                        EventType::Error,
                        Severity::Warning,
                        format!("auto-commit failed: {e}"),
                    ))
                    .await;
                }
            }
        }

        if let Err(e) = self.store.close_issue(&issue.id) {
            // Store unavailable at the finish line: fall back to release so
            // the claim is not wedged.
            tracing::warn!(error = %e, issue_id = %issue.id, "close failed, releasing");
            self.release(issue, None, false).await;
            return ClaimResult {
                released: true,
                ..Default::default()
            };
        }

        if issue.kind == IssueKind::Epic {
            sink.emit(
                AgentEvent::info(EventType::EpicCompleted, format!("epic {} closed", issue.id))
                    .with_field("issue", issue.id.to_string()),
            )
            .await;
        }

        ClaimResult {
            closed: true,
            ..Default::default()
        }
    }

    /// Release the claim; on interrupt also persist the checkpoint and label
    /// the issue so `resume` can bring it back.
    async fn release(&self, issue: &Issue, outcome: Option<&AgentOutcome>, interrupted: bool) {
        if interrupted {
            if let Some(checkpoint) = outcome.and_then(|o| o.checkpoint.as_deref()) {
                if let Err(e) = self.store.save_checkpoint(&issue.id, checkpoint) {
                    tracing::warn!(error = %e, "failed to save checkpoint");
                }
            }
            if let Err(e) = self.store.add_label(&issue.id, "interrupted") {
                tracing::warn!(error = %e, "failed to add interrupted label");
            }
        }
        if let Err(e) = self.store.release_issue(&issue.id) {
            tracing::warn!(error = %e, issue_id = %issue.id, "release failed");
        }
    }

    fn set_phase(&self, issue_id: &vc_core::IssueId, phase: ExecutionPhase) {
        if let Err(e) = self.store.set_execution_phase(issue_id, phase) {
            tracing::debug!(error = %e, "failed to record execution phase");
        }
    }
}

/// Render an issue into the agent's natural-language brief.
pub fn format_brief(issue: &Issue) -> String {
    let mut brief = format!("# {}: {}\n", issue.id, issue.title);
    if !issue.description.is_empty() {
        brief.push_str(&format!("\n## Description\n\n{}\n", issue.description));
    }
    if !issue.design.is_empty() {
        brief.push_str(&format!("\n## Design\n\n{}\n", issue.design));
    }
    if !issue.acceptance_criteria.is_empty() {
        brief.push_str(&format!(
            "\n## Acceptance criteria\n\n{}\n",
            issue.acceptance_criteria
        ));
    }
    brief
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
