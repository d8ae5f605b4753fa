// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The executor: instance lifecycle and the work-claim loop.
//!
//! One instance per process, one active claim at a time. `start` registers
//! the instance and launches the claim loop plus the periodic tasks; `stop`
//! cancels the root token, waits out the in-flight claim within the shutdown
//! grace, and marks the instance stopped. Both are idempotent.

use crate::budget::{BudgetSnapshot, BudgetState, CostTracker};
use crate::error::EngineError;
use crate::loops;
use crate::pipeline::PipelineDeps;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vc_agent::{AgentLiveness, AgentRunner};
use vc_core::{Clock, ExecutorInstance, IdGen, InstanceId, Issue, IssueId, IssueStatus, UuidIdGen};
use vc_store::{IssueStore, WorkFilter};

/// Transient-store retry policy at the claim step.
const FETCH_RETRIES: u32 = 3;
const FETCH_BACKOFF: Duration = Duration::from_millis(200);

/// The claim currently being driven, if any.
pub struct ActiveClaim {
    pub issue_id: IssueId,
    pub cancel: CancellationToken,
    pub liveness: AgentLiveness,
}

/// State shared between the claim loop, the periodic tasks, and the control
/// surface.
pub struct Shared {
    pub instance_id: InstanceId,
    pub root: CancellationToken,
    pub paused: AtomicBool,
    pub active: Mutex<Option<ActiveClaim>>,
}

/// Alias kept for the daemon's type definitions.
pub type ExecutorDeps<C, I = UuidIdGen> = PipelineDeps<C, I>;

/// One executor process.
pub struct Executor<C: Clock, I: IdGen = UuidIdGen> {
    deps: Arc<PipelineDeps<C, I>>,
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl<C: Clock, I: IdGen + 'static> Executor<C, I> {
    pub fn new(deps: PipelineDeps<C, I>) -> Self {
        Self::with_instance_id(deps, InstanceId::new(uuid::Uuid::new_v4().to_string()))
    }

    pub fn with_instance_id(deps: PipelineDeps<C, I>, instance_id: InstanceId) -> Self {
        Self {
            deps: Arc::new(deps),
            shared: Arc::new(Shared {
                instance_id,
                root: CancellationToken::new(),
                paused: AtomicBool::new(false),
                active: Mutex::new(None),
            }),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.shared.instance_id
    }

    /// Control surface for the socket listener and the CLI.
    pub fn control(&self) -> ExecutorControl<C> {
        ExecutorControl {
            shared: Arc::clone(&self.shared),
            store: Arc::clone(&self.deps.store),
            budget: Arc::clone(&self.deps.budget),
        }
    }

    /// Register the instance and launch all tasks. Idempotent. Returns once
    /// everything is spawned.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.deps.config.validate()?;

        let now = self.deps.clock.wall_ms();
        let instance = ExecutorInstance::new(
            self.shared.instance_id.clone(),
            hostname(),
            std::process::id(),
            self.deps.config.version.clone(),
            now,
        );
        self.deps.store.register_instance(instance)?;

        tracing::info!(
            instance_id = %self.shared.instance_id,
            pid = std::process::id(),
            "executor instance registered"
        );

        let mut handles = self.handles.lock();
        handles.push(tokio::spawn(claim_loop(
            Arc::clone(&self.deps),
            Arc::clone(&self.shared),
        )));
        handles.push(loops::spawn_heartbeat(
            Arc::clone(&self.deps.store),
            self.shared.instance_id.clone(),
            self.deps.config.heartbeat_interval,
            self.shared.root.clone(),
        ));
        handles.push(loops::spawn_watchdog(
            Arc::clone(&self.deps.store),
            Arc::clone(&self.shared),
            self.deps.config.clone(),
            self.deps.clock.clone(),
            self.shared.root.clone(),
        ));
        handles.push(loops::spawn_instance_cleanup(
            Arc::clone(&self.deps.store),
            self.shared.instance_id.clone(),
            self.deps.config.clone(),
            self.deps.clock.clone(),
            self.shared.root.clone(),
        ));
        handles.push(loops::spawn_event_cleanup(
            Arc::clone(&self.deps.store),
            self.shared.instance_id.clone(),
            self.deps.config.clone(),
            self.deps.clock.clone(),
            self.shared.root.clone(),
        ));

        Ok(())
    }

    /// Graceful shutdown: cancel, wait for the in-flight claim to checkpoint
    /// or finish within the shutdown grace, mark the instance stopped.
    /// Idempotent.
    pub async fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) || self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!(instance_id = %self.shared.instance_id, "executor stopping");
        self.shared.root.cancel();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        let grace = self.deps.config.shutdown_grace;
        for handle in handles {
            let mut handle = handle;
            match tokio::time::timeout(grace, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("task did not stop within shutdown grace, aborting");
                    handle.abort();
                }
            }
        }

        self.mark_stopped();
        tracing::info!(instance_id = %self.shared.instance_id, "executor stopped");
    }

    /// Best-effort terminal store update; safe to call from deferred/exit
    /// paths, including after a panic elsewhere.
    pub fn mark_stopped(&self) {
        if let Err(e) = self.deps.store.mark_instance_stopped(&self.shared.instance_id) {
            tracing::warn!(error = %e, "failed to mark instance stopped");
        }
    }
}

/// The single-flight claim loop.
async fn claim_loop<C: Clock, I: IdGen + 'static>(
    deps: Arc<PipelineDeps<C, I>>,
    shared: Arc<Shared>,
) {
    let poll = deps.config.poll_interval;
    loop {
        if shared.root.is_cancelled() {
            break;
        }

        // Budget gate: exceeded pauses new claims, never the current one
        if deps.budget.state() == BudgetState::Exceeded {
            if !shared.paused.swap(true, Ordering::SeqCst) {
                tracing::warn!("cost budget exceeded; pausing new claims");
            }
        } else {
            shared.paused.store(false, Ordering::SeqCst);
            if let Some(issue) = next_claim(&deps, &shared).await {
                run_one_claim(&deps, &shared, issue).await;
            }
        }

        tokio::select! {
            _ = shared.root.cancelled() => break,
            _ = tokio::time::sleep(poll) => {}
        }
    }
}

/// Fetch ready work (with bounded retry) and attempt claims in order.
async fn next_claim<C: Clock, I: IdGen>(
    deps: &PipelineDeps<C, I>,
    shared: &Shared,
) -> Option<Issue> {
    let filter = WorkFilter::ready(deps.config.claim_limit);

    let mut work: Option<Vec<Issue>> = None;
    for attempt in 0..FETCH_RETRIES {
        match deps.store.get_ready_work(&filter) {
            Ok(items) => {
                work = Some(items);
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "ready-work fetch failed");
                tokio::time::sleep(FETCH_BACKOFF * 2u32.pow(attempt)).await;
            }
        }
    }

    for issue in work? {
        match deps
            .store
            .claim_issue(&issue.id, &shared.instance_id)
        {
            Ok(()) => {
                tracing::info!(issue_id = %issue.id, "claimed");
                return Some(issue);
            }
            Err(e) if e.is_claim_conflict() => continue,
            Err(e) => {
                tracing::warn!(error = %e, issue_id = %issue.id, "claim attempt failed");
                return None;
            }
        }
    }
    None
}

async fn run_one_claim<C: Clock, I: IdGen>(
    deps: &PipelineDeps<C, I>,
    shared: &Shared,
    issue: Issue,
) {
    let claim_cancel = shared.root.child_token();
    let runner = AgentRunner::new(deps.clock.clone());

    *shared.active.lock() = Some(ActiveClaim {
        issue_id: issue.id.clone(),
        cancel: claim_cancel.clone(),
        liveness: runner.liveness(),
    });

    let result = deps
        .run_claim(&shared.instance_id, &issue, &runner, &claim_cancel)
        .await;

    *shared.active.lock() = None;

    tracing::info!(
        issue_id = %issue.id,
        closed = result.closed,
        released = result.released,
        interrupted = result.interrupted,
        "claim finished"
    );
}

/// Point-in-time executor status for the control socket.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutorStatus {
    pub instance_id: String,
    pub active_issue: Option<String>,
    pub paused: bool,
    pub budget: BudgetSnapshot,
    pub events_total: usize,
}

/// Control surface handed to the socket listener.
#[derive(Clone)]
pub struct ExecutorControl<C: Clock> {
    shared: Arc<Shared>,
    store: Arc<dyn IssueStore>,
    budget: Arc<CostTracker<C>>,
}

impl<C: Clock> ExecutorControl<C> {
    /// Cancel the active claim for `issue_id`. The pipeline's interrupt path
    /// checkpoints, labels the issue `interrupted`, and releases.
    pub fn pause(&self, issue_id: &IssueId, reason: Option<&str>) -> Result<String, String> {
        let active = self.shared.active.lock();
        match active.as_ref() {
            Some(claim) if &claim.issue_id == issue_id => {
                claim.cancel.cancel();
                tracing::info!(
                    issue_id = %issue_id,
                    reason = reason.unwrap_or("none"),
                    "pause requested"
                );
                Ok(format!("pausing {issue_id}; claim will checkpoint and release"))
            }
            _ => {
                // Not active here: only meaningful if genuinely in progress
                match self.store.get_issue(issue_id) {
                    Ok(Some(issue)) if issue.status == IssueStatus::InProgress => Err(format!(
                        "issue {issue_id} is in progress on another instance"
                    )),
                    Ok(Some(_)) => Err(format!("issue {issue_id} is not in progress")),
                    Ok(None) => Err(format!("issue {issue_id} not found")),
                    Err(e) => Err(format!("store error: {e}")),
                }
            }
        }
    }

    /// Clear the `interrupted` label so the ready-work loop can re-pick the
    /// issue. Resuming a non-interrupted issue is a warning no-op.
    pub fn resume(&self, issue_id: &IssueId) -> Result<String, String> {
        match self.store.get_issue(issue_id) {
            Ok(Some(issue)) => {
                if !issue.has_label("interrupted") {
                    return Ok(format!(
                        "warning: issue {issue_id} is not interrupted; nothing to resume"
                    ));
                }
                self.store
                    .remove_label(issue_id, "interrupted")
                    .map_err(|e| format!("store error: {e}"))?;
                if issue.status != IssueStatus::Open && !issue.is_closed() {
                    self.store
                        .update_issue_status(issue_id, IssueStatus::Open)
                        .map_err(|e| format!("store error: {e}"))?;
                }
                Ok(format!("issue {issue_id} resumed; ready for pickup"))
            }
            Ok(None) => Err(format!("issue {issue_id} not found")),
            Err(e) => Err(format!("store error: {e}")),
        }
    }

    pub fn status(&self) -> ExecutorStatus {
        let active_issue = self
            .shared
            .active
            .lock()
            .as_ref()
            .map(|claim| claim.issue_id.to_string());
        let events_total = self
            .store
            .get_event_counts()
            .map(|counts| counts.total)
            .unwrap_or(0);
        ExecutorStatus {
            instance_id: self.shared.instance_id.to_string(),
            active_issue,
            paused: self.shared.paused.load(Ordering::SeqCst),
            budget: self.budget.snapshot(),
            events_total,
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
