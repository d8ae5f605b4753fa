// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic background tasks: heartbeat, watchdog, instance cleanup, event
//! cleanup. Each runs on its own interval and observes the root cancellation
//! token.

use crate::config::ExecutorConfig;
use crate::executor::Shared;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use vc_core::{AgentEvent, Clock, EventType, InstanceId, Severity};
use vc_store::IssueStore;

/// Write `last_heartbeat = now` every tick.
pub(crate) fn spawn_heartbeat(
    store: Arc<dyn IssueStore>,
    instance_id: InstanceId,
    interval: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = store.record_heartbeat(&instance_id) {
                        tracing::warn!(error = %e, "heartbeat write failed");
                    }
                }
            }
        }
    })
}

/// Detect stalled agents: no output within the stall threshold cancels the
/// claim (graceful; the runner escalates to a hard kill on its own).
pub(crate) fn spawn_watchdog<C: Clock>(
    store: Arc<dyn IssueStore>,
    shared: Arc<Shared>,
    config: ExecutorConfig,
    clock: C,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.watchdog_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let stalled = {
                        let active = shared.active.lock();
                        active.as_ref().and_then(|claim| {
                            let idle = claim.liveness.idle_for();
                            (idle > config.stall_threshold)
                                .then(|| (claim.issue_id.clone(), claim.cancel.clone(), idle))
                        })
                    };

                    let Some((issue_id, claim_cancel, idle)) = stalled else { continue };

                    tracing::warn!(
                        issue_id = %issue_id,
                        idle_secs = idle.as_secs(),
                        "watchdog: agent stalled, cancelling claim"
                    );
                    let mut event = AgentEvent::new(
                        EventType::WatchdogAlert,
                        Severity::Warning,
                        format!("agent stalled for {}s, cancelling", idle.as_secs()),
                    )
                    .with_issue(issue_id)
                    .with_field("idle_seconds", idle.as_secs());
                    event.timestamp = clock.wall_ms();
                    if let Err(e) = store.store_agent_event(event) {
                        tracing::warn!(error = %e, "failed to store watchdog event");
                    }
                    claim_cancel.cancel();
                }
            }
        }
    })
}

/// Mark long-silent instances stopped, keeping recent rows for history.
pub(crate) fn spawn_instance_cleanup<C: Clock>(
    store: Arc<dyn IssueStore>,
    instance_id: InstanceId,
    config: ExecutorConfig,
    clock: C,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.instance_cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let mut started = AgentEvent::info(
                        EventType::InstanceCleanupStarted,
                        "instance cleanup",
                    )
                    .with_executor(instance_id.clone());
                    started.timestamp = clock.wall_ms();
                    let _ = store.store_agent_event(started);

                    let stopped = match store.cleanup_instances(
                        config.instance_cleanup_age.as_millis() as u64,
                        config.instance_cleanup_keep,
                    ) {
                        Ok(stopped) => stopped,
                        Err(e) => {
                            tracing::warn!(error = %e, "instance cleanup failed");
                            continue;
                        }
                    };

                    let mut completed = AgentEvent::info(
                        EventType::InstanceCleanupCompleted,
                        format!("instance cleanup: {stopped} marked stopped"),
                    )
                    .with_executor(instance_id.clone())
                    .with_field("instances_stopped", stopped as u64);
                    completed.timestamp = clock.wall_ms();
                    let _ = store.store_agent_event(completed);
                }
            }
        }
    })
}

/// Retention-driven event pruning: age pass, per-issue cap, global cap.
pub(crate) fn spawn_event_cleanup<C: Clock>(
    store: Arc<dyn IssueStore>,
    instance_id: InstanceId,
    config: ExecutorConfig,
    clock: C,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.event_cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let retention = &config.retention;
                    let mut deleted = 0usize;
                    let passes: [Result<usize, vc_store::StoreError>; 3] = [
                        store.cleanup_events_by_age(retention),
                        store.cleanup_events_by_issue_limit(retention),
                        store.cleanup_events_by_global_limit(retention),
                    ];
                    let mut failed = false;
                    for pass in passes {
                        match pass {
                            Ok(n) => deleted += n,
                            Err(e) => {
                                failed = true;
                                tracing::warn!(error = %e, "event cleanup pass failed");
                            }
                        }
                    }

                    if config.vacuum_after_cleanup {
                        if let Err(e) = store.vacuum() {
                            tracing::warn!(error = %e, "vacuum after cleanup failed");
                        }
                    }

                    let mut completed = AgentEvent::info(
                        EventType::EventCleanupCompleted,
                        format!("event cleanup: {deleted} deleted"),
                    )
                    .with_executor(instance_id.clone())
                    .with_field("events_deleted", deleted as u64)
                    .with_field("success", !failed);
                    completed.timestamp = clock.wall_ms();
                    let _ = store.store_agent_event(completed);
                }
            }
        }
    })
}
