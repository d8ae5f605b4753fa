// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-claim event sink and single-writer persistence.
//!
//! All producers for one claim (structured stream, regex parser, pipeline
//! steps) emit into one bounded channel drained by one writer task. The
//! single consumer serializes persistence, which yields the per-claim
//! ordering guarantee; the small channel capacity lets the writer apply
//! backpressure onto fast parsers.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vc_core::{AgentEvent, AgentId, Clock, InstanceId, IssueId};
use vc_store::IssueStore;

/// Channel capacity. Small by design: the writer's pace bounds the parsers.
const SINK_CAPACITY: usize = 64;

/// Identity stamped onto every event of a claim.
#[derive(Debug, Clone, Default)]
pub struct EventScope {
    pub issue_id: Option<IssueId>,
    pub executor_id: Option<InstanceId>,
    pub agent_id: Option<AgentId>,
}

/// Sending half: stamps scope + timestamps and forwards to the writer.
#[derive(Clone)]
pub struct EventSink<C: Clock> {
    tx: mpsc::Sender<AgentEvent>,
    scope: EventScope,
    clock: C,
    /// Last stamped timestamp; enforces nondecreasing order within the claim.
    last_ts: Arc<Mutex<u64>>,
}

impl<C: Clock> EventSink<C> {
    /// Create a sink and its channel receiver (to hand to [`EventWriter`]).
    pub fn channel(scope: EventScope, clock: C) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(SINK_CAPACITY);
        (
            Self {
                tx,
                scope,
                clock,
                last_ts: Arc::new(Mutex::new(0)),
            },
            rx,
        )
    }

    /// Stamp and submit one event. Returns `false` if the writer is gone.
    pub async fn emit(&self, mut event: AgentEvent) -> bool {
        if event.timestamp == 0 {
            event.timestamp = self.clock.wall_ms();
        }
        {
            let mut last = self.last_ts.lock();
            if event.timestamp < *last {
                event.timestamp = *last;
            }
            *last = event.timestamp;
        }
        if event.issue_id.is_none() {
            event.issue_id = self.scope.issue_id.clone();
        }
        if event.executor_id.is_none() {
            event.executor_id = self.scope.executor_id.clone();
        }
        if event.agent_id.is_none() {
            event.agent_id = self.scope.agent_id.clone();
        }

        self.tx.send(event).await.is_ok()
    }
}

/// The single writer task for one claim.
pub struct EventWriter {
    handle: JoinHandle<u64>,
}

impl EventWriter {
    /// Spawn the writer. It drains the channel until every sender is dropped,
    /// persisting events in arrival order.
    pub fn spawn(store: Arc<dyn IssueStore>, mut rx: mpsc::Receiver<AgentEvent>) -> Self {
        let handle = tokio::spawn(async move {
            let mut written = 0u64;
            while let Some(event) = rx.recv().await {
                match store.store_agent_event(event) {
                    Ok(()) => written += 1,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to persist agent event");
                    }
                }
            }
            written
        });
        Self { handle }
    }

    /// Wait for the writer to drain within `window`; on timeout the task is
    /// aborted (pending events are lost, which the shutdown budget accepts).
    pub async fn drain(self, window: std::time::Duration) -> u64 {
        let mut handle = self.handle;
        match tokio::time::timeout(window, &mut handle).await {
            Ok(Ok(written)) => written,
            Ok(Err(join_err)) => {
                tracing::warn!(error = %join_err, "event writer task failed");
                0
            }
            Err(_) => {
                tracing::warn!(
                    window_ms = window.as_millis() as u64,
                    "event writer drain timed out"
                );
                handle.abort();
                0
            }
        }
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
