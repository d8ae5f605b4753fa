// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality-gate pipeline.
//!
//! Gates run in configured order under per-gate timeouts and short-circuit on
//! the first failure. A gate only fails the run when it *regresses* against
//! the pre-agent baseline; a gate that was already failing before the agent
//! ran is reported but tolerated (degraded mode). Baselines are cached per
//! configuration fingerprint.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vc_agent::EventSink;
use vc_core::{to_data, AgentEvent, Clock, EventType, Severity};

/// One named check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub name: String,
    /// Run through `sh -c` in the sandbox.
    pub command: String,
    pub timeout: Duration,
}

impl GateConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            timeout: Duration::from_secs(10 * 60),
        }
    }

    /// No gates by default; projects configure their own build/test/lint.
    pub fn defaults() -> Vec<GateConfig> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateResult {
    Passed,
    Failed,
}

/// Per-gate outcome.
#[derive(Debug, Clone, Serialize)]
pub struct GateReport {
    pub name: String,
    pub status: GateStatus,
    /// Passed in baseline, fails now.
    pub regressed: bool,
    /// Already failing before the agent ran.
    pub baseline_failed: bool,
    pub duration_ms: u64,
}

/// Terminal result of a gate run.
#[derive(Debug, Clone)]
pub struct GatesOutcome {
    pub result: GateResult,
    /// Name of the regressing gate, if any.
    pub failing_gate: Option<String>,
    pub reports: Vec<GateReport>,
    pub duration_ms: u64,
    pub cancelled: bool,
}

impl GatesOutcome {
    pub fn passed(&self) -> bool {
        self.result == GateResult::Passed && !self.cancelled
    }
}

/// Pre-agent gate results, keyed by gate name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    pub fingerprint: String,
    pub results: HashMap<String, bool>,
}

#[derive(Serialize)]
struct GateProgressData<'a> {
    current_gate: &'a str,
    gates_completed: usize,
    total_gates: usize,
    elapsed_seconds: u64,
    message: String,
}

/// Runs the configured gate sequence.
pub struct GateRunner<C: Clock> {
    gates: Vec<GateConfig>,
    clock: C,
    cache: Mutex<HashMap<String, Baseline>>,
}

impl<C: Clock> GateRunner<C> {
    pub fn new(gates: Vec<GateConfig>, clock: C) -> Self {
        Self {
            gates,
            clock,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Cache key: gate names+commands plus the repo head they ran against.
    pub fn fingerprint(&self, head: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(head.as_bytes());
        for gate in &self.gates {
            hasher.update(gate.name.as_bytes());
            hasher.update([0]);
            hasher.update(gate.command.as_bytes());
            hasher.update([0]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Produce (or fetch) the pre-agent baseline for a workspace.
    pub async fn baseline(
        &self,
        workspace: &Path,
        head: &str,
        sink: &EventSink<C>,
    ) -> Baseline {
        let fingerprint = self.fingerprint(head);
        let cached = self.cache.lock().get(&fingerprint).cloned();
        if let Some(cached) = cached {
            sink.emit(
                AgentEvent::info(EventType::BaselineCacheHit, "baseline cache hit")
                    .with_field("fingerprint", fingerprint.clone()),
            )
            .await;
            return cached;
        }
        sink.emit(
            AgentEvent::info(EventType::BaselineCacheMiss, "baseline cache miss")
                .with_field("fingerprint", fingerprint.clone()),
        )
        .await;

        sink.emit(AgentEvent::info(
            EventType::PreFlightCheckStarted,
            "computing gate baseline",
        ))
        .await;

        let mut results = HashMap::new();
        for gate in &self.gates {
            let passed = run_gate_command(workspace, gate).await;
            results.insert(gate.name.clone(), passed);
        }

        sink.emit(
            AgentEvent::info(EventType::PreFlightCheckCompleted, "gate baseline ready")
                .with_field(
                    "failing_gates",
                    results.values().filter(|passed| !**passed).count() as u64,
                ),
        )
        .await;

        let baseline = Baseline {
            fingerprint: fingerprint.clone(),
            results,
        };
        self.cache.lock().insert(fingerprint, baseline.clone());
        baseline
    }

    /// Run the gates against post-agent sandbox state.
    pub async fn run(
        &self,
        workspace: &Path,
        baseline: &Baseline,
        sink: &EventSink<C>,
        cancel: &CancellationToken,
    ) -> GatesOutcome {
        let started = self.clock.monotonic();
        let total = self.gates.len();

        sink.emit(
            AgentEvent::info(EventType::QualityGatesStarted, "quality gates started")
                .with_field("total_gates", total as u64),
        )
        .await;

        let mut reports: Vec<GateReport> = Vec::with_capacity(total);
        let mut failing_gate: Option<String> = None;
        let mut cancelled = false;

        for (index, gate) in self.gates.iter().enumerate() {
            if cancelled || failing_gate.is_some() {
                reports.push(GateReport {
                    name: gate.name.clone(),
                    status: GateStatus::Skipped,
                    regressed: false,
                    baseline_failed: !baseline.results.get(&gate.name).copied().unwrap_or(true),
                    duration_ms: 0,
                });
                continue;
            }

            sink.emit(
                AgentEvent::info(
                    EventType::QualityGatesProgress,
                    format!("running gate {}", gate.name),
                )
                .with_data(to_data(&GateProgressData {
                    current_gate: &gate.name,
                    gates_completed: index,
                    total_gates: total,
                    elapsed_seconds: started.elapsed().as_secs(),
                    message: format!("gate {} of {}", index + 1, total),
                })),
            )
            .await;

            let gate_started = self.clock.monotonic();
            let passed = tokio::select! {
                passed = run_gate_command(workspace, gate) => passed,
                _ = cancel.cancelled() => {
                    cancelled = true;
                    reports.push(GateReport {
                        name: gate.name.clone(),
                        status: GateStatus::Skipped,
                        regressed: false,
                        baseline_failed: false,
                        duration_ms: gate_started.elapsed().as_millis() as u64,
                    });
                    continue;
                }
            };
            let duration_ms = gate_started.elapsed().as_millis() as u64;

            let baseline_passed = baseline.results.get(&gate.name).copied().unwrap_or(true);
            let regressed = baseline_passed && !passed;

            if !passed && !baseline_passed {
                // Pre-existing breakage: report, don't fail the run
                sink.emit(
                    AgentEvent::new(
                        EventType::ExecutorDegradedMode,
                        Severity::Warning,
                        format!("gate {} failing in baseline, tolerated", gate.name),
                    )
                    .with_field("gate", gate.name.clone()),
                )
                .await;
            }

            if regressed {
                failing_gate = Some(gate.name.clone());
            }

            reports.push(GateReport {
                name: gate.name.clone(),
                status: if passed {
                    GateStatus::Passed
                } else {
                    GateStatus::Failed
                },
                regressed,
                baseline_failed: !baseline_passed,
                duration_ms,
            });
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let result = if failing_gate.is_some() || cancelled {
            GateResult::Failed
        } else {
            GateResult::Passed
        };

        if cancelled {
            sink.emit(
                AgentEvent::new(
                    EventType::QualityGatesSkipped,
                    Severity::Warning,
                    "quality gates cancelled mid-run",
                )
                .with_field("gates_completed", reports
                    .iter()
                    .filter(|r| r.status != GateStatus::Skipped)
                    .count() as u64),
            )
            .await;
        } else {
            let terminal = match result {
                GateResult::Passed => AgentEvent::info(EventType::QualityGatePass, "gates passed"),
                GateResult::Failed => AgentEvent::new(
                    EventType::QualityGateFail,
                    Severity::Error,
                    format!(
                        "gate regression: {}",
                        failing_gate.as_deref().unwrap_or("none")
                    ),
                ),
            };
            sink.emit(
                terminal.with_field(
                    "failing_gate",
                    failing_gate.clone().unwrap_or_else(|| "none".to_string()),
                ),
            )
            .await;

            sink.emit(
                AgentEvent::info(EventType::QualityGatesCompleted, "quality gates completed")
                    .with_field(
                        "result",
                        match result {
                            GateResult::Passed => "passed",
                            GateResult::Failed => "failed",
                        },
                    )
                    .with_field(
                        "failing_gate",
                        failing_gate.clone().unwrap_or_else(|| "none".to_string()),
                    )
                    .with_field("duration_ms", duration_ms),
            )
            .await;
        }

        GatesOutcome {
            result,
            failing_gate,
            reports,
            duration_ms,
            cancelled,
        }
    }
}

/// Run one gate command; `false` on nonzero exit, spawn failure, or timeout.
async fn run_gate_command(workspace: &Path, gate: &GateConfig) -> bool {
    let child = tokio::process::Command::new("/bin/sh")
        .arg("-c")
        .arg(&gate.command)
        .current_dir(workspace)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(gate = %gate.name, error = %e, "gate command failed to spawn");
            return false;
        }
    };

    match tokio::time::timeout(gate.timeout, child.wait()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            tracing::warn!(gate = %gate.name, error = %e, "gate wait failed");
            false
        }
        Err(_) => {
            tracing::warn!(gate = %gate.name, "gate timed out");
            let _ = child.kill().await;
            let _ = child.wait().await;
            false
        }
    }
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
