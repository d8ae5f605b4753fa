// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vc-engine: the executor's work loop and execution pipeline.
//!
//! One [`Executor`] instance per process. It registers itself, polls for
//! ready work, claims one issue at a time, and drives each claim through the
//! pipeline: sandbox, assessment, agent, quality gates, result analysis,
//! deduplication, finalize, cleanup. Heartbeat, watchdog, and cleanup tasks
//! run alongside and all observe the root cancellation token.

pub mod budget;
pub mod config;
pub mod dedup;
mod env;
pub mod error;
pub mod executor;
pub mod gates;
pub mod pipeline;
pub mod polecat;
pub mod sandbox;
pub mod supervisor;

mod loops;

#[cfg(test)]
mod test_helpers;

pub use budget::{BudgetConfig, BudgetSnapshot, BudgetState, CostTracker};
pub use config::{AgentConfig, ExecutorConfig};
pub use dedup::{DedupConfig, DedupEngine, DedupStats};
pub use error::EngineError;
pub use executor::{Executor, ExecutorControl, ExecutorDeps, ExecutorStatus};
pub use gates::{
    Baseline, GateConfig, GateReport, GateResult, GateRunner, GateStatus, GatesOutcome,
};
pub use pipeline::{format_brief, ClaimResult, PipelineDeps};
pub use polecat::{run_polecat, PolecatDeps, PolecatResult, PolecatTask};
pub use sandbox::{BranchInfo, CliGit, GitBackend, GitError, Sandbox, SandboxManager};
pub use supervisor::{
    AiUsage, Assessment, DuplicateVerdict, HeuristicSupervisor, ResultAnalysis, Supervisor,
    SupervisorError,
};

#[cfg(any(test, feature = "test-support"))]
pub use sandbox::FakeGit;
#[cfg(any(test, feature = "test-support"))]
pub use supervisor::FakeSupervisor;
