// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vc-agent: coding-agent subprocess supervision.
//!
//! The runner spawns the agent as a child process inside the sandbox, streams
//! its stdout/stderr, and turns output into typed [`vc_core::AgentEvent`]s.
//! Structured NDJSON lines are decoded first (the authoritative path); lines
//! that are not structured go through the regex [`OutputParser`]. All events
//! flow into one per-claim [`EventSink`] drained by a single writer task,
//! which is what gives events their per-claim ordering guarantee.

mod parser;
mod report;
mod runner;
mod sink;
mod stream;

pub use parser::{
    BuildOutputData, FileModifiedData, FileOperation, GitOperationData, LintOutputData,
    OutputParser, ProgressData, TestRunData,
};
pub use report::{AgentReport, CandidateIssue};
pub use runner::{
    AgentInvocation, AgentLiveness, AgentOutcome, AgentRunner, AgentRunnerError,
};
pub use sink::{EventScope, EventSink, EventWriter};
pub use stream::StreamEvent;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
