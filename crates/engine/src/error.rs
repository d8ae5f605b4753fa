// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.
//!
//! Precondition errors map to exit code 2 at the CLI; everything else is a
//! recoverable (exit 1) failure. Claim conflicts and cancellation are not
//! errors at all and never appear here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Fail-fast startup problems: no database, stale database, bad config,
    /// lock held by another owner. Carries a remediation message.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("store error: {0}")]
    Store(#[from] vc_store::StoreError),

    #[error("sandbox error: {0}")]
    Sandbox(String),

    #[error("git error: {0}")]
    Git(#[from] crate::sandbox::GitError),

    #[error("agent error: {0}")]
    Agent(#[from] vc_agent::AgentRunnerError),

    #[error("supervisor error: {0}")]
    Supervisor(#[from] crate::supervisor::SupervisorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Exit code 2 class (see the CLI's error mapping).
    pub fn is_precondition(&self) -> bool {
        matches!(self, EngineError::Precondition(_))
    }
}
