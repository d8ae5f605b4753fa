// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor configuration: defaults, env overrides, validation.

use crate::budget::BudgetConfig;
use crate::env;
use crate::error::EngineError;
use crate::gates::GateConfig;
use std::path::PathBuf;
use std::time::Duration;
use vc_store::EventRetention;

/// How the agent child process is invoked.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
    /// Window between graceful interrupt and hard kill.
    pub kill_grace: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: vec!["--output-format".to_string(), "stream-json".to_string()],
            env: Vec::new(),
            timeout: Duration::from_secs(30 * 60),
            kill_grace: Duration::from_secs(10),
        }
    }
}

/// Top-level executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll_interval: Duration,
    pub sandbox_root: PathBuf,
    pub parent_repo: PathBuf,
    pub sandboxes_enabled: bool,
    pub enable_auto_commit: bool,
    pub enable_auto_pr: bool,
    pub agent: AgentConfig,
    pub gates: Vec<GateConfig>,
    /// Ready-work fetch window per poll.
    pub claim_limit: usize,
    pub heartbeat_interval: Duration,
    pub watchdog_interval: Duration,
    /// No agent output for this long counts as a stall.
    pub stall_threshold: Duration,
    pub shutdown_grace: Duration,
    pub instance_cleanup_interval: Duration,
    pub instance_cleanup_age: Duration,
    pub instance_cleanup_keep: usize,
    pub event_cleanup_interval: Duration,
    pub retention: EventRetention,
    /// Run a store compaction after event cleanup.
    pub vacuum_after_cleanup: bool,
    pub budget: BudgetConfig,
    pub version: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            sandbox_root: PathBuf::from(".vc-sandboxes"),
            parent_repo: PathBuf::from("."),
            sandboxes_enabled: true,
            enable_auto_commit: false,
            enable_auto_pr: false,
            agent: AgentConfig::default(),
            gates: GateConfig::defaults(),
            claim_limit: 10,
            heartbeat_interval: Duration::from_secs(30),
            watchdog_interval: Duration::from_secs(60),
            stall_threshold: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(30),
            instance_cleanup_interval: Duration::from_secs(10 * 60),
            instance_cleanup_age: Duration::from_secs(60 * 60),
            instance_cleanup_keep: 5,
            event_cleanup_interval: Duration::from_secs(60 * 60),
            retention: EventRetention::default(),
            vacuum_after_cleanup: false,
            budget: BudgetConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Apply `VC_*` environment overrides over the current values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env::enable_auto_commit() {
            self.enable_auto_commit = v;
        }
        if let Some(v) = env::enable_auto_pr() {
            self.enable_auto_pr = v;
        }
        if let Some(v) = env::poll_interval() {
            self.poll_interval = v;
        }
        if let Some(v) = env::agent_timeout() {
            self.agent.timeout = v;
        }
        if let Some(v) = env::disable_sandboxes() {
            self.sandboxes_enabled = !v;
        }
        self
    }

    /// Reject configurations the executor must not start with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.poll_interval < Duration::from_secs(1) {
            return Err(EngineError::Precondition(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.enable_auto_pr && !self.enable_auto_commit {
            return Err(EngineError::Precondition(
                "auto-PR requires auto-commit (pass --enable-auto-commit)".to_string(),
            ));
        }
        if self.claim_limit == 0 {
            return Err(EngineError::Precondition(
                "claim limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
