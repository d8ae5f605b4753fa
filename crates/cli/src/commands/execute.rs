// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc execute` — the daemon entry point, plus polecat mode.

use crate::exit_error::ExitError;
use clap::Args;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use vc_daemon::DaemonConfig;
use vc_engine::{run_polecat, GateConfig, PolecatDeps, PolecatTask};
use vc_store::{EmbeddedStore, IssueStore, StorePaths};

#[derive(Debug, Args)]
pub struct ExecuteArgs {
    /// Seconds between ready-work polls (minimum 1)
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,

    /// Run agents in the main workspace instead of per-claim worktrees
    #[arg(long)]
    pub disable_sandboxes: bool,

    /// Directory holding per-claim worktrees
    #[arg(long, value_name = "DIR")]
    pub sandbox_root: Option<PathBuf>,

    /// Repository the worktrees branch from
    #[arg(long, value_name = "DIR")]
    pub parent_repo: Option<PathBuf>,

    /// Commit sandbox changes when a claim closes
    #[arg(long)]
    pub enable_auto_commit: bool,

    /// Open a PR after the auto-commit (requires --enable-auto-commit)
    #[arg(long)]
    pub enable_auto_pr: bool,

    /// Agent binary to spawn
    #[arg(long, value_name = "PROGRAM")]
    pub agent: Option<String>,

    /// Named quality gate as NAME=COMMAND (repeatable, ordered)
    #[arg(long = "gate", value_name = "NAME=COMMAND")]
    pub gates: Vec<String>,

    /// Run exactly one task and exit with a JSON result
    #[arg(long)]
    pub polecat_mode: bool,

    /// Polecat: free-form task text
    #[arg(long, value_name = "TEXT")]
    pub task: Option<String>,

    /// Polecat: issue id to execute
    #[arg(long, value_name = "ID")]
    pub issue: Option<String>,
}

pub async fn run(project_root: &Path, args: ExecuteArgs) -> Result<(), ExitError> {
    if args.polecat_mode {
        return run_polecat_mode(project_root, args).await;
    }

    let mut config = DaemonConfig::for_project(project_root);
    apply_overrides(&mut config, &args)?;
    config
        .executor
        .validate()
        .map_err(|e| ExitError::precondition(e.to_string()))?;

    // Daemon mode logs to the store-adjacent file
    let _log_guard = vc_daemon::lifecycle::setup_logging(&config.paths.log_path)
        .map_err(ExitError::from)?;

    let daemon = vc_daemon::startup(config).await?;
    println!(
        "vc executor running (instance {})",
        daemon.executor.instance_id()
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
    }

    daemon.shutdown().await;
    Ok(())
}

async fn run_polecat_mode(project_root: &Path, args: ExecuteArgs) -> Result<(), ExitError> {
    let task = resolve_task(&args)?;

    let paths = StorePaths::for_project(project_root);
    let store = if paths.database_exists() {
        Some(Arc::new(EmbeddedStore::open_read_only(paths)?) as Arc<dyn IssueStore>)
    } else {
        None
    };

    let mut config = DaemonConfig::for_project(project_root);
    apply_overrides(&mut config, &args)?;

    let deps = PolecatDeps {
        store,
        agent: config.executor.agent.clone(),
        gates: config.executor.gates.clone(),
        workspace: config.executor.parent_repo.clone(),
        clock: vc_core::SystemClock,
    };

    let result = run_polecat(&deps, task).await;
    let json = serde_json::to_string_pretty(&result)
        .map_err(|e| ExitError::failure(format!("result serialization failed: {e}")))?;
    println!("{json}");

    if result.success {
        Ok(())
    } else {
        Err(ExitError::silent(result.exit_code()))
    }
}

fn resolve_task(args: &ExecuteArgs) -> Result<PolecatTask, ExitError> {
    match (&args.task, &args.issue) {
        (Some(_), Some(_)) => Err(ExitError::precondition(
            "pass --task or --issue, not both".to_string(),
        )),
        (Some(text), None) => Ok(PolecatTask::Text(text.clone())),
        (None, Some(id)) => Ok(PolecatTask::Issue(vc_core::IssueId::new(id.clone()))),
        (None, None) => {
            // Fall back to a stdin payload
            let mut payload = String::new();
            std::io::stdin()
                .read_to_string(&mut payload)
                .map_err(|e| ExitError::failure(format!("failed to read stdin: {e}")))?;
            Ok(PolecatTask::Stdin(payload))
        }
    }
}

fn apply_overrides(config: &mut DaemonConfig, args: &ExecuteArgs) -> Result<(), ExitError> {
    if let Some(secs) = args.poll_interval {
        config.executor.poll_interval = std::time::Duration::from_secs(secs);
    }
    if args.disable_sandboxes {
        config.executor.sandboxes_enabled = false;
    }
    if let Some(root) = &args.sandbox_root {
        config.executor.sandbox_root = root.clone();
    }
    if let Some(repo) = &args.parent_repo {
        config.executor.parent_repo = repo.clone();
    }
    if args.enable_auto_commit {
        config.executor.enable_auto_commit = true;
    }
    if args.enable_auto_pr {
        config.executor.enable_auto_pr = true;
    }
    if let Some(program) = &args.agent {
        config.executor.agent.program = program.clone();
        config.executor.agent.args = Vec::new();
    }
    if !args.gates.is_empty() {
        config.executor.gates = args
            .gates
            .iter()
            .map(|spec| parse_gate(spec))
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(())
}

fn parse_gate(spec: &str) -> Result<GateConfig, ExitError> {
    match spec.split_once('=') {
        Some((name, command)) if !name.is_empty() && !command.is_empty() => {
            Ok(GateConfig::new(name, command))
        }
        _ => Err(ExitError::precondition(format!(
            "invalid gate `{spec}`; expected NAME=COMMAND"
        ))),
    }
}

#[cfg(test)]
#[path = "execute_tests.rs"]
mod tests;
