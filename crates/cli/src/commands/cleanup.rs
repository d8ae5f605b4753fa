// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc cleanup` — branch and event maintenance.

use super::open_store_for_writing;
use crate::exit_error::ExitError;
use clap::{Args, Subcommand};
use std::path::Path;
use std::sync::Arc;
use vc_engine::{CliGit, SandboxManager};
use vc_store::{EventRetention, IssueStore, StorePaths};

#[derive(Debug, Args)]
pub struct CleanupArgs {
    #[command(subcommand)]
    pub target: CleanupTarget,
}

#[derive(Debug, Subcommand)]
pub enum CleanupTarget {
    /// Delete orphaned mission/* branches (worktree gone, older than N days)
    Branches {
        /// Minimum branch age in days
        #[arg(long, default_value_t = 7)]
        days: u64,

        /// Print what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the event-retention passes
    Events {
        #[arg(long, default_value_t = 30)]
        retention_days: u64,

        #[arg(long, default_value_t = 90)]
        retention_critical_days: u64,

        #[arg(long, default_value_t = 1000)]
        per_issue_limit: usize,

        #[arg(long, default_value_t = 100_000)]
        global_limit: usize,

        /// Compact the store afterwards
        #[arg(long)]
        vacuum: bool,

        /// Not yet supported for events
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn run(project_root: &Path, args: CleanupArgs) -> Result<(), ExitError> {
    match args.target {
        CleanupTarget::Branches { days, dry_run } => branches(project_root, days, dry_run).await,
        CleanupTarget::Events {
            retention_days,
            retention_critical_days,
            per_issue_limit,
            global_limit,
            vacuum,
            dry_run,
        } => {
            if dry_run {
                return Err(ExitError::precondition(
                    "cleanup events --dry-run is not yet supported".to_string(),
                ));
            }
            events(
                project_root,
                EventRetention {
                    retention_days,
                    retention_critical_days,
                    per_issue_limit,
                    global_limit,
                    ..EventRetention::default()
                },
                vacuum,
            )
        }
    }
}

async fn branches(project_root: &Path, days: u64, dry_run: bool) -> Result<(), ExitError> {
    let paths = StorePaths::for_project(project_root);
    let manager = SandboxManager::new(
        paths.store_dir().join("sandboxes"),
        project_root.to_path_buf(),
        true,
        Arc::new(CliGit),
    );

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let doomed = manager
        .cleanup_orphaned_branches(days, dry_run, now)
        .await
        .map_err(|e| ExitError::failure(e.to_string()))?;

    if doomed.is_empty() {
        println!("no orphaned mission branches older than {days} days");
    } else {
        let verb = if dry_run { "would delete" } else { "deleted" };
        for branch in &doomed {
            println!("{verb} {branch}");
        }
    }
    Ok(())
}

fn events(
    project_root: &Path,
    retention: EventRetention,
    vacuum: bool,
) -> Result<(), ExitError> {
    let store = open_store_for_writing(project_root)?;

    let by_age = store.cleanup_events_by_age(&retention)?;
    let by_issue = store.cleanup_events_by_issue_limit(&retention)?;
    let by_global = store.cleanup_events_by_global_limit(&retention)?;
    let events_deleted = by_age + by_issue + by_global;
    println!(
        "events_deleted={events_deleted} (age={by_age}, per_issue={by_issue}, global={by_global})"
    );

    if vacuum {
        store.vacuum()?;
        println!("store compacted");
    }
    Ok(())
}
