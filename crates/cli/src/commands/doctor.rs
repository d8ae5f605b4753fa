// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc doctor` — diagnose the store layout; `--fix` re-imports the feed.

use super::process_exists;
use crate::exit_error::ExitError;
use clap::Args;
use std::io::BufRead;
use std::path::Path;
use vc_core::Issue;
use vc_daemon::ExclusiveLock;
use vc_store::{validate_freshness, EmbeddedStore, FreshnessReport, IssueStore, StorePaths};

#[derive(Debug, Args)]
pub struct DoctorArgs {
    /// Repair what can be repaired (currently: re-import a stale database)
    #[arg(long)]
    pub fix: bool,
}

pub fn run(project_root: &Path, args: DoctorArgs) -> Result<(), ExitError> {
    let paths = StorePaths::for_project(project_root);
    let mut problems = 0usize;

    // Database presence
    if !paths.database_exists() {
        println!("FAIL database: missing at {} (run `vc init`)", paths.db_path.display());
        return Err(ExitError::precondition(
            "no database — run `vc init` first".to_string(),
        ));
    }
    println!("ok   database: {}", paths.db_path.display());

    // Lock state
    match ExclusiveLock::read_owner(&paths.lock_path) {
        Some(owner) if process_exists(owner.pid) => {
            println!("ok   lock: held by live executor (pid {})", owner.pid);
        }
        Some(owner) => {
            problems += 1;
            println!(
                "WARN lock: sentinel left by dead pid {} (crash?); remove {}",
                owner.pid,
                paths.lock_path.display()
            );
        }
        None => println!("ok   lock: free"),
    }

    // Freshness
    let store = EmbeddedStore::open_read_only(paths.clone())?;
    let freshness = validate_freshness(store.last_import_ms()?, &paths.feed_path, 5_000);
    match freshness {
        FreshnessReport::Fresh => println!("ok   freshness: database is current"),
        FreshnessReport::NoFeed => println!("ok   freshness: no issues.jsonl feed to compare"),
        FreshnessReport::Stale { .. } => {
            problems += 1;
            println!("FAIL freshness: issues.jsonl is newer than the last import");
            if args.fix {
                drop(store);
                let imported = reimport(&paths)?;
                println!("fixed: imported {imported} issues from the feed");
                problems -= 1;
            } else {
                println!("       run `vc doctor --fix` to re-import");
            }
        }
    }

    // Sandbox root writability
    let sandbox_root = paths.store_dir().join("sandboxes");
    match std::fs::create_dir_all(&sandbox_root) {
        Ok(()) => println!("ok   sandbox root: {}", sandbox_root.display()),
        Err(e) => {
            problems += 1;
            println!("FAIL sandbox root: {e}");
        }
    }

    if problems == 0 {
        println!("all checks passed");
        Ok(())
    } else {
        Err(ExitError::silent(2))
    }
}

/// Re-import the canonical feed: one issue JSON object per line.
fn reimport(paths: &StorePaths) -> Result<usize, ExitError> {
    let file = std::fs::File::open(&paths.feed_path)
        .map_err(|e| ExitError::failure(format!("cannot open feed: {e}")))?;
    let reader = std::io::BufReader::new(file);

    let mut issues: Vec<Issue> = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| ExitError::failure(format!("feed read error: {e}")))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let issue = serde_json::from_str(trimmed).map_err(|e| {
            ExitError::failure(format!("feed line {} is not an issue: {e}", line_no + 1))
        })?;
        issues.push(issue);
    }

    let store = super::open_store_for_writing(
        paths
            .db_path
            .parent()
            .and_then(Path::parent)
            .unwrap_or(Path::new(".")),
    )?;
    Ok(store.import_issues(issues)?)
}

#[cfg(test)]
#[path = "doctor_tests.rs"]
mod tests;
