// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc stale` — report claims whose instance has gone quiet; `--release`
//! returns them to the ready pool.

use super::{open_store_for_writing, open_store_read_only};
use crate::exit_error::ExitError;
use clap::Args;
use std::collections::HashMap;
use std::path::Path;
use vc_core::{InstanceId, InstanceStatus};
use vc_store::IssueStore;

/// Author recorded on release comments.
const STALE_CLEANER: &str = "vc-stale-cleaner";

#[derive(Debug, Args)]
pub struct StaleArgs {
    /// Heartbeat age (seconds) before a claim counts as stale
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub threshold: u64,

    /// Release the stale claims instead of only reporting them
    #[arg(long)]
    pub release: bool,
}

pub fn run(project_root: &Path, args: StaleArgs) -> Result<(), ExitError> {
    let store = open_store_read_only(project_root)?;
    let stale = find_stale_claims(&store, args.threshold * 1000)?;

    if stale.is_empty() {
        println!("no stale claims");
        return Ok(());
    }

    for (issue_id, instance_id) in &stale {
        println!(
            "stale claim: {} held by {}",
            issue_id,
            instance_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unknown instance".to_string())
        );
    }

    if !args.release {
        println!("run `vc stale --release` to return them to the ready pool");
        return Ok(());
    }

    drop(store);
    let store = open_store_for_writing(project_root)?;
    for (issue_id, _) in &stale {
        store.release_issue(issue_id)?;
        store.add_comment(
            issue_id,
            STALE_CLEANER,
            &format!(
                "released stale claim (no heartbeat for over {}s)",
                args.threshold
            ),
        )?;
        println!("released {issue_id}");
    }
    Ok(())
}

type StaleClaim = (vc_core::IssueId, Option<InstanceId>);

fn find_stale_claims(
    store: &vc_store::EmbeddedStore,
    threshold_ms: u64,
) -> Result<Vec<StaleClaim>, ExitError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    let instances: HashMap<InstanceId, vc_core::ExecutorInstance> = store
        .get_instances()?
        .into_iter()
        .map(|instance| (instance.id.clone(), instance))
        .collect();

    let mut stale = Vec::new();
    for exec in store.list_claimed()? {
        let holder = exec.executor_instance_id.clone();
        let is_stale = match holder.as_ref().and_then(|id| instances.get(id)) {
            // Holder still heartbeating: healthy
            Some(instance) if instance.status == InstanceStatus::Running => {
                now.saturating_sub(instance.last_heartbeat) > threshold_ms
            }
            // Holder stopped/crashed or unknown: claim is orphaned
            _ => true,
        };
        if is_stale {
            stale.push((exec.issue_id, holder));
        }
    }
    Ok(stale)
}

#[cfg(test)]
#[path = "stale_tests.rs"]
mod tests;
