// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc status` — live status via the control socket when an executor runs,
//! otherwise a read-only store summary.

use super::{format_timestamp, open_store_read_only, process_exists};
use crate::exit_error::ExitError;
use std::path::Path;
use vc_daemon::{send_request, Request};
use vc_store::{IssueStore, StorePaths, WorkFilter};

pub async fn run(project_root: &Path) -> Result<(), ExitError> {
    let paths = StorePaths::for_project(project_root);

    if paths.socket_path.exists() {
        match send_request(&paths.socket_path, &Request::Status).await {
            Ok(response) if response.success => {
                println!("executor: running");
                if let Some(data) = response.data {
                    print_live_status(&data);
                }
                return Ok(());
            }
            Ok(response) => {
                eprintln!(
                    "warning: status request failed: {}",
                    response.error.unwrap_or_default()
                );
            }
            Err(e) => {
                eprintln!("warning: control socket unreachable ({e}); reading store directly");
            }
        }
    }

    let store = open_store_read_only(project_root)?;
    print_store_summary(&store)?;
    Ok(())
}

fn print_live_status(data: &serde_json::Value) {
    if let Some(instance) = data["instance_id"].as_str() {
        println!("  instance: {instance}");
    }
    match data["active_issue"].as_str() {
        Some(issue) => println!("  active claim: {issue}"),
        None => println!("  active claim: none"),
    }
    if data["paused"].as_bool() == Some(true) {
        println!("  claims paused: cost budget exceeded");
    }
    if let Some(state) = data["budget"]["state"].as_str() {
        println!(
            "  budget: {state} ({} tokens this window)",
            data["budget"]["tokens_used"].as_u64().unwrap_or(0)
        );
    }
    if let Some(total) = data["events_total"].as_u64() {
        println!("  events stored: {total}");
    }
}

fn print_store_summary(store: &vc_store::EmbeddedStore) -> Result<(), ExitError> {
    println!("executor: not running");

    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let instances = store.get_instances()?;
    for instance in &instances {
        let liveness = if instance.status == vc_core::InstanceStatus::Running {
            if process_exists(instance.pid) {
                "running"
            } else {
                "stale (pid gone)"
            }
        } else {
            "stopped"
        };
        let heartbeat_age =
            vc_core::compact_age(now_ms.saturating_sub(instance.last_heartbeat));
        println!(
            "  instance {} pid {} [{liveness}] last heartbeat {} ({heartbeat_age} ago)",
            instance.id.prefix(8),
            instance.pid,
            format_timestamp(instance.last_heartbeat)
        );
    }

    let ready = store.get_ready_work(&WorkFilter::ready(100))?;
    println!("  ready issues: {}", ready.len());
    let counts = store.get_event_counts()?;
    println!("  events stored: {}", counts.total);
    Ok(())
}
