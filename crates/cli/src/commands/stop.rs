// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc stop` — signal running executor instances and wait for them to exit.

use super::{open_store_read_only, process_exists};
use crate::exit_error::ExitError;
use clap::Args;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;
use std::time::Duration;
use vc_store::{IssueStore, StorePaths};

/// How long to wait after SIGINT before escalating to SIGKILL.
const STOP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Args)]
pub struct StopArgs {
    /// Escalate to SIGKILL immediately
    #[arg(long)]
    pub force: bool,
}

pub async fn run(project_root: &Path, args: StopArgs) -> Result<(), ExitError> {
    let store = open_store_read_only(project_root)?;
    let instances = store.get_active_instances()?;

    if instances.is_empty() {
        println!("no running executor instances");
        return Ok(());
    }

    let mut stale_rows = Vec::new();
    for instance in &instances {
        if !process_exists(instance.pid) {
            // Stale database entry: the process is already gone
            println!("instance {} (pid {}) already exited", instance.id.prefix(8), instance.pid);
            stale_rows.push(instance.id.clone());
            continue;
        }

        let pid = Pid::from_raw(instance.pid as i32);
        let first_signal = if args.force {
            Signal::SIGKILL
        } else {
            Signal::SIGINT
        };
        println!(
            "stopping instance {} (pid {}) with {:?}",
            instance.id.prefix(8),
            instance.pid,
            first_signal
        );
        if let Err(e) = kill(pid, first_signal) {
            eprintln!("warning: signal failed: {e}");
            continue;
        }

        // Poll until the PID exits, escalating after the timeout
        let deadline = std::time::Instant::now() + STOP_TIMEOUT;
        while process_exists(instance.pid) {
            if std::time::Instant::now() > deadline {
                eprintln!(
                    "instance pid {} did not exit in {}s; sending SIGKILL",
                    instance.pid,
                    STOP_TIMEOUT.as_secs()
                );
                let _ = kill(pid, Signal::SIGKILL);
                break;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        while process_exists(instance.pid) {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        println!("instance {} stopped", instance.id.prefix(8));
    }

    // Dead PIDs left running rows behind; fix them up now that no live
    // executor owns the store.
    if !stale_rows.is_empty() {
        let paths = StorePaths::for_project(project_root);
        if vc_daemon::ExclusiveLock::read_owner(&paths.lock_path)
            .map(|owner| process_exists(owner.pid))
            .unwrap_or(false)
        {
            eprintln!("warning: live executor still holds the lock; not touching stale rows");
            return Ok(());
        }
        let store = vc_store::EmbeddedStore::open(paths)?;
        for id in stale_rows {
            store.mark_instance_stopped(&id)?;
            println!("marked stale instance {} stopped", id.prefix(8));
        }
    }

    Ok(())
}
