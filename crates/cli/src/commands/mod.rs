// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations.

pub mod activity;
pub mod cleanup;
pub mod doctor;
pub mod execute;
pub mod init;
pub mod pause;
pub mod stale;
pub mod status;
pub mod stop;
pub mod tail;

use crate::exit_error::ExitError;
use std::path::Path;
use vc_store::{EmbeddedStore, StorePaths};

/// Open the project store read-only, requiring it to exist.
pub(crate) fn open_store_read_only(project_root: &Path) -> Result<EmbeddedStore, ExitError> {
    let paths = StorePaths::for_project(project_root);
    if !paths.database_exists() {
        return Err(ExitError::precondition(format!(
            "no database at {} — run `vc init` first",
            paths.db_path.display()
        )));
    }
    Ok(EmbeddedStore::open_read_only(paths)?)
}

/// Open the project store read-write, refusing while a live executor owns it.
pub(crate) fn open_store_for_writing(project_root: &Path) -> Result<EmbeddedStore, ExitError> {
    let paths = StorePaths::for_project(project_root);
    if !paths.database_exists() {
        return Err(ExitError::precondition(format!(
            "no database at {} — run `vc init` first",
            paths.db_path.display()
        )));
    }
    if let Some(owner) = vc_daemon::ExclusiveLock::read_owner(&paths.lock_path) {
        if process_exists(owner.pid) {
            return Err(ExitError::precondition(format!(
                "an executor (pid {}) owns this store; stop it first or use the control socket",
                owner.pid
            )));
        }
    }
    Ok(EmbeddedStore::open(paths)?)
}

/// Null-signal liveness probe.
pub(crate) fn process_exists(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

/// Human-readable local timestamp for event listings.
pub(crate) fn format_timestamp(epoch_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms as i64)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}
