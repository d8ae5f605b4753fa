// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The exclusive-lock sentinel.
//!
//! A file next to the database holding the owner's identity. The OS-level
//! `fs2` exclusive lock makes acquisition atomic; the file's *presence* tells
//! competing daemons (`bd` shares this database) to skip the store entirely.
//! The guard removes the file on drop, so every exit path — including
//! unwinding after a panic — releases the lock.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Who holds the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub hostname: String,
    pub instance_id: String,
    pub acquired_at_ms: u64,
}

/// Lock errors.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("exclusive lock held by another owner{}", held_by(.owner))]
    Held { owner: Option<LockOwner> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn held_by(owner: &Option<LockOwner>) -> String {
    match owner {
        Some(owner) => format!(" (pid {} on {})", owner.pid, owner.hostname),
        None => String::new(),
    }
}

/// Guard for the sentinel file. Held for the life of the executor.
#[derive(Debug)]
pub struct ExclusiveLock {
    // NOTE(lifetime): held to keep the fs2 lock; released on drop
    #[allow(dead_code)]
    file: File,
    path: PathBuf,
}

impl ExclusiveLock {
    /// Atomically acquire the sentinel, writing the owner identity into it.
    ///
    /// Open without truncation first — truncating before the lock is held
    /// would wipe a live owner's identity.
    pub fn acquire(path: &Path, owner: &LockOwner) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockError::Held {
                owner: Self::read_owner(path),
            });
        }

        file.set_len(0)?;
        serde_json::to_writer(&mut file, owner)?;
        writeln!(file)?;
        file.sync_all()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Read the current owner identity without acquiring.
    pub fn read_owner(path: &Path) -> Option<LockOwner> {
        let content = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(content.trim()).ok()
    }

    /// Whether a sentinel exists at the path (the signal `bd` checks).
    pub fn is_held(path: &Path) -> bool {
        path.exists()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicit release; equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ExclusiveLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(error = %e, path = %self.path.display(), "failed to remove lock sentinel");
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
