// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout for a project's store.
//!
//! Everything lives under `<project>/.beads/`: the database file (a zstd
//! snapshot), its `-wal` sibling, the canonical `issues.jsonl` export feed,
//! the `.exclusive-lock` sentinel, and the control socket.

use std::path::{Path, PathBuf};

/// Directory name holding all store files inside a project.
pub const STORE_DIR: &str = ".beads";

/// Canonical export feed filename.
pub const FEED_FILE: &str = "issues.jsonl";

/// Exclusive-lock sentinel filename.
pub const LOCK_FILE: &str = ".exclusive-lock";

/// Control socket filename.
pub const SOCKET_FILE: &str = "vc.sock";

/// Daemon log filename.
pub const LOG_FILE: &str = "vc.log";

/// Resolved paths for one project's store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub db_path: PathBuf,
    pub wal_path: PathBuf,
    pub feed_path: PathBuf,
    pub lock_path: PathBuf,
    pub socket_path: PathBuf,
    pub log_path: PathBuf,
}

impl StorePaths {
    /// Default scheme: `<project>/.beads/<project>.db` with siblings.
    pub fn for_project(project_root: &Path) -> Self {
        let name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        let dir = project_root.join(STORE_DIR);
        Self::for_database(&dir.join(format!("{name}.db")))
    }

    /// Derive sibling paths from an explicit database path.
    pub fn for_database(db_path: &Path) -> Self {
        let dir = db_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut wal = db_path.as_os_str().to_owned();
        wal.push("-wal");
        Self {
            db_path: db_path.to_path_buf(),
            wal_path: PathBuf::from(wal),
            feed_path: dir.join(FEED_FILE),
            lock_path: dir.join(LOCK_FILE),
            socket_path: dir.join(SOCKET_FILE),
            log_path: dir.join(LOG_FILE),
        }
    }

    /// The `.beads` directory itself.
    pub fn store_dir(&self) -> &Path {
        self.db_path.parent().unwrap_or(Path::new("."))
    }

    /// Whether a database exists at this layout.
    pub fn database_exists(&self) -> bool {
        self.db_path.exists()
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
