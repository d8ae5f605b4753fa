// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store snapshots: the database file itself.
//!
//! A snapshot is the zstd-compressed JSON of [`StoreState`] plus the WAL
//! sequence it covers. Durability ordering on write:
//!
//! 1. Serialize + compress to a temp file
//! 2. fsync the temp file
//! 3. Atomic rename onto the database path
//! 4. fsync the directory (makes the rename durable across power loss)
//!
//! Only after all four is it safe to truncate the WAL.

use crate::state::StoreState;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;

/// zstd level: fast with a good ratio for JSON.
const COMPRESSION_LEVEL: i32 = 3;

/// Errors from snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt snapshot at {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// A loaded snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// WAL sequence this snapshot covers; replay resumes after it.
    pub seq: u64,
    /// RFC 3339 write time, informational.
    pub taken_at: String,
    pub state: StoreState,
}

/// Write a snapshot durably (temp + fsync + rename + dir fsync).
pub fn write_snapshot(path: &Path, seq: u64, state: &StoreState) -> Result<u64, SnapshotError> {
    let snapshot = Snapshot {
        seq,
        taken_at: chrono::Utc::now().to_rfc3339(),
        state: state.clone(),
    };

    let json = serde_json::to_vec(&snapshot)?;
    let compressed = zstd::encode_all(&json[..], COMPRESSION_LEVEL)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("db.tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(&compressed)?;
        tmp.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(compressed.len() as u64)
}

/// Load a snapshot, or `None` if the file does not exist.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut compressed = Vec::new();
    file.read_to_end(&mut compressed)?;

    let json = zstd::decode_all(&compressed[..]).map_err(|e| SnapshotError::Corrupt {
        path: path.display().to_string(),
        message: format!("zstd decode failed: {e}"),
    })?;

    let snapshot = serde_json::from_slice(&json).map_err(|e| SnapshotError::Corrupt {
        path: path.display().to_string(),
        message: format!("JSON decode failed: {e}"),
    })?;

    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
