// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL write-ahead log of store mutation records.
//!
//! Each entry is a single line of JSON: `{"seq":N,"record":{...}}\n`. Records
//! are appended (buffered) and made durable by `flush()`; the store flushes
//! once per logical operation so a multi-record mutation commits as a unit.
//! On open, a corrupt tail (torn write) is rotated to `.bak` and the valid
//! prefix preserved.

use crate::record::StoreRecord;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct WalLineRef<'a> {
    seq: u64,
    record: &'a StoreRecord,
}

#[derive(Deserialize)]
struct WalLine {
    seq: u64,
    record: StoreRecord,
}

/// A replayed WAL entry.
#[derive(Debug, Clone)]
pub struct WalEntry {
    pub seq: u64,
    pub record: StoreRecord,
}

/// Append-only JSONL record log.
pub struct Wal {
    file: File,
    path: PathBuf,
    /// Next sequence number to assign.
    next_seq: u64,
    /// Lines waiting for flush (serialized, without trailing newline).
    buffer: Vec<Vec<u8>>,
}

impl Wal {
    /// Open or create a WAL, scanning for the highest sequence number.
    ///
    /// `floor_seq` is the sequence covered by the snapshot; assigned sequences
    /// stay monotonic across truncation by never dropping below it.
    ///
    /// A parse failure mid-file means a torn write: the file is rotated to
    /// `.bak` and re-created with only the valid prefix.
    pub fn open(path: &Path, floor_seq: u64) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, corrupt) = read_entries(&file)?;
        let max_seq = entries.last().map(|e| e.seq).unwrap_or(0);

        let file = if corrupt {
            drop(file);
            let bak = bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak.display(),
                valid_entries = entries.len(),
                "corrupt WAL tail detected, rotating to .bak and keeping valid prefix",
            );
            std::fs::rename(path, &bak)?;

            let mut clean = File::create(path)?;
            for entry in &entries {
                let line = serde_json::to_vec(&WalLineRef {
                    seq: entry.seq,
                    record: &entry.record,
                })?;
                clean.write_all(&line)?;
                clean.write_all(b"\n")?;
            }
            clean.sync_all()?;
            drop(clean);

            OpenOptions::new().create(true).read(true).append(true).open(path)?
        } else {
            file
        };

        Ok(Self {
            file,
            path: path.to_owned(),
            next_seq: max_seq.max(floor_seq) + 1,
            buffer: Vec::new(),
        })
    }

    /// Buffer a record for the next flush. Returns the assigned sequence.
    pub fn append(&mut self, record: &StoreRecord) -> Result<u64, WalError> {
        let seq = self.next_seq;
        self.next_seq += 1;
        let line = serde_json::to_vec(&WalLineRef { seq, record })?;
        self.buffer.push(line);
        Ok(seq)
    }

    /// Write buffered lines and fsync. This is the durability point.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        for line in self.buffer.drain(..) {
            self.file.write_all(&line)?;
            self.file.write_all(b"\n")?;
        }
        self.file.sync_data()?;
        Ok(())
    }

    /// Entries with `seq > after`, in order.
    pub fn entries_after(&self, after: u64) -> Result<Vec<WalEntry>, WalError> {
        let (entries, _) = read_entries(&self.file)?;
        Ok(entries.into_iter().filter(|e| e.seq > after).collect())
    }

    /// Highest sequence assigned so far.
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Drop all entries. Called after a snapshot covering them is durable.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.flush()?;
        self.file.set_len(0)?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read all valid entries; `true` in the second slot means a corrupt tail.
fn read_entries(file: &File) -> Result<(Vec<WalEntry>, bool), WalError> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut entries = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                // A line without a trailing newline is a torn write
                if !line.ends_with('\n') {
                    return Ok((entries, true));
                }
                match serde_json::from_str::<WalLine>(trimmed) {
                    Ok(parsed) => entries.push(WalEntry {
                        seq: parsed.seq,
                        record: parsed.record,
                    }),
                    Err(_) => return Ok((entries, true)),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => return Ok((entries, true)),
            Err(e) => return Err(e.into()),
        }
    }
    Ok((entries, false))
}

/// Sibling `.bak` path for a rotated corrupt WAL.
fn bak_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".bak");
    PathBuf::from(os)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
