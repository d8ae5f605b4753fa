// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database-vs-feed freshness validation.
//!
//! The canonical `issues.jsonl` feed may be rewritten by outside tooling; a
//! database whose last import predates the feed's mtime (beyond a tolerance)
//! is stale and must be re-imported before an executor trusts it.

use std::path::Path;
use std::time::UNIX_EPOCH;

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FreshnessReport {
    /// Database is at least as new as the feed (within tolerance).
    Fresh,
    /// Feed is newer than the last import; re-import required.
    Stale { feed_mtime_ms: u64, last_import_ms: u64 },
    /// No feed file exists; nothing to compare against.
    NoFeed,
}

impl FreshnessReport {
    pub fn is_stale(&self) -> bool {
        matches!(self, FreshnessReport::Stale { .. })
    }
}

/// Compare the store's last import stamp against the feed's mtime.
pub fn validate_freshness(
    last_import_ms: u64,
    feed_path: &Path,
    tolerance_ms: u64,
) -> FreshnessReport {
    let Ok(meta) = std::fs::metadata(feed_path) else {
        return FreshnessReport::NoFeed;
    };
    let feed_mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    if feed_mtime_ms > last_import_ms.saturating_add(tolerance_ms) {
        FreshnessReport::Stale {
            feed_mtime_ms,
            last_import_ms,
        }
    } else {
        FreshnessReport::Fresh
    }
}

#[cfg(test)]
#[path = "freshness_tests.rs"]
mod tests;
