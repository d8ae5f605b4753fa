// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment knobs (`VC_*`), one accessor per variable.

use std::time::Duration;

fn bool_env(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn secs_env(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// `VC_ENABLE_AUTO_COMMIT`
pub fn enable_auto_commit() -> Option<bool> {
    bool_env("VC_ENABLE_AUTO_COMMIT")
}

/// `VC_ENABLE_AUTO_PR`
pub fn enable_auto_pr() -> Option<bool> {
    bool_env("VC_ENABLE_AUTO_PR")
}

/// `VC_POLL_INTERVAL_SECS`
pub fn poll_interval() -> Option<Duration> {
    secs_env("VC_POLL_INTERVAL_SECS")
}

/// `VC_AGENT_TIMEOUT_SECS`
pub fn agent_timeout() -> Option<Duration> {
    secs_env("VC_AGENT_TIMEOUT_SECS")
}

/// `VC_DISABLE_SANDBOXES`
pub fn disable_sandboxes() -> Option<bool> {
    bool_env("VC_DISABLE_SANDBOXES")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
