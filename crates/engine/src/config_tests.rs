// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_validate() {
    assert!(ExecutorConfig::default().validate().is_ok());
}

#[test]
fn poll_interval_below_one_second_is_rejected() {
    let config = ExecutorConfig {
        poll_interval: Duration::from_millis(500),
        ..ExecutorConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("poll interval"));
}

#[test]
fn exactly_one_second_is_accepted() {
    let config = ExecutorConfig {
        poll_interval: Duration::from_secs(1),
        ..ExecutorConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn auto_pr_without_auto_commit_is_rejected() {
    let config = ExecutorConfig {
        enable_auto_pr: true,
        enable_auto_commit: false,
        ..ExecutorConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.is_precondition());
    assert!(err.to_string().contains("auto-commit"));
}

#[test]
fn auto_pr_with_auto_commit_is_accepted() {
    let config = ExecutorConfig {
        enable_auto_pr: true,
        enable_auto_commit: true,
        ..ExecutorConfig::default()
    };
    assert!(config.validate().is_ok());
}

#[test]
fn zero_claim_limit_is_rejected() {
    let config = ExecutorConfig {
        claim_limit: 0,
        ..ExecutorConfig::default()
    };
    assert!(config.validate().is_err());
}
