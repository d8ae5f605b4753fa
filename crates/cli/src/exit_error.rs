// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI error-to-exit-code mapping.
//!
//! 0 ok; 1 recoverable failure; 2 precondition failure (no database, stale
//! database, lock held, bad flags).

use vc_daemon::LifecycleError;

/// A terminal CLI error carrying its exit code.
#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitError {
    /// Exit 1: something went wrong at runtime.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: Some(message.into()),
        }
    }

    /// Exit 2: a precondition was not met; the message says how to fix it.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self {
            code: 2,
            message: Some(message.into()),
        }
    }

    /// Exit with a code but no message (output already printed).
    pub fn silent(code: i32) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// Print (if any message) and exit the process.
    pub fn exit(self) -> ! {
        if let Some(message) = &self.message {
            eprintln!("error: {message}");
        }
        std::process::exit(self.code)
    }
}

impl From<LifecycleError> for ExitError {
    fn from(e: LifecycleError) -> Self {
        Self {
            code: e.exit_code(),
            message: Some(e.to_string()),
        }
    }
}

impl From<vc_store::StoreError> for ExitError {
    fn from(e: vc_store::StoreError) -> Self {
        ExitError::failure(e.to_string())
    }
}

impl From<std::io::Error> for ExitError {
    fn from(e: std::io::Error) -> Self {
        ExitError::failure(e.to_string())
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
