// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time sources.
//!
//! Anything that measures elapsed time or stamps rows takes a [`Clock`], so
//! tests can drive timeouts and retention cutoffs without sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source for the two time axes the executor needs.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic reading, for measuring elapsed time.
    fn monotonic(&self) -> Instant;
    /// Wall-clock epoch milliseconds, for persisted timestamps.
    fn wall_ms(&self) -> u64;
}

/// The real thing.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic(&self) -> Instant {
        Instant::now()
    }

    fn wall_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually driven clock for tests.
///
/// Both axes live in one shared cell, so every clone observes every
/// adjustment and the two can never drift apart under [`advance`](Self::advance).
#[derive(Clone)]
pub struct FakeClock {
    time: Arc<Mutex<FakeTime>>,
}

struct FakeTime {
    monotonic: Instant,
    wall_ms: u64,
}

/// Arbitrary fixed starting epoch for fresh fake clocks.
const FAKE_WALL_START_MS: u64 = 1_000_000;

impl FakeClock {
    pub fn new() -> Self {
        Self {
            time: Arc::new(Mutex::new(FakeTime {
                monotonic: Instant::now(),
                wall_ms: FAKE_WALL_START_MS,
            })),
        }
    }

    /// Move both axes forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        time.monotonic += by;
        time.wall_ms += by.as_millis() as u64;
    }

    /// Pin the wall clock to an absolute epoch value.
    pub fn set_wall_ms(&self, ms: u64) {
        self.time.lock().wall_ms = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn monotonic(&self) -> Instant {
        self.time.lock().monotonic
    }

    fn wall_ms(&self) -> u64 {
        self.time.lock().wall_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
