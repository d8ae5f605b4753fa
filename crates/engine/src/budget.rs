// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rolling-window AI cost budget.
//!
//! State machine: `ok -> warning` above the warn threshold, `-> exceeded`
//! above 100% of either limit. Exceeded pauses new claims; the current claim
//! finishes. The window resets at its boundary.

use crate::supervisor::AiUsage;
use parking_lot::Mutex;
use vc_core::Clock;

/// Budget limits. A limit of 0 means unlimited.
#[derive(Debug, Clone)]
pub struct BudgetConfig {
    pub max_cost_per_hour: f64,
    pub max_tokens_per_hour: u64,
    pub warning_threshold_percent: u8,
    pub window: std::time::Duration,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_cost_per_hour: 0.0,
            max_tokens_per_hour: 0,
            warning_threshold_percent: 80,
            window: std::time::Duration::from_secs(3600),
        }
    }
}

/// Where spend sits relative to the limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetState {
    Ok,
    Warning,
    Exceeded,
}

/// Point-in-time budget view for `status` output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetSnapshot {
    pub state: BudgetState,
    pub tokens_used: u64,
    pub cost_used_usd: f64,
    pub window_remaining_ms: u64,
}

struct Window {
    started_ms: u64,
    tokens: u64,
    cost: f64,
}

/// Process-wide accumulator of AI usage.
pub struct CostTracker<C: Clock> {
    config: BudgetConfig,
    clock: C,
    window: Mutex<Window>,
}

impl<C: Clock> CostTracker<C> {
    pub fn new(config: BudgetConfig, clock: C) -> Self {
        let started_ms = clock.wall_ms();
        Self {
            config,
            clock,
            window: Mutex::new(Window {
                started_ms,
                tokens: 0,
                cost: 0.0,
            }),
        }
    }

    /// Add one call's usage to the current window.
    pub fn record(&self, usage: AiUsage) {
        let mut window = self.window.lock();
        self.roll(&mut window);
        window.tokens = window.tokens.saturating_add(usage.tokens);
        window.cost += usage.cost_usd;
    }

    /// Current state; rolls the window first.
    pub fn state(&self) -> BudgetState {
        let mut window = self.window.lock();
        self.roll(&mut window);
        self.classify(&window)
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        let mut window = self.window.lock();
        self.roll(&mut window);
        let elapsed = self.clock.wall_ms().saturating_sub(window.started_ms);
        BudgetSnapshot {
            state: self.classify(&window),
            tokens_used: window.tokens,
            cost_used_usd: window.cost,
            window_remaining_ms: (self.config.window.as_millis() as u64).saturating_sub(elapsed),
        }
    }

    fn roll(&self, window: &mut Window) {
        let now = self.clock.wall_ms();
        let span = self.config.window.as_millis() as u64;
        if span > 0 && now.saturating_sub(window.started_ms) >= span {
            window.started_ms = now;
            window.tokens = 0;
            window.cost = 0.0;
        }
    }

    fn classify(&self, window: &Window) -> BudgetState {
        let warn = f64::from(self.config.warning_threshold_percent) / 100.0;

        let token_frac = if self.config.max_tokens_per_hour > 0 {
            window.tokens as f64 / self.config.max_tokens_per_hour as f64
        } else {
            0.0
        };
        let cost_frac = if self.config.max_cost_per_hour > 0.0 {
            window.cost / self.config.max_cost_per_hour
        } else {
            0.0
        };
        let frac = token_frac.max(cost_frac);

        if frac >= 1.0 {
            BudgetState::Exceeded
        } else if frac >= warn {
            BudgetState::Warning
        } else {
            BudgetState::Ok
        }
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
