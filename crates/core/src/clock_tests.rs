// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn system_clock_wall_ms_is_plausible() {
    let clock = SystemClock;
    // 2020-01-01 in epoch ms
    assert!(clock.wall_ms() > 1_577_836_800_000);
}

#[test]
fn fake_clock_advance_moves_both_axes_together() {
    let clock = FakeClock::new();
    let start_monotonic = clock.monotonic();
    let start_ms = clock.wall_ms();

    clock.advance(Duration::from_secs(90));

    assert_eq!(clock.monotonic() - start_monotonic, Duration::from_secs(90));
    assert_eq!(clock.wall_ms(), start_ms + 90_000);
}

#[test]
fn fake_clock_clones_share_the_cell() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.wall_ms(), clock.wall_ms());
    assert_eq!(other.monotonic(), clock.monotonic());
}

#[test]
fn set_wall_ms_pins_only_the_wall_axis() {
    let clock = FakeClock::new();
    let monotonic_before = clock.monotonic();
    clock.set_wall_ms(42);
    assert_eq!(clock.wall_ms(), 42);
    assert_eq!(clock.monotonic(), monotonic_before);
}
