// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    sub_second    = { 999, "0s" },
    seconds       = { 45_000, "45s" },
    exact_minute  = { 180_000, "3m" },
    minute_mix    = { 150_000, "2m30s" },
    exact_hour    = { 7_200_000, "2h" },
    hour_mix      = { 5_400_000, "1h30m" },
    day_mix       = { 200_000_000, "2d7h" },
    exact_day     = { 86_400_000, "1d" },
)]
fn compact_age_cases(ms: u64, expected: &str) {
    assert_eq!(compact_age(ms), expected);
}

#[test]
fn refinement_drops_below_one_unit() {
    // 61.5s: the half-second remainder is below the seconds refinement
    assert_eq!(compact_age(61_500), "1m1s");
    // 1h0m59s: minutes refinement is zero, seconds are not shown at all
    assert_eq!(compact_age(3_659_000), "1h");
}

#[test]
fn zero_is_zero_seconds() {
    assert_eq!(compact_age(0), "0s");
}
