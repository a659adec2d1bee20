// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Interval strings used by grouping and time-shift functions.
//!
//! Grammar: `<digits><unit>` with unit one of `s m h d w M y`. Months are 30
//! days and years 365 days. Time shifts accept an optional leading sign.

use std::fmt;

use crate::errors::{Error, Result};

/// Sentinel interval meaning "group the whole requested range at once".
pub const RANGE_VARIABLE_VALUE: &str = "range_series";

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    /// Fixed-width buckets of this many milliseconds.
    Fixed(i64),
    /// One bucket spanning every point.
    Range,
}

impl Interval {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw == RANGE_VARIABLE_VALUE {
            return Ok(Interval::Range);
        }
        let ms = duration_ms(raw)?;
        if ms <= 0 {
            return Err(Error::InvalidInterval(raw.to_string()));
        }
        Ok(Interval::Fixed(ms))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Fixed(ms) => write!(f, "{ms}ms"),
            Interval::Range => f.write_str(RANGE_VARIABLE_VALUE),
        }
    }
}

fn unit_ms(unit: &str) -> Option<i64> {
    match unit {
        "s" => Some(SECOND_MS),
        "m" => Some(MINUTE_MS),
        "h" => Some(HOUR_MS),
        "d" => Some(DAY_MS),
        "w" => Some(7 * DAY_MS),
        "M" => Some(30 * DAY_MS),
        "y" => Some(365 * DAY_MS),
        _ => None,
    }
}

/// Parses an unsigned `<digits><unit>` duration into milliseconds.
fn duration_ms(raw: &str) -> Result<i64> {
    let invalid = || Error::InvalidInterval(raw.to_string());

    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (digits, unit) = raw.split_at(split);
    if digits.is_empty() {
        return Err(invalid());
    }
    let amount: i64 = digits.parse().map_err(|_| invalid())?;
    let unit = unit_ms(unit).ok_or_else(invalid)?;
    amount.checked_mul(unit).ok_or_else(invalid)
}

/// Parses a time-shift interval into the signed number of milliseconds that
/// has to be added to shifted timestamps to bring them back onto the
/// unshifted axis.
///
/// `24h` and `-24h` look into the past (positive result); `+24h` looks into
/// the future (negative result).
pub fn parse_time_shift(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('+') {
        return duration_ms(rest).map(|ms| -ms);
    }
    if let Some(rest) = raw.strip_prefix('-') {
        return duration_ms(rest);
    }
    duration_ms(raw)
}

/// Shifts a request range expressed in epoch seconds. Used by the retrieval
/// side before data is fetched; [`parse_time_shift`] undoes it afterwards.
pub fn time_shift_range(raw: &str, from_sec: i64, to_sec: i64) -> Result<(i64, i64)> {
    let shift_sec = parse_time_shift(raw)? / SECOND_MS;
    from_sec
        .checked_sub(shift_sec)
        .zip(to_sec.checked_sub(shift_sec))
        .ok_or_else(|| Error::InvalidInterval(raw.to_string()))
}
