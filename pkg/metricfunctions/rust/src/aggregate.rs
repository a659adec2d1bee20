// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Scalar reducers over nullable values.
//!
//! Every reducer except [`count`] ignores `None` entries. Empty input is never
//! an error: averages, extrema and ranks yield `None`, [`sum`] yields `0`.

use std::str::FromStr;

fn non_null(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn sorted_non_null(values: &[Option<f64>]) -> Vec<f64> {
    let mut sorted = non_null(values);
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn sum(values: &[Option<f64>]) -> Option<f64> {
    Some(values.iter().flatten().sum())
}

/// Counts raw entries, nulls included.
pub fn count(values: &[Option<f64>]) -> Option<f64> {
    Some(values.len() as f64)
}

pub fn average(values: &[Option<f64>]) -> Option<f64> {
    let present = non_null(values);
    if present.is_empty() {
        return None;
    }
    Some(present.iter().sum::<f64>() / present.len() as f64)
}

pub fn min(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}

pub fn max(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

/// Upper median: index `floor(len / 2)` of the sorted values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let sorted = sorted_non_null(values);
    sorted.get(sorted.len() / 2).copied()
}

/// Nearest-rank percentile without interpolation: index
/// `floor(len * p / 100)` of the sorted values.
pub fn percentile(p: f64, values: &[Option<f64>]) -> Option<f64> {
    let sorted = sorted_non_null(values);
    let rank = (sorted.len() as f64 * p / 100.0).floor();
    if !rank.is_finite() || rank < 0.0 {
        return None;
    }
    sorted.get(rank as usize).copied()
}

/// A reducer selectable by name from function parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregator {
    Avg,
    Min,
    Max,
    Median,
    Sum,
    Count,
    Percentile(f64),
}

impl Aggregator {
    /// Names accepted wherever a function takes an aggregation parameter.
    pub const NAMES: [&'static str; 6] = ["avg", "min", "max", "sum", "count", "median"];

    pub fn apply(&self, values: &[Option<f64>]) -> Option<f64> {
        match self {
            Aggregator::Avg => average(values),
            Aggregator::Min => min(values),
            Aggregator::Max => max(values),
            Aggregator::Median => median(values),
            Aggregator::Sum => sum(values),
            Aggregator::Count => count(values),
            Aggregator::Percentile(p) => percentile(*p, values),
        }
    }
}

impl FromStr for Aggregator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregator::Avg),
            "min" => Ok(Aggregator::Min),
            "max" => Ok(Aggregator::Max),
            "median" => Ok(Aggregator::Median),
            "sum" => Ok(Aggregator::Sum),
            "count" => Ok(Aggregator::Count),
            _ => Err(format!(
                "unknown aggregation {s:?}, expected one of {}",
                Self::NAMES.join(", ")
            )),
        }
    }
}
