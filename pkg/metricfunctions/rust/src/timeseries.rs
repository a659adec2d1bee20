// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Pure transforms over point sequences.
//!
//! Unless stated otherwise, input points are expected in ascending timestamp
//! order. Every function returns a new sequence and leaves its input alone.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::aggregate::{self, Aggregator};
use crate::errors::{Error, Result};
use crate::interval::Interval;
use crate::point::Point;

/// Start of the bucket `timestamp` falls into.
///
/// ```text
/// |__*_|_*__|___*| -> |*___|*___|*___|
/// ```
fn bucket_start(timestamp: i64, ms_interval: i64) -> i64 {
    timestamp.div_euclid(ms_interval) * ms_interval
}

fn values(points: &[Point]) -> Vec<Option<f64>> {
    points.iter().map(|p| p.value).collect()
}

/// Stable sort by timestamp.
pub fn sort_by_time(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.timestamp);
    sorted
}

/// Concatenates several point sequences into one (unsorted).
pub fn flatten(sets: &[Vec<Point>]) -> Vec<Point> {
    sets.iter().flatten().copied().collect()
}

/// Downsamples by walking backwards from `time_to_sec` in windows of
/// `ms_interval`, each window covering `(to - ms_interval, to]` and stamped
/// with its `to` edge.
///
/// `func` selects min or max; anything else averages, with an empty window
/// averaging to `0`. Points newer than `time_to_sec` are ignored.
///
/// Walking stops at the oldest point, and the window holding it is emitted
/// even when it is only partly covered. Only windows between two populated
/// ones can come out empty.
pub fn downsample(
    points: &[Point],
    time_to_sec: i64,
    ms_interval: i64,
    func: Aggregator,
) -> Vec<Point> {
    if ms_interval <= 0 {
        return Vec::new();
    }

    let reduce = |frame: &[Option<f64>]| match func {
        Aggregator::Min => aggregate::min(frame),
        Aggregator::Max => aggregate::max(frame),
        _ => Some(aggregate::average(frame).unwrap_or(0.0)),
    };

    let time_to = time_to_sec.saturating_mul(1000);
    let mut window_to = time_to;
    let mut frame = Vec::new();
    let mut downsampled = Vec::new();

    let mut remaining = points
        .iter()
        .rev()
        .filter(|p| p.timestamp <= time_to)
        .peekable();

    while let Some(point) = remaining.peek() {
        if point.timestamp > window_to.saturating_sub(ms_interval) {
            frame.push(point.value);
            remaining.next();
        } else {
            downsampled.push(Point {
                value: reduce(&frame),
                timestamp: window_to,
            });
            window_to = window_to.saturating_sub(ms_interval);
            frame.clear();
        }
    }
    if !frame.is_empty() {
        downsampled.push(Point {
            value: reduce(&frame),
            timestamp: window_to,
        });
    }

    downsampled.reverse();
    downsampled
}

/// Groups points into `interval` buckets in a single forward pass.
///
/// Each bucket is emitted as `(agg(values), bucket_start)`. Buckets skipped
/// between two populated ones are emitted as nulls, so output timestamps are
/// spaced by exactly one interval. Points whose bucket lies before the
/// current one (unsorted input) are dropped.
///
/// With [`Interval::Range`] no bucketing happens; see [`group_by_range`].
pub fn group_by_perf(points: &[Point], interval: Interval, agg: Aggregator) -> Vec<Point> {
    let ms_interval = match interval {
        Interval::Range => return group_by_range(points, agg),
        Interval::Fixed(ms) => ms,
    };
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut grouped = Vec::new();
    let mut frame_ts = bucket_start(first.timestamp, ms_interval);
    let mut frame_values = Vec::new();
    let mut dropped = 0usize;

    for point in points {
        let point_frame_ts = bucket_start(point.timestamp, ms_interval);
        if point_frame_ts == frame_ts {
            frame_values.push(point.value);
        } else if point_frame_ts > frame_ts {
            grouped.push(Point {
                value: agg.apply(&frame_values),
                timestamp: frame_ts,
            });

            frame_ts += ms_interval;
            while frame_ts < point_frame_ts {
                grouped.push(Point::null(frame_ts));
                frame_ts += ms_interval;
            }
            frame_values = vec![point.value];
        } else {
            dropped += 1;
        }
    }

    grouped.push(Point {
        value: agg.apply(&frame_values),
        timestamp: frame_ts,
    });

    if dropped > 0 {
        warn!("group_by_perf dropped {dropped} out-of-order points");
    }
    grouped
}

/// Aggregates every value at once and emits the result at both the first and
/// the last timestamp.
pub fn group_by_range(points: &[Point], agg: Aggregator) -> Vec<Point> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let value = agg.apply(&values(points));
    vec![
        Point {
            value,
            timestamp: first.timestamp,
        },
        Point {
            value,
            timestamp: last.timestamp,
        },
    ]
}

/// Partition-based grouping. Does not require sorted input and does not fill
/// empty buckets; output is sorted by bucket timestamp.
pub fn group_by(points: &[Point], interval: Interval, agg: Aggregator) -> Vec<Point> {
    let ms_interval = match interval {
        Interval::Range => return group_by_range(&sort_by_time(points), agg),
        Interval::Fixed(ms) => ms,
    };

    let mut frames: BTreeMap<i64, Vec<Option<f64>>> = BTreeMap::new();
    for point in points {
        frames
            .entry(bucket_start(point.timestamp, ms_interval))
            .or_default()
            .push(point.value);
    }

    frames
        .into_iter()
        .map(|(timestamp, frame)| Point {
            value: agg.apply(&frame),
            timestamp,
        })
        .collect()
}

/// Sums several series into one over the union of their timestamps.
///
/// Each series is first extended to every timestamp: before its first and
/// after its last point it contributes `0`, inside its span missing or null
/// values are linearly interpolated between the nearest known neighbours.
/// Empty series contribute nothing.
pub fn sum_series(sets: &[Vec<Point>]) -> Vec<Point> {
    let timestamps: Vec<i64> = sets
        .iter()
        .flatten()
        .map(|p| p.timestamp)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut totals = vec![0.0; timestamps.len()];
    for set in sets.iter().filter(|s| !s.is_empty()) {
        for (total, value) in totals.iter_mut().zip(align_series(set, &timestamps)) {
            *total += value;
        }
    }

    timestamps
        .into_iter()
        .zip(totals)
        .map(|(timestamp, value)| Point::new(value, timestamp))
        .collect()
}

/// Resamples one non-empty series onto `timestamps` (sorted, containing every
/// timestamp of the series). Duplicate timestamps keep the last value.
fn align_series(points: &[Point], timestamps: &[i64]) -> Vec<f64> {
    let known: BTreeMap<i64, Option<f64>> = points.iter().map(|p| (p.timestamp, p.value)).collect();
    let (Some(first), Some(last)) = (known.keys().next(), known.keys().next_back()) else {
        return vec![0.0; timestamps.len()];
    };

    let filled: Vec<Option<f64>> = timestamps
        .iter()
        .map(|ts| {
            if ts < first || ts > last {
                Some(0.0)
            } else {
                known.get(ts).copied().flatten()
            }
        })
        .collect();

    interpolate(timestamps, &filled)
}

/// Fills every `None` in `values` by linear interpolation between the nearest
/// non-null neighbours. A missing neighbour on one side is replaced by the
/// other one; with no neighbours at all the value becomes `0`.
fn interpolate(timestamps: &[i64], values: &[Option<f64>]) -> Vec<f64> {
    let known: Vec<Option<(f64, i64)>> = values
        .iter()
        .zip(timestamps)
        .map(|(value, ts)| value.map(|v| (v, *ts)))
        .collect();
    let carry = |seen: &mut Option<(f64, i64)>, k: &Option<(f64, i64)>| {
        if k.is_some() {
            *seen = *k;
        }
        Some(*seen)
    };

    let nearest_left: Vec<_> = known.iter().scan(None, carry).collect();
    let mut nearest_right: Vec<_> = known.iter().rev().scan(None, carry).collect();
    nearest_right.reverse();

    values
        .iter()
        .zip(timestamps)
        .zip(nearest_left.into_iter().zip(nearest_right))
        .map(|((value, ts), neighbours)| match (value, neighbours) {
            (Some(v), _) => *v,
            (None, (Some(left), Some(right))) => linear_interpolation(*ts, left, right),
            (None, (Some(only), None) | (None, Some(only))) => linear_interpolation(*ts, only, only),
            (None, (None, None)) => 0.0,
        })
        .collect()
}

fn linear_interpolation(timestamp: i64, left: (f64, i64), right: (f64, i64)) -> f64 {
    let (left_value, left_ts) = left;
    let (right_value, right_ts) = right;
    if left_ts == right_ts {
        return (left_value + right_value) / 2.0;
    }
    left_value
        + (right_value - left_value) / (right_ts - left_ts) as f64 * (timestamp - left_ts) as f64
}

pub fn scale(points: &[Point], factor: f64) -> Vec<Point> {
    points.iter().map(|p| p.map_value(|v| v * factor)).collect()
}

pub fn offset(points: &[Point], delta: f64) -> Vec<Point> {
    points.iter().map(|p| p.map_value(|v| v + delta)).collect()
}

/// Difference between consecutive values, stamped at the later point.
pub fn delta(points: &[Point]) -> Vec<Point> {
    points
        .iter()
        .zip(points.iter().skip(1))
        .map(|(prev, cur)| Point {
            value: cur.value.zip(prev.value).map(|(cur, prev)| cur - prev),
            timestamp: cur.timestamp,
        })
        .collect()
}

/// Per-second rate between consecutive points.
///
/// Resistant to counter resets: when a value drops below its predecessor the
/// previously computed rate is emitted again instead of a negative one. The
/// same applies to pairs with no elapsed time. A null on either side yields a
/// null without touching the carried rate.
pub fn rate(points: &[Point]) -> Vec<Point> {
    let mut carried = 0.0;
    points
        .iter()
        .zip(points.iter().skip(1))
        .map(|(prev, cur)| {
            let value = match (prev.value, cur.value) {
                (Some(prev_value), Some(cur_value)) => {
                    let time_delta = (cur.timestamp - prev.timestamp) as f64 / 1000.0;
                    if cur_value >= prev_value && time_delta > 0.0 {
                        carried = (cur_value - prev_value) / time_delta;
                    }
                    Some(carried)
                }
                _ => None,
            };
            Point {
                value,
                timestamp: cur.timestamp,
            }
        })
        .collect()
}

/// Sliding average over `n` points, stamped at the newest point of each
/// window. Nulls are left out of the window average; a window with no values
/// averages to null. Fewer than `n` points produce no output.
pub fn simple_moving_average(points: &[Point], n: usize) -> Vec<Point> {
    let Some((window, rest)) = points.split_at_checked(n) else {
        return Vec::new();
    };
    let Some(newest) = window.last() else {
        return Vec::new();
    };

    let average = |sum: f64, count: usize| (count > 0).then(|| sum / count as f64);
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in window.iter().filter_map(|p| p.value) {
        sum += value;
        count += 1;
    }

    let mut sma = Vec::with_capacity(rest.len() + 1);
    sma.push(Point {
        value: average(sum, count),
        timestamp: newest.timestamp,
    });

    for (entering, leaving) in rest.iter().zip(points) {
        if let Some(value) = entering.value {
            sum += value;
            count += 1;
        }
        if let Some(value) = leaving.value {
            sum -= value;
            count -= 1;
            if count == 0 {
                sum = 0.0;
            }
        }
        sma.push(Point {
            value: average(sum, count),
            timestamp: entering.timestamp,
        });
    }
    sma
}

/// Exponential moving average.
///
/// With `n > 1`, `n` is a window size: the smoothing factor is `2 / (n + 1)`
/// and the first output is the simple average of the first `n` points,
/// stamped at the first timestamp. Otherwise `n` is the smoothing factor
/// itself and the first point seeds the average. Null samples stay null.
pub fn exp_moving_average(points: &[Point], n: f64) -> Vec<Point> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let (a, seed) = if n > 1.0 {
        let window = (n as usize).min(points.len());
        let head: Vec<Option<f64>> = points.iter().take(window).map(|p| p.value).collect();
        let initial = aggregate::average(&head);
        (
            2.0 / (n + 1.0),
            Point {
                value: initial.or(first.value),
                timestamp: first.timestamp,
            },
        )
    } else {
        (n, *first)
    };

    let mut ema = Vec::with_capacity(points.len());
    ema.push(seed);
    let mut previous = seed.value;

    for point in points.iter().skip(1) {
        match point.value {
            Some(value) => {
                let current = match previous {
                    Some(prev) => a * value + (1.0 - a) * prev,
                    None => value,
                };
                previous = Some(current);
                ema.push(Point::new(current, point.timestamp));
            }
            None => ema.push(Point::null(point.timestamp)),
        }
    }
    ema
}

/// Nulls out values strictly above `threshold`.
pub fn remove_above_value(points: &[Point], threshold: f64) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point {
            value: p.value.filter(|v| *v <= threshold),
            timestamp: p.timestamp,
        })
        .collect()
}

/// Nulls out values strictly below `threshold`.
pub fn remove_below_value(points: &[Point], threshold: f64) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point {
            value: p.value.filter(|v| *v >= threshold),
            timestamp: p.timestamp,
        })
        .collect()
}

/// Replaces null values with `replacement`.
pub fn transform_null(points: &[Point], replacement: f64) -> Vec<Point> {
    points
        .iter()
        .map(|p| Point {
            value: Some(p.value.unwrap_or(replacement)),
            timestamp: p.timestamp,
        })
        .collect()
}

/// Moves every timestamp by `shift_ms`. Fails when a shifted timestamp
/// leaves the `i64` millisecond range.
pub fn unshift(points: &[Point], shift_ms: i64) -> Result<Vec<Point>> {
    points
        .iter()
        .map(|p| {
            let timestamp = p
                .timestamp
                .checked_add(shift_ms)
                .ok_or(Error::TimestampOverflow {
                    timestamp: p.timestamp,
                    shift_ms,
                })?;
            Ok(Point {
                value: p.value,
                timestamp,
            })
        })
        .collect()
}
