// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Core data types shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};

/// A single sample. `value == None` is an explicit gap and is never
/// conflated with `0`.
///
/// Serialized as `[value, timestamp_ms]`, the shape the retrieval and
/// display layers exchange.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Option<f64>, i64)", into = "(Option<f64>, i64)")]
pub struct Point {
    pub value: Option<f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Point {
    pub fn new(value: f64, timestamp: i64) -> Self {
        Self {
            value: Some(value),
            timestamp,
        }
    }

    pub fn null(timestamp: i64) -> Self {
        Self {
            value: None,
            timestamp,
        }
    }

    /// Same timestamp, value rewritten by `f` when present.
    pub fn map_value(self, f: impl FnOnce(f64) -> f64) -> Self {
        Self {
            value: self.value.map(f),
            timestamp: self.timestamp,
        }
    }
}

impl From<(Option<f64>, i64)> for Point {
    fn from((value, timestamp): (Option<f64>, i64)) -> Self {
        Self { value, timestamp }
    }
}

impl From<Point> for (Option<f64>, i64) {
    fn from(point: Point) -> Self {
        (point.value, point.timestamp)
    }
}

/// A labeled sequence of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(label: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Whether timestamps never decrease.
    pub fn is_sorted(&self) -> bool {
        self.points.is_sorted_by_key(|p| p.timestamp)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, 1000)).unwrap();
        assert_eq!(json, "[1.5,1000]");

        let json = serde_json::to_string(&Point::null(2000)).unwrap();
        assert_eq!(json, "[null,2000]");
    }

    #[test]
    fn test_series_from_json() {
        let series: Series =
            serde_json::from_str(r#"{"label":"pv:temp","points":[[1,1000],[null,2000]]}"#)
                .unwrap();
        assert_eq!(series.label, "pv:temp");
        assert_eq!(series.points, vec![Point::new(1.0, 1000), Point::null(2000)]);
        assert!(series.is_sorted());
    }

    #[test]
    fn test_map_value_keeps_null() {
        assert_eq!(Point::null(5).map_value(|v| v * 2.0), Point::null(5));
        assert_eq!(Point::new(2.0, 5).map_value(|v| v * 2.0), Point::new(4.0, 5));
    }
}
