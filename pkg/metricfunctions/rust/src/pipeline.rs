// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Applies a target's function list to the series retrieved for it.
//!
//! Functions run phase by phase, not in list order: per-series transforms,
//! then filters, then aggregates, then aliases, then the time-shift fixup.
//! Within a phase, list order is kept.

use log::debug;
use rayon::prelude::*;

use crate::aggregate::Aggregator;
use crate::catalog::Category;
use crate::errors::{Error, Result};
use crate::instance::FunctionInstance;
use crate::interval::Interval;
use crate::operator::BoundFunction;
use crate::point::{Point, Series};
use crate::timeseries;

/// One query target: a metric selector and the functions applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTarget {
    pub metric: String,
    pub functions: Vec<FunctionInstance>,
}

#[derive(Default)]
struct Phases {
    transform: Vec<BoundFunction>,
    filter: Vec<BoundFunction>,
    aggregate: Vec<BoundFunction>,
    alias: Vec<BoundFunction>,
    time_shift: Option<BoundFunction>,
    aggregate_label: Option<String>,
}

impl PipelineTarget {
    pub fn new(metric: impl Into<String>, functions: Vec<FunctionInstance>) -> Self {
        Self {
            metric: metric.into(),
            functions,
        }
    }

    /// Whether a retrieved series belongs to this target. A trailing `*`
    /// selects by prefix.
    pub fn selects(&self, label: &str) -> bool {
        match self.metric.strip_suffix('*') {
            Some(prefix) => label.starts_with(prefix),
            None => label == self.metric,
        }
    }

    fn bind_phases(&self) -> Result<Phases> {
        let mut phases = Phases::default();
        for instance in &self.functions {
            match instance.category() {
                Category::Transform => phases.transform.push(instance.bind()?),
                Category::Filter => phases.filter.push(instance.bind()?),
                Category::Aggregate => {
                    phases.aggregate.push(instance.bind()?);
                    phases.aggregate_label = Some(instance.text());
                }
                Category::Alias => phases.alias.push(instance.bind()?),
                Category::Time => {
                    if phases.time_shift.is_none() && instance.name() == "timeShift" {
                        phases.time_shift = Some(instance.bind()?);
                    } else {
                        debug!("ignoring extra time function {}", instance.text());
                    }
                }
                Category::Trends | Category::Special => {
                    debug!("{} is applied at retrieval, skipping", instance.text());
                }
            }
        }
        Ok(phases)
    }

    /// Runs every phase over `series`. Input points are time-sorted first;
    /// output series keep ascending timestamps.
    pub fn apply(&self, series: Vec<Series>) -> Result<Vec<Series>> {
        let phases = self.bind_phases()?;
        debug!(
            "applying {} functions to {} series of {}",
            self.functions.len(),
            series.len(),
            self.metric
        );

        let mut series = series
            .into_iter()
            .map(|s| {
                let mut points = if s.is_sorted() {
                    s.points
                } else {
                    debug!("sorting {} points of {}", s.points.len(), s.label);
                    timeseries::sort_by_time(&s.points)
                };
                for func in &phases.transform {
                    points = func.apply_points(&points)?;
                }
                Ok(Series::new(s.label, points))
            })
            .collect::<Result<Vec<_>>>()?;

        for func in &phases.filter {
            series = func.apply_series(series)?;
        }

        if let Some(label) = phases.aggregate_label {
            let mut sets: Vec<Vec<Point>> = series.into_iter().map(|s| s.points).collect();
            for func in &phases.aggregate {
                sets = vec![func.apply_sets(&sets)?];
            }
            let points = sets.into_iter().next().unwrap_or_default();
            series = vec![Series::new(label, points)];
        }

        for func in &phases.alias {
            series = series
                .into_iter()
                .map(|s| func.apply_label(s))
                .collect::<Result<_>>()?;
        }

        if let Some(shift) = &phases.time_shift {
            for s in &mut series {
                s.points = shift.apply_points(&s.points)?;
            }
        }

        Ok(series)
    }

    /// Reducer named by the first `consolidateBy`, averaging when absent.
    pub fn consolidation(&self) -> Result<Aggregator> {
        let Some(instance) = self
            .functions
            .iter()
            .find(|f| f.name() == "consolidateBy")
        else {
            return Ok(Aggregator::Avg);
        };
        let raw = instance
            .params()
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| "avg".to_string());
        raw.parse()
            .map_err(|reason: String| Error::invalid_param(instance.name(), 0, reason))
    }

    /// The time-shift interval to apply at retrieval, if any.
    pub fn time_shift(&self) -> Option<String> {
        self.functions
            .iter()
            .find(|f| f.name() == "timeShift")
            .and_then(|f| f.params().first())
            .map(ToString::to_string)
    }
}

/// Applies `target` to `series`.
pub fn apply_functions(series: Vec<Series>, target: &PipelineTarget) -> Result<Vec<Series>> {
    target.apply(series)
}

/// Reduces every series holding more than `max_data_points` points by
/// downsampling it onto `interval` windows ending at its last timestamp.
pub fn consolidate(
    series: Vec<Series>,
    max_data_points: usize,
    interval: Interval,
    agg: Aggregator,
) -> Vec<Series> {
    let Interval::Fixed(ms_interval) = interval else {
        return series;
    };
    series
        .into_iter()
        .map(|mut s| {
            if s.points.len() > max_data_points {
                if let Some(last) = s.points.last() {
                    let time_to_sec = last.timestamp.div_euclid(1000);
                    debug!(
                        "consolidating {} from {} points over {interval}",
                        s.label,
                        s.points.len()
                    );
                    s.points = timeseries::downsample(&s.points, time_to_sec, ms_interval, agg);
                }
            }
            s
        })
        .collect()
}

/// Runs independent targets in parallel, one result per target in input
/// order.
pub fn run_targets(jobs: Vec<(PipelineTarget, Vec<Series>)>) -> Vec<Result<Vec<Series>>> {
    jobs.into_par_iter()
        .map(|(target, series)| target.apply(series))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::catalog::{self, ParamValue};

    fn func(name: &str, params: Vec<ParamValue>) -> FunctionInstance {
        FunctionInstance::from_catalog(catalog::builtin(), name, Some(params)).unwrap()
    }

    fn series(label: &str, points: &[(f64, i64)]) -> Series {
        Series::new(
            label,
            points.iter().map(|(v, ts)| Point::new(*v, *ts)).collect(),
        )
    }

    #[test]
    fn test_no_functions_sorts_only() {
        let target = PipelineTarget::new("m", Vec::new());
        let out = target
            .apply(vec![series("m", &[(2.0, 2000), (1.0, 1000)])])
            .unwrap();
        assert_eq!(out, vec![series("m", &[(1.0, 1000), (2.0, 2000)])]);
    }

    #[test]
    fn test_phase_order_ignores_list_order() {
        // Alias listed first still runs after the aggregate.
        let target = PipelineTarget::new(
            "m",
            vec![
                func("setAlias", vec!["total".into()]),
                func("sum", vec!["1m".into()]),
                func("scale", vec![2.into()]),
            ],
        );
        let out = target
            .apply(vec![
                series("a", &[(1.0, 0)]),
                series("b", &[(2.0, 0)]),
            ])
            .unwrap();
        assert_eq!(out, vec![series("total", &[(6.0, 0)])]);
    }

    #[test]
    fn test_aggregate_label_is_last_aggregate_text() {
        let target = PipelineTarget::new(
            "m",
            vec![func("sumSeries", vec![]), func("max", vec!["1m".into()])],
        );
        let out = target
            .apply(vec![
                series("a", &[(1.0, 0), (3.0, 1000)]),
                series("b", &[(2.0, 0), (2.0, 1000)]),
            ])
            .unwrap();
        assert_eq!(out, vec![series("max(1m)", &[(5.0, 0)])]);
    }

    #[test]
    fn test_filter_runs_before_aggregate() {
        let target = PipelineTarget::new(
            "m",
            vec![
                func("sum", vec!["1m".into()]),
                func("top", vec![1.into(), "avg".into()]),
            ],
        );
        let out = target
            .apply(vec![
                series("low", &[(1.0, 0)]),
                series("high", &[(10.0, 0)]),
            ])
            .unwrap();
        assert_eq!(out, vec![series("sum(1m)", &[(10.0, 0)])]);
    }

    #[test]
    fn test_time_shift_restores_axis() {
        let target = PipelineTarget::new("m", vec![func("timeShift", vec!["1h".into()])]);
        let out = target.apply(vec![series("m", &[(1.0, 0)])]).unwrap();
        assert_eq!(out, vec![series("m", &[(1.0, 3_600_000)])]);
        assert_eq!(target.time_shift(), Some("1h".to_string()));
    }

    #[test]
    fn test_time_shift_overflow_is_an_error() {
        let target = PipelineTarget::new(
            "m",
            vec![func("timeShift", vec!["106751991167d".into()])],
        );
        assert!(matches!(
            target.apply(vec![series("m", &[(1.0, 1_700_000_000_000)])]),
            Err(Error::TimestampOverflow { .. })
        ));
    }

    #[test]
    fn test_trends_and_special_skipped() {
        let target = PipelineTarget::new(
            "m",
            vec![
                func("trendValue", vec!["max".into()]),
                func("consolidateBy", vec!["max".into()]),
            ],
        );
        let input = vec![series("m", &[(1.0, 0)])];
        assert_eq!(target.apply(input.clone()).unwrap(), input);
        assert_eq!(target.consolidation().unwrap(), Aggregator::Max);
        assert_eq!(
            PipelineTarget::new("m", Vec::new()).consolidation().unwrap(),
            Aggregator::Avg
        );
    }

    #[test]
    fn test_bind_failure_aborts() {
        let target = PipelineTarget::new("m", vec![func("scale", vec!["x".into()])]);
        assert!(matches!(
            target.apply(vec![series("m", &[(1.0, 0)])]),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_aggregate_of_nothing() {
        let target = PipelineTarget::new("m", vec![func("sum", vec!["1m".into()])]);
        assert_eq!(target.apply(Vec::new()).unwrap(), vec![series("sum(1m)", &[])]);
    }

    #[test]
    fn test_selects() {
        let exact = PipelineTarget::new("cpu", Vec::new());
        assert!(exact.selects("cpu"));
        assert!(!exact.selects("cpu.user"));
        let prefix = PipelineTarget::new("cpu.*", Vec::new());
        assert!(prefix.selects("cpu.user"));
        assert!(!prefix.selects("mem.used"));
    }

    #[test]
    fn test_consolidate_only_long_series() {
        let long = series("long", &[(1.0, 1000), (3.0, 2000), (5.0, 3000), (7.0, 4000)]);
        let short = series("short", &[(1.0, 1000)]);
        let out = consolidate(
            vec![long, short.clone()],
            2,
            Interval::Fixed(2000),
            Aggregator::Max,
        );
        assert_eq!(out[0].points, vec![Point::new(3.0, 2000), Point::new(7.0, 4000)]);
        assert_eq!(out[1], short);
    }

    #[test]
    fn test_run_targets_keeps_order() {
        let jobs = (1..=4)
            .map(|factor| {
                (
                    PipelineTarget::new("m", vec![func("scale", vec![factor.into()])]),
                    vec![series("m", &[(1.0, 0)])],
                )
            })
            .collect();
        let results = run_targets(jobs);
        let firsts: Vec<Option<f64>> = results
            .into_iter()
            .map(|r| r.unwrap()[0].points[0].value)
            .collect();
        assert_eq!(firsts, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
    }
}
