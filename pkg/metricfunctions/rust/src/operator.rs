// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Binding of function instances to executable operations.
//!
//! Every catalog name that has an implementation maps to one [`Operator`].
//! Binding reads the instance's positional parameters, coerces them to the
//! types the operation needs and captures them in a [`Call`]. The pipeline
//! then invokes the call through the entry point matching its phase.

use std::str::FromStr;

use regex::Regex;

use crate::aggregate::Aggregator;
use crate::catalog::{Category, ParamType, ParamValue};
use crate::errors::{Error, Result};
use crate::functions::{self, AliasPattern, Limit, SortDirection};
use crate::instance::FunctionInstance;
use crate::interval::{self, Interval};
use crate::point::{Point, Series};
use crate::timeseries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    GroupBy,
    Scale,
    Offset,
    Delta,
    Rate,
    MovingAverage,
    ExponentialMovingAverage,
    Percentile,
    RemoveAboveValue,
    RemoveBelowValue,
    TransformNull,
    SumSeries,
    Median,
    Average,
    Min,
    Max,
    Sum,
    Count,
    PercentileAgg,
    AggregateBy,
    Top,
    Bottom,
    SortSeries,
    TimeShift,
    SetAlias,
    SetAliasByRegex,
    ReplaceAlias,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::GroupBy => "groupBy",
            Operator::Scale => "scale",
            Operator::Offset => "offset",
            Operator::Delta => "delta",
            Operator::Rate => "rate",
            Operator::MovingAverage => "movingAverage",
            Operator::ExponentialMovingAverage => "exponentialMovingAverage",
            Operator::Percentile => "percentile",
            Operator::RemoveAboveValue => "removeAboveValue",
            Operator::RemoveBelowValue => "removeBelowValue",
            Operator::TransformNull => "transformNull",
            Operator::SumSeries => "sumSeries",
            Operator::Median => "median",
            Operator::Average => "average",
            Operator::Min => "min",
            Operator::Max => "max",
            Operator::Sum => "sum",
            Operator::Count => "count",
            Operator::PercentileAgg => "percentileAgg",
            Operator::AggregateBy => "aggregateBy",
            Operator::Top => "top",
            Operator::Bottom => "bottom",
            Operator::SortSeries => "sortSeries",
            Operator::TimeShift => "timeShift",
            Operator::SetAlias => "setAlias",
            Operator::SetAliasByRegex => "setAliasByRegex",
            Operator::ReplaceAlias => "replaceAlias",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let op = match s {
            "groupBy" => Operator::GroupBy,
            "scale" => Operator::Scale,
            "offset" => Operator::Offset,
            "delta" => Operator::Delta,
            "rate" => Operator::Rate,
            "movingAverage" => Operator::MovingAverage,
            "exponentialMovingAverage" => Operator::ExponentialMovingAverage,
            "percentile" => Operator::Percentile,
            "removeAboveValue" => Operator::RemoveAboveValue,
            "removeBelowValue" => Operator::RemoveBelowValue,
            "transformNull" => Operator::TransformNull,
            "sumSeries" => Operator::SumSeries,
            "median" => Operator::Median,
            "average" => Operator::Average,
            "min" => Operator::Min,
            "max" => Operator::Max,
            "sum" => Operator::Sum,
            "count" => Operator::Count,
            "percentileAgg" => Operator::PercentileAgg,
            "aggregateBy" => Operator::AggregateBy,
            "top" => Operator::Top,
            "bottom" => Operator::Bottom,
            "sortSeries" => Operator::SortSeries,
            "timeShift" => Operator::TimeShift,
            "setAlias" => Operator::SetAlias,
            "setAliasByRegex" => Operator::SetAliasByRegex,
            "replaceAlias" => Operator::ReplaceAlias,
            _ => return Err(Error::MethodNotFound(s.to_string())),
        };
        Ok(op)
    }
}

/// An operation with its arguments captured.
#[derive(Debug, Clone)]
pub enum Call {
    GroupBy { interval: Interval, agg: Aggregator },
    Scale(f64),
    Offset(f64),
    Delta,
    Rate,
    MovingAverage(usize),
    ExponentialMovingAverage(f64),
    RemoveAboveValue(f64),
    RemoveBelowValue(f64),
    TransformNull(f64),

    SumSeries,
    AggregateBy { interval: Interval, agg: Aggregator },

    Limit { which: Limit, n: usize, order_by: Aggregator },
    SortSeries(SortDirection),

    SetAlias(String),
    SetAliasByRegex(Regex),
    ReplaceAlias { pattern: AliasPattern, replacement: String },

    TimeShift(i64),
}

impl Call {
    /// Phase whose data shape the call consumes.
    pub fn phase(&self) -> Category {
        match self {
            Call::GroupBy { .. }
            | Call::Scale(_)
            | Call::Offset(_)
            | Call::Delta
            | Call::Rate
            | Call::MovingAverage(_)
            | Call::ExponentialMovingAverage(_)
            | Call::RemoveAboveValue(_)
            | Call::RemoveBelowValue(_)
            | Call::TransformNull(_) => Category::Transform,
            Call::SumSeries | Call::AggregateBy { .. } => Category::Aggregate,
            Call::Limit { .. } | Call::SortSeries(_) => Category::Filter,
            Call::SetAlias(_) | Call::SetAliasByRegex(_) | Call::ReplaceAlias { .. } => {
                Category::Alias
            }
            Call::TimeShift(_) => Category::Time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundFunction {
    name: String,
    call: Call,
}

impl BoundFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self) -> &Call {
        &self.call
    }

    pub fn phase(&self) -> Category {
        self.call.phase()
    }

    fn mismatch(&self, phase: Category) -> Error {
        Error::PhaseMismatch {
            function: self.name.clone(),
            phase,
        }
    }

    /// Runs a per-series transform or a time shift over one point sequence.
    pub fn apply_points(&self, points: &[Point]) -> Result<Vec<Point>> {
        let out = match &self.call {
            Call::GroupBy { interval, agg } => timeseries::group_by_perf(points, *interval, *agg),
            Call::Scale(factor) => timeseries::scale(points, *factor),
            Call::Offset(delta) => timeseries::offset(points, *delta),
            Call::Delta => timeseries::delta(points),
            Call::Rate => timeseries::rate(points),
            Call::MovingAverage(n) => timeseries::simple_moving_average(points, *n),
            Call::ExponentialMovingAverage(n) => timeseries::exp_moving_average(points, *n),
            Call::RemoveAboveValue(threshold) => timeseries::remove_above_value(points, *threshold),
            Call::RemoveBelowValue(threshold) => timeseries::remove_below_value(points, *threshold),
            Call::TransformNull(value) => timeseries::transform_null(points, *value),
            Call::TimeShift(shift_ms) => timeseries::unshift(points, *shift_ms)?,
            _ => return Err(self.mismatch(Category::Transform)),
        };
        Ok(out)
    }

    /// Merges several point sequences into one.
    pub fn apply_sets(&self, sets: &[Vec<Point>]) -> Result<Vec<Point>> {
        match &self.call {
            Call::SumSeries => Ok(timeseries::sum_series(sets)),
            Call::AggregateBy { interval, agg } => Ok(functions::aggregate_by(sets, *interval, *agg)),
            _ => Err(self.mismatch(Category::Aggregate)),
        }
    }

    /// Reorders or trims a series collection.
    pub fn apply_series(&self, series: Vec<Series>) -> Result<Vec<Series>> {
        match &self.call {
            Call::Limit { which, n, order_by } => Ok(functions::limit(series, *which, *n, *order_by)),
            Call::SortSeries(direction) => Ok(functions::sort_series(series, *direction)),
            _ => Err(self.mismatch(Category::Filter)),
        }
    }

    /// Rewrites one series' label.
    pub fn apply_label(&self, series: Series) -> Result<Series> {
        match &self.call {
            Call::SetAlias(alias) => Ok(functions::set_alias(series, alias)),
            Call::SetAliasByRegex(regex) => Ok(functions::set_alias_by_regex(series, regex)),
            Call::ReplaceAlias {
                pattern,
                replacement,
            } => Ok(functions::replace_alias(series, pattern, replacement)),
            _ => Err(self.mismatch(Category::Alias)),
        }
    }
}

/// Positional view over an instance's parameters. Missing trailing values
/// fall back to the definition's defaults.
struct Args<'a> {
    instance: &'a FunctionInstance,
}

impl<'a> Args<'a> {
    fn value(&self, index: usize) -> Result<&'a ParamValue> {
        let instance: &'a FunctionInstance = self.instance;
        instance
            .params()
            .get(index)
            .or_else(|| instance.def().default_params.get(index))
            .ok_or_else(|| self.invalid(index, "missing value"))
    }

    fn invalid(&self, index: usize, reason: impl Into<String>) -> Error {
        Error::invalid_param(self.instance.name(), index, reason)
    }

    fn declared(&self, index: usize) -> Option<ParamType> {
        self.instance.def().params.get(index).map(|spec| spec.kind)
    }

    fn number(&self, index: usize) -> Result<f64> {
        let value = self.value(index)?;
        value
            .as_number()
            .ok_or_else(|| self.invalid(index, format!("{value} is not a number")))
    }

    /// Non-negative integral count.
    fn count(&self, index: usize) -> Result<usize> {
        let n = self.number(index)?;
        if n.fract() != 0.0 || n < 0.0 {
            return Err(self.invalid(index, format!("{n} is not a non-negative integer")));
        }
        Ok(n as usize)
    }

    fn text(&self, index: usize) -> Result<String> {
        Ok(self.value(index)?.to_string())
    }

    fn interval(&self, index: usize) -> Result<Interval> {
        Interval::parse(&self.text(index)?)
    }

    fn aggregator(&self, index: usize) -> Result<Aggregator> {
        self.text(index)?
            .parse()
            .map_err(|reason: String| self.invalid(index, reason))
    }

    fn percent(&self, index: usize) -> Result<f64> {
        let p = self.number(index)?;
        if !(0.0..=100.0).contains(&p) {
            return Err(self.invalid(index, format!("percentile {p} outside [0, 100]")));
        }
        Ok(p)
    }

    /// Coerces every int/float parameter up front so a bad value fails the
    /// bind even when the operation ignores it.
    fn check_numeric(&self) -> Result<()> {
        for index in 0..self.instance.params().len() {
            match self.declared(index) {
                Some(ParamType::Int) => {
                    let n = self.number(index)?;
                    if n.fract() != 0.0 {
                        return Err(self.invalid(index, format!("{n} is not an integer")));
                    }
                }
                Some(ParamType::Float) => {
                    self.number(index)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Resolves `instance` to its operation with parameters captured.
pub fn bind(instance: &FunctionInstance) -> Result<BoundFunction> {
    let op: Operator = instance.name().parse()?;
    let args = Args { instance };
    args.check_numeric()?;

    let call = match op {
        Operator::GroupBy => Call::GroupBy {
            interval: args.interval(0)?,
            agg: args.aggregator(1)?,
        },
        Operator::Percentile => Call::GroupBy {
            interval: args.interval(0)?,
            agg: Aggregator::Percentile(args.percent(1)?),
        },
        Operator::Scale => Call::Scale(args.number(0)?),
        Operator::Offset => Call::Offset(args.number(0)?),
        Operator::Delta => Call::Delta,
        Operator::Rate => Call::Rate,
        Operator::MovingAverage => {
            let n = args.count(0)?;
            if n == 0 {
                return Err(args.invalid(0, "window must hold at least one point"));
            }
            Call::MovingAverage(n)
        }
        Operator::ExponentialMovingAverage => {
            let n = args.number(0)?;
            if n <= 0.0 {
                return Err(args.invalid(0, format!("smoothing {n} must be positive")));
            }
            Call::ExponentialMovingAverage(n)
        }
        Operator::RemoveAboveValue => Call::RemoveAboveValue(args.number(0)?),
        Operator::RemoveBelowValue => Call::RemoveBelowValue(args.number(0)?),
        Operator::TransformNull => Call::TransformNull(args.number(0)?),

        Operator::SumSeries => Call::SumSeries,
        Operator::Median => aggregate_by(&args, Aggregator::Median)?,
        Operator::Average => aggregate_by(&args, Aggregator::Avg)?,
        Operator::Min => aggregate_by(&args, Aggregator::Min)?,
        Operator::Max => aggregate_by(&args, Aggregator::Max)?,
        Operator::Sum => aggregate_by(&args, Aggregator::Sum)?,
        Operator::Count => aggregate_by(&args, Aggregator::Count)?,
        Operator::PercentileAgg => aggregate_by(&args, Aggregator::Percentile(args.percent(1)?))?,
        Operator::AggregateBy => aggregate_by(&args, args.aggregator(1)?)?,

        Operator::Top | Operator::Bottom => Call::Limit {
            which: if op == Operator::Top {
                Limit::Top
            } else {
                Limit::Bottom
            },
            n: args.count(0)?,
            order_by: args.aggregator(1)?,
        },
        Operator::SortSeries => Call::SortSeries(
            args.text(0)?
                .parse()
                .map_err(|reason: String| args.invalid(0, reason))?,
        ),

        Operator::TimeShift => Call::TimeShift(interval::parse_time_shift(&args.text(0)?)?),

        Operator::SetAlias => Call::SetAlias(args.text(0)?),
        Operator::SetAliasByRegex => Call::SetAliasByRegex(functions::compile_regex(&args.text(0)?)?),
        Operator::ReplaceAlias => Call::ReplaceAlias {
            pattern: AliasPattern::parse(&args.text(0)?)?,
            replacement: args.text(1)?,
        },
    };

    Ok(BoundFunction {
        name: op.name().to_string(),
        call,
    })
}

fn aggregate_by(args: &Args<'_>, agg: Aggregator) -> Result<Call> {
    Ok(Call::AggregateBy {
        interval: args.interval(0)?,
        agg,
    })
}
