// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Catalog-driven metric functions for time series.
//!
//! A query target names a metric and an ordered list of function instances
//! looked up from a [`Catalog`]. [`apply_functions`] binds the instances and
//! runs them over the series retrieved for the target: per-series transforms,
//! filters, multi-series aggregation, alias rewrites and the time-shift fixup.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod functions;
pub mod instance;
pub mod interval;
pub mod operator;
pub mod pipeline;
pub mod point;
pub mod timeseries;

pub use aggregate::Aggregator;
pub use catalog::{Catalog, CatalogBuilder, Category, FunctionDef, ParamSpec, ParamType, ParamValue};
pub use errors::{Error, Result};
pub use instance::FunctionInstance;
pub use interval::Interval;
pub use operator::BoundFunction;
pub use pipeline::{PipelineTarget, apply_functions, consolidate, run_targets};
pub use point::{Point, Series};
