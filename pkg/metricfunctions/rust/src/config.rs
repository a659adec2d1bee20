// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::{Catalog, ParamValue};
use crate::instance::FunctionInstance;
use crate::interval::{self, Interval};
use crate::pipeline::{PipelineTarget, consolidate, run_targets};
use crate::point::Series;

/// Environment variable the CLI reads the config path from.
pub const CONFIG_ENV: &str = "METRICFN_CONFIG";

fn default_consolidation_interval() -> String {
    "1m".to_string()
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Series longer than this are consolidated after the functions ran.
    #[serde(default)]
    pub max_data_points: Option<usize>,
    #[serde(default = "default_consolidation_interval")]
    pub consolidation_interval: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_data_points: None,
            consolidation_interval: default_consolidation_interval(),
        }
    }
}

impl Settings {
    pub fn consolidation_interval(&self) -> Result<Interval> {
        Interval::parse(&self.consolidation_interval)
            .context("invalid settings.consolidation_interval")
    }
}

#[derive(Debug, Deserialize)]
pub struct FunctionConfig {
    pub name: String,
    /// Defaults of the definition are used when omitted.
    #[serde(default)]
    pub params: Option<Vec<ParamValue>>,
}

#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub metric: String,
    #[serde(default)]
    pub ref_id: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,
}

impl TargetConfig {
    /// Resolves every function against `catalog`.
    pub fn build(&self, catalog: &Catalog) -> Result<PipelineTarget> {
        let functions = self
            .functions
            .iter()
            .map(|f| {
                FunctionInstance::from_catalog(catalog, &f.name, f.params.clone())
                    .with_context(|| format!("target {}", self.display_name()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PipelineTarget::new(self.metric.clone(), functions))
    }

    pub fn display_name(&self) -> &str {
        self.ref_id.as_deref().unwrap_or(&self.metric)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Outcome of one visible target. Exactly one of `series` and `error` is set.
#[derive(Debug, Serialize)]
pub struct TargetReport {
    pub target: String,
    /// Requested `(from, to)` window in epoch seconds, moved by the target's
    /// time shift.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_range: Option<(i64, i64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<Series>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineConfig {
    /// Builds, runs and consolidates every visible target over the series it
    /// selects from `input`. A target that fails to build or run is reported
    /// with its error; the others are unaffected. Only invalid settings fail
    /// the whole run.
    pub fn run(
        &self,
        input: &[Series],
        catalog: &Catalog,
        range: Option<(i64, i64)>,
    ) -> Result<Vec<TargetReport>> {
        let consolidation = match self.settings.max_data_points {
            Some(max) => Some((max, self.settings.consolidation_interval()?)),
            None => None,
        };

        let visible: Vec<&TargetConfig> = self.targets.iter().filter(|t| !t.hide).collect();
        let built: Vec<Result<PipelineTarget>> =
            visible.iter().map(|t| t.build(catalog)).collect();

        let jobs: Vec<(PipelineTarget, Vec<Series>)> = built
            .iter()
            .filter_map(|target| target.as_ref().ok())
            .map(|target| {
                let selected: Vec<Series> = input
                    .iter()
                    .filter(|s| target.selects(&s.label))
                    .cloned()
                    .collect();
                if selected.is_empty() {
                    warn!("no series selected by {}", target.metric);
                }
                (target.clone(), selected)
            })
            .collect();
        info!("applying {} targets to {} series", jobs.len(), input.len());
        let mut results = run_targets(jobs).into_iter();

        let reports = visible
            .iter()
            .zip(built)
            .map(|(target_config, built)| {
                let name = target_config.display_name().to_string();
                let outcome = built.and_then(|target| {
                    let series = results.next().context("missing target result")??;
                    let series = match consolidation {
                        Some((max, interval)) => {
                            consolidate(series, max, interval, target.consolidation()?)
                        }
                        None => series,
                    };
                    let request_range = range
                        .map(|(from, to)| match target.time_shift() {
                            Some(shift) => interval::time_shift_range(&shift, from, to),
                            None => Ok((from, to)),
                        })
                        .transpose()?;
                    Ok((request_range, series))
                });
                match outcome {
                    Ok((request_range, series)) => TargetReport {
                        target: name,
                        request_range,
                        series: Some(series),
                        error: None,
                    },
                    Err(e) => {
                        warn!("target {name} failed: {e:#}");
                        TargetReport {
                            target: name,
                            request_range: None,
                            series: None,
                            error: Some(format!("{e:#}")),
                        }
                    }
                }
            })
            .collect();
        Ok(reports)
    }
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse_config(contents: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(contents)?;
    Ok(config)
}
