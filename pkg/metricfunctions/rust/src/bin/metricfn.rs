// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dd_metric_functions::config::{self, CONFIG_ENV};
use dd_metric_functions::{Category, FunctionDef, Series, catalog};

#[derive(Parser, Debug)]
#[command(name = "metricfn")]
#[command(about = "Applies catalog metric functions to time series", long_about = None)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: log::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the function catalog grouped by category
    Functions,
    /// Apply every configured target to a series file
    Apply {
        /// Pipeline configuration (YAML)
        #[arg(short, long, env = CONFIG_ENV)]
        config: PathBuf,
        /// Input series (JSON array of {label, points})
        #[arg(short, long)]
        series: PathBuf,
        /// Start of the requested range in epoch seconds
        #[arg(long, requires = "to")]
        from: Option<i64>,
        /// End of the requested range in epoch seconds
        #[arg(long, requires = "from")]
        to: Option<i64>,
    },
}

fn parse_level(raw: &str) -> std::result::Result<log::Level, String> {
    raw.parse()
        .map_err(|_| format!("unknown log level {raw:?}"))
}

fn load_series(path: &Path) -> Result<Vec<Series>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn list_functions() -> Result<String> {
    let listing: BTreeMap<Category, Vec<&FunctionDef>> = catalog::builtin()
        .categories()
        .iter()
        .map(|(category, defs)| (*category, defs.iter().map(AsRef::as_ref).collect()))
        .collect();
    Ok(serde_json::to_string_pretty(&listing)?)
}

fn apply(config_path: &Path, series_path: &Path, range: Option<(i64, i64)>) -> Result<String> {
    let config = config::load_config(config_path)?;
    let input = load_series(series_path)?;
    let reports = config.run(&input, catalog::builtin(), range)?;
    Ok(serde_json::to_string_pretty(&reports)?)
}

#[allow(clippy::print_stdout)]
fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(args.log_level)?;

    let output = match &args.command {
        Command::Functions => list_functions()?,
        Command::Apply {
            config,
            series,
            from,
            to,
        } => apply(config, series, from.zip(*to))?,
    };
    println!("{output}");
    Ok(())
}
