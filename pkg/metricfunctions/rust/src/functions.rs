// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Metric functions that work on whole series or series collections:
//! multi-series aggregation, filters and alias rewrites.

use std::cmp::{Ordering, Reverse};
use std::str::FromStr;

use log::warn;
use regex::{Regex, RegexBuilder};

use crate::aggregate::Aggregator;
use crate::errors::{Error, Result};
use crate::interval::Interval;
use crate::point::{Point, Series};
use crate::timeseries;

/// Flattens every set into one time-sorted sequence and groups it.
pub fn aggregate_by(sets: &[Vec<Point>], interval: Interval, agg: Aggregator) -> Vec<Point> {
    let sorted = timeseries::sort_by_time(&timeseries::flatten(sets));
    timeseries::group_by_perf(&sorted, interval, agg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Top,
    Bottom,
}

/// Keeps the `n` series ranking highest (`Top`) or lowest (`Bottom`) by
/// `order_by` over their values. Series whose rank is null sort last.
pub fn limit(series: Vec<Series>, which: Limit, n: usize, order_by: Aggregator) -> Vec<Series> {
    let mut ranked: Vec<(Option<f64>, Series)> = series
        .into_iter()
        .map(|s| (order_by.apply(&s.values()), s))
        .collect();
    ranked.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    let keep = n.min(ranked.len());
    let kept = match which {
        Limit::Bottom => ranked.into_iter().take(keep).collect::<Vec<_>>(),
        Limit::Top => {
            let skip = ranked.len() - keep;
            ranked.into_iter().skip(skip).collect()
        }
    };
    kept.into_iter().map(|(_, s)| s).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(format!("unknown sort direction {s:?}, expected asc or desc")),
        }
    }
}

/// Stable sort by lower-cased label.
pub fn sort_series(mut series: Vec<Series>, direction: SortDirection) -> Vec<Series> {
    match direction {
        SortDirection::Asc => series.sort_by_cached_key(|s| s.label.to_lowercase()),
        SortDirection::Desc => series.sort_by_cached_key(|s| Reverse(s.label.to_lowercase())),
    }
    series
}

/// A label pattern: either a literal substring or a compiled regex written as
/// `/pattern/flags`.
#[derive(Debug, Clone)]
pub enum AliasPattern {
    Literal(String),
    Regex { regex: Regex, global: bool },
}

impl AliasPattern {
    /// `/re/flags` (flags from `g`, `i`, `m`) compiles to a regex; anything
    /// else is matched literally.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some((body, flags)) = split_regex_literal(raw) else {
            return Ok(AliasPattern::Literal(raw.to_string()));
        };
        let regex = RegexBuilder::new(body)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .build()
            .map_err(|e| Error::InvalidRegex {
                pattern: raw.to_string(),
                reason: e.to_string(),
            })?;
        Ok(AliasPattern::Regex {
            regex,
            global: flags.contains('g'),
        })
    }

    /// Replaces the first occurrence, or every match for a global regex.
    ///
    /// For regex patterns `$1`..`$99` name capture groups, `$<name>` a named
    /// group, `$&` the whole match and `$$` a literal `$`. A group reference
    /// ends at its digits, so `$2_avg` is group 2 followed by `_avg`.
    pub fn replace(&self, label: &str, replacement: &str) -> String {
        match self {
            AliasPattern::Literal(needle) => label.replacen(needle.as_str(), replacement, 1),
            AliasPattern::Regex {
                regex,
                global: true,
            } => regex
                .replace_all(label, expand_template(replacement, regex).as_str())
                .into_owned(),
            AliasPattern::Regex { regex, .. } => regex
                .replace(label, expand_template(replacement, regex).as_str())
                .into_owned(),
        }
    }
}

/// Rewrites `replacement` into the braced `${n}` form understood by
/// [`Regex::replace`]. References to groups `regex` does not have stay
/// literal text.
fn expand_template(replacement: &str, regex: &Regex) -> String {
    let groups = regex.captures_len();
    let mut expanded = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                expanded.push_str("$$");
            }
            Some('&') => {
                chars.next();
                expanded.push_str("${0}");
            }
            Some(first) if first.is_ascii_digit() => {
                chars.next();
                let mut digits = String::from(first);
                if let Some(second) = chars.peek().copied().filter(char::is_ascii_digit) {
                    let two = format!("{first}{second}");
                    if two.parse::<usize>().is_ok_and(|n| n >= 1 && n < groups) {
                        chars.next();
                        digits = two;
                    }
                }
                if digits.parse::<usize>().is_ok_and(|n| n >= 1 && n < groups) {
                    expanded.push_str(&format!("${{{digits}}}"));
                } else {
                    expanded.push_str("$$");
                    expanded.push_str(&digits);
                }
            }
            Some('<') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '>' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if closed && regex.capture_names().flatten().any(|group| group == name) {
                    expanded.push_str(&format!("${{{name}}}"));
                } else {
                    expanded.push_str("$$<");
                    expanded.push_str(&name.replace('$', "$$"));
                    if closed {
                        expanded.push('>');
                    }
                }
            }
            _ => expanded.push_str("$$"),
        }
    }
    expanded
}

fn split_regex_literal(raw: &str) -> Option<(&str, &str)> {
    let (body, flags) = raw.strip_prefix('/')?.rsplit_once('/')?;
    flags
        .chars()
        .all(|c| matches!(c, 'g' | 'i' | 'm'))
        .then_some((body, flags))
}

/// Compiles a plain (unslashed) regex, as taken by `setAliasByRegex`.
pub fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub fn set_alias(mut series: Series, alias: &str) -> Series {
    series.label = alias.to_string();
    series
}

/// Label becomes the first match of `regex`; unchanged when nothing matches.
pub fn set_alias_by_regex(mut series: Series, regex: &Regex) -> Series {
    match regex.find(&series.label) {
        Some(found) => series.label = found.as_str().to_string(),
        None => warn!(
            "alias pattern {} does not match series {:?}, keeping label",
            regex.as_str(),
            series.label
        ),
    }
    series
}

pub fn replace_alias(mut series: Series, pattern: &AliasPattern, replacement: &str) -> Series {
    series.label = pattern.replace(&series.label, replacement);
    series
}
