// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Registry of known metric functions.
//!
//! A [`Catalog`] is assembled once through a [`CatalogBuilder`] and is
//! read-only afterwards, so it can be shared freely between threads. The
//! built-in set is available process-wide through [`builtin`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregator;
use crate::errors::{Error, Result};

/// Pipeline phase a function belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Transform,
    Aggregate,
    Filter,
    Trends,
    Time,
    Alias,
    Special,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Transform,
        Category::Aggregate,
        Category::Filter,
        Category::Trends,
        Category::Time,
        Category::Alias,
        Category::Special,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transform => "Transform",
            Category::Aggregate => "Aggregate",
            Category::Filter => "Filter",
            Category::Trends => "Trends",
            Category::Time => "Time",
            Category::Alias => "Alias",
            Category::Special => "Special",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Int,
    Float,
    String,
    Boolean,
    IntOrInterval,
    ValueOrSeries,
}

/// A literal parameter value as written in a query or a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view of the value; numeric strings count, booleans do not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Number(n)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Number(f64::from(n))
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ParamValue>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl ParamSpec {
    pub fn new(name: &str, kind: ParamType) -> Self {
        Self {
            name: name.to_string(),
            kind,
            options: Vec::new(),
            optional: false,
        }
    }

    pub fn options<V: Into<ParamValue>>(mut self, options: impl IntoIterator<Item = V>) -> Self {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    pub category: Category,
    pub params: Vec<ParamSpec>,
    pub default_params: Vec<ParamValue>,
}

impl FunctionDef {
    pub fn new(name: &str, category: Category) -> Self {
        Self {
            name: name.to_string(),
            short_name: None,
            category,
            params: Vec::new(),
            default_params: Vec::new(),
        }
    }

    pub fn short_name(mut self, short_name: &str) -> Self {
        self.short_name = Some(short_name.to_string());
        self
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn defaults<V: Into<ParamValue>>(mut self, defaults: impl IntoIterator<Item = V>) -> Self {
        self.default_params = defaults.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDefinition {
            function: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("empty function name".to_string()));
        }
        let mut seen = HashSet::new();
        let mut optional_seen = false;
        for (i, spec) in self.params.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(invalid(format!("parameter #{i} has no name")));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(invalid(format!("parameter {} declared twice", spec.name)));
            }
            if optional_seen && !spec.optional {
                return Err(invalid(format!(
                    "required parameter {} follows an optional one",
                    spec.name
                )));
            }
            optional_seen |= spec.optional;
        }
        if self.default_params.len() > self.params.len() {
            return Err(invalid(format!(
                "{} defaults for {} parameters",
                self.default_params.len(),
                self.params.len()
            )));
        }
        Ok(())
    }
}

/// Collects definitions before freezing them into a [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    defs: Vec<FunctionDef>,
    names: HashSet<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and adds a definition. It becomes reachable under its name
    /// and, when set, its short name.
    pub fn register(&mut self, def: FunctionDef) -> Result<&mut Self> {
        def.validate()?;
        for key in std::iter::once(&def.name).chain(def.short_name.as_ref()) {
            if self.names.contains(key) {
                return Err(Error::DuplicateDefinition(key.clone()));
            }
        }
        self.names.insert(def.name.clone());
        if let Some(short_name) = &def.short_name {
            self.names.insert(short_name.clone());
        }
        self.defs.push(def);
        Ok(self)
    }

    pub fn build(self) -> Catalog {
        let mut index = HashMap::new();
        let mut categories: BTreeMap<Category, Vec<Arc<FunctionDef>>> =
            Category::ALL.iter().map(|c| (*c, Vec::new())).collect();

        for def in self.defs {
            let def = Arc::new(def);
            if let Some(short_name) = &def.short_name {
                index.insert(short_name.clone(), Arc::clone(&def));
            }
            index.insert(def.name.clone(), Arc::clone(&def));
            categories.entry(def.category).or_default().push(def);
        }
        for bucket in categories.values_mut() {
            bucket.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Catalog { index, categories }
    }
}

/// Immutable function registry.
#[derive(Debug)]
pub struct Catalog {
    index: HashMap<String, Arc<FunctionDef>>,
    categories: BTreeMap<Category, Vec<Arc<FunctionDef>>>,
}

impl Catalog {
    /// Exact-match lookup by name or short name.
    pub fn lookup(&self, name: &str) -> Result<&Arc<FunctionDef>> {
        self.index
            .get(name)
            .ok_or_else(|| Error::MethodNotFound(name.to_string()))
    }

    /// Every category, each listing its definitions sorted by name.
    pub fn categories(&self) -> &BTreeMap<Category, Vec<Arc<FunctionDef>>> {
        &self.categories
    }

    pub fn category(&self, category: Category) -> &[Arc<FunctionDef>] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[allow(clippy::panic)]
static BUILTIN: LazyLock<Catalog> = LazyLock::new(|| match builtin_catalog() {
    Ok(catalog) => catalog,
    // The builtin table is static; a failure here is a programming error.
    Err(e) => panic!("invalid builtin function catalog: {e}"),
});

/// The process-wide catalog of built-in functions.
pub fn builtin() -> &'static Catalog {
    &BUILTIN
}

fn aggregation_param(name: &str) -> ParamSpec {
    ParamSpec::new(name, ParamType::String).options(Aggregator::NAMES)
}

const PERCENTS: [f64; 7] = [25.0, 50.0, 75.0, 90.0, 95.0, 99.0, 99.9];

pub fn builtin_catalog() -> Result<Catalog> {
    use Category::*;
    use ParamType::{Float, Int};

    let interval = || ParamSpec::new("interval", ParamType::String);
    let mut builder = CatalogBuilder::new();

    // Transform
    builder
        .register(
            FunctionDef::new("groupBy", Transform)
                .param(interval())
                .param(aggregation_param("function"))
                .defaults(["1m", "avg"]),
        )?
        .register(
            FunctionDef::new("scale", Transform)
                .param(ParamSpec::new("factor", Float).options([100.0, 0.01, 10.0, -1.0]))
                .defaults([100.0]),
        )?
        .register(
            FunctionDef::new("offset", Transform)
                .param(ParamSpec::new("delta", Float).options([-100.0, 100.0]))
                .defaults([100.0]),
        )?
        .register(FunctionDef::new("delta", Transform))?
        .register(FunctionDef::new("rate", Transform))?
        .register(
            FunctionDef::new("movingAverage", Transform)
                .param(ParamSpec::new("factor", Int).options([6, 10, 60, 100, 600]))
                .defaults([10]),
        )?
        .register(
            FunctionDef::new("exponentialMovingAverage", Transform)
                .param(ParamSpec::new("smoothing", Float).options([6, 10, 60, 100, 600]))
                .defaults([0.2]),
        )?
        .register(
            FunctionDef::new("percentile", Transform)
                .param(interval())
                .param(ParamSpec::new("percent", Float).options(PERCENTS))
                .defaults([ParamValue::from("1m"), ParamValue::from(95)]),
        )?
        .register(
            FunctionDef::new("removeAboveValue", Transform)
                .param(ParamSpec::new("number", Float))
                .defaults([0]),
        )?
        .register(
            FunctionDef::new("removeBelowValue", Transform)
                .param(ParamSpec::new("number", Float))
                .defaults([0]),
        )?
        .register(
            FunctionDef::new("transformNull", Transform)
                .param(ParamSpec::new("number", Float))
                .defaults([0]),
        )?;

    // Aggregate
    builder.register(FunctionDef::new("sumSeries", Aggregate))?;
    for name in ["median", "average", "min", "max", "sum", "count"] {
        builder.register(
            FunctionDef::new(name, Aggregate)
                .param(interval())
                .defaults(["1m"]),
        )?;
    }
    builder
        .register(
            FunctionDef::new("percentileAgg", Aggregate)
                .param(interval())
                .param(ParamSpec::new("percent", Float).options(PERCENTS))
                .defaults([ParamValue::from("1m"), ParamValue::from(95)]),
        )?
        .register(
            FunctionDef::new("aggregateBy", Aggregate)
                .param(interval())
                .param(aggregation_param("function"))
                .defaults(["1m", "avg"]),
        )?;

    // Filter
    for name in ["top", "bottom"] {
        builder.register(
            FunctionDef::new(name, Filter)
                .param(ParamSpec::new("number", Int))
                .param(aggregation_param("value"))
                .defaults([ParamValue::from(5), ParamValue::from("avg")]),
        )?;
    }
    builder.register(
        FunctionDef::new("sortSeries", Filter)
            .param(ParamSpec::new("direction", ParamType::String).options(["asc", "desc"]))
            .defaults(["asc"]),
    )?;

    // Trends
    builder.register(
        FunctionDef::new("trendValue", Trends)
            .param(ParamSpec::new("type", ParamType::String).options(["avg", "min", "max", "sum", "count"]))
            .defaults(["avg"]),
    )?;

    // Time
    builder.register(
        FunctionDef::new("timeShift", Time)
            .param(
                ParamSpec::new("interval", ParamType::String)
                    .options(["24h", "7d", "1M", "+24h", "-24h"]),
            )
            .defaults(["24h"]),
    )?;

    // Alias
    builder
        .register(
            FunctionDef::new("setAlias", Alias).param(ParamSpec::new("alias", ParamType::String)),
        )?
        .register(
            FunctionDef::new("setAliasByRegex", Alias)
                .param(ParamSpec::new("aliasByRegex", ParamType::String)),
        )?
        .register(
            FunctionDef::new("replaceAlias", Alias)
                .param(ParamSpec::new("regexp", ParamType::String))
                .param(ParamSpec::new("newAlias", ParamType::String))
                .defaults(["/(.*)/", "$1"]),
        )?;

    // Special
    builder.register(
        FunctionDef::new("consolidateBy", Special)
            .param(ParamSpec::new("type", ParamType::String).options(["avg", "min", "max", "sum", "count"]))
            .defaults(["avg"]),
    )?;

    Ok(builder.build())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn names(defs: &[Arc<FunctionDef>]) -> Vec<&str> {
        defs.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_lookup_exact_only() {
        let catalog = builtin();
        assert_eq!(catalog.lookup("average").unwrap().category, Category::Aggregate);
        assert_eq!(
            catalog.lookup("averageXYZ").unwrap_err(),
            Error::MethodNotFound("averageXYZ".to_string())
        );
        assert!(catalog.lookup("Average").is_err());
    }

    #[test]
    fn test_categories_sorted_by_name() {
        let catalog = builtin();
        let aggregate = names(catalog.category(Category::Aggregate));
        assert!(aggregate.contains(&"average"));
        let mut sorted = aggregate.clone();
        sorted.sort();
        assert_eq!(aggregate, sorted);

        assert_eq!(catalog.categories().len(), Category::ALL.len());
        assert_eq!(names(catalog.category(Category::Time)), vec!["timeShift"]);
        assert_eq!(
            names(catalog.category(Category::Filter)),
            vec!["bottom", "sortSeries", "top"]
        );
    }

    #[test]
    fn test_builtin_defaults() {
        let catalog = builtin();
        let group_by = catalog.lookup("groupBy").unwrap();
        assert_eq!(group_by.default_params, vec![ParamValue::from("1m"), ParamValue::from("avg")]);
        assert!(catalog.lookup("delta").unwrap().params.is_empty());
        assert!(catalog.lookup("setAlias").unwrap().default_params.is_empty());
        assert_eq!(catalog.len(), 29);
    }

    #[test]
    fn test_short_name_alias() {
        let mut builder = CatalogBuilder::new();
        builder
            .register(FunctionDef::new("movingAverage", Category::Transform).short_name("sma"))
            .unwrap();
        let catalog = builder.build();
        assert_eq!(catalog.lookup("sma").unwrap().name, "movingAverage");
        assert_eq!(catalog.lookup("movingAverage").unwrap().name, "movingAverage");
        assert_eq!(catalog.category(Category::Transform).len(), 1);
    }

    #[test]
    fn test_register_rejects_malformed() {
        let mut builder = CatalogBuilder::new();
        let too_many_defaults = FunctionDef::new("scale", Category::Transform).defaults([1, 2]);
        assert!(matches!(
            builder.register(too_many_defaults),
            Err(Error::InvalidDefinition { .. })
        ));

        let unnamed = FunctionDef::new("scale", Category::Transform)
            .param(ParamSpec::new("", ParamType::Float));
        assert!(builder.register(unnamed).is_err());

        let required_after_optional = FunctionDef::new("f", Category::Transform)
            .param(ParamSpec::new("a", ParamType::Int).optional())
            .param(ParamSpec::new("b", ParamType::Int));
        assert!(builder.register(required_after_optional).is_err());
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut builder = CatalogBuilder::new();
        builder.register(FunctionDef::new("rate", Category::Transform)).unwrap();
        assert_eq!(
            builder
                .register(FunctionDef::new("rate", Category::Transform))
                .unwrap_err(),
            Error::DuplicateDefinition("rate".to_string())
        );
        assert!(
            builder
                .register(FunctionDef::new("delta", Category::Transform).short_name("rate"))
                .is_err()
        );
    }

    #[test]
    fn test_param_value_numeric() {
        assert!(ParamValue::from(5).is_numeric());
        assert!(ParamValue::from(" 2.5 ").is_numeric());
        assert!(!ParamValue::from("1m").is_numeric());
        assert!(!ParamValue::from(true).is_numeric());
        assert_eq!(ParamValue::from(100.0).to_string(), "100");
        assert_eq!(ParamValue::from(0.2).to_string(), "0.2");
    }
}
