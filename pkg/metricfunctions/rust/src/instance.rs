// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! A catalog definition paired with concrete parameter values, as edited in a
//! query and rendered back to text.

use std::sync::Arc;

use crate::catalog::{Catalog, Category, FunctionDef, ParamType, ParamValue};
use crate::errors::{Error, Result};
use crate::operator::{self, BoundFunction};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInstance {
    def: Arc<FunctionDef>,
    params: Vec<ParamValue>,
}

impl FunctionInstance {
    /// Instance with a copy of the definition's default parameters.
    pub fn new(def: Arc<FunctionDef>) -> Self {
        let params = def.default_params.clone();
        Self { def, params }
    }

    /// Instance with explicit parameters, taken verbatim.
    pub fn with_params(def: Arc<FunctionDef>, params: Vec<ParamValue>) -> Self {
        Self { def, params }
    }

    pub fn from_catalog(
        catalog: &Catalog,
        name: &str,
        params: Option<Vec<ParamValue>>,
    ) -> Result<Self> {
        let def = Arc::clone(catalog.lookup(name)?);
        Ok(match params {
            Some(params) => Self::with_params(def, params),
            None => Self::new(def),
        })
    }

    /// Parses the unprefixed rendering `name(p1, 'p2')` back into an
    /// instance. Quoted arguments become text, bare ones numbers or booleans
    /// where they parse as such.
    pub fn parse(catalog: &Catalog, text: &str) -> Result<Self> {
        let text = text.trim();
        let malformed = || Error::InvalidDefinition {
            function: text.to_string(),
            reason: "expected name(arg, ...)".to_string(),
        };
        let (name, rest) = text.split_once('(').ok_or_else(malformed)?;
        let args = rest.strip_suffix(')').ok_or_else(malformed)?;
        let params = split_args(args)
            .into_iter()
            .map(|arg| parse_arg(&arg))
            .collect();
        Self::from_catalog(catalog, name.trim(), Some(params))
    }

    pub fn def(&self) -> &FunctionDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn category(&self) -> Category {
        self.def.category
    }

    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    /// `name(p1, p2)` with every parameter unquoted; used as the label of
    /// aggregated series.
    pub fn text(&self) -> String {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("{}({})", self.def.name, params.join(", "))
    }

    /// Renders the call as query text, optionally wrapping `metric_exp` as
    /// the first argument. Numbers, booleans and series references stay
    /// bare; everything else is single-quoted.
    pub fn render(&self, metric_exp: Option<&str>) -> String {
        let mut args: Vec<String> = self
            .params
            .iter()
            .enumerate()
            .map(|(i, value)| {
                if self.renders_bare(i, value) {
                    value.to_string()
                } else {
                    format!("'{value}'")
                }
            })
            .collect();
        if let Some(metric_exp) = metric_exp {
            args.insert(0, metric_exp.to_string());
        }
        format!("{}({})", self.def.name, args.join(", "))
    }

    fn renders_bare(&self, index: usize, value: &ParamValue) -> bool {
        match self.def.params.get(index).map(|spec| spec.kind) {
            Some(ParamType::Int | ParamType::Float | ParamType::ValueOrSeries | ParamType::Boolean) => true,
            Some(ParamType::IntOrInterval) => value.is_numeric(),
            Some(ParamType::String) | None => false,
        }
    }

    /// Applies an edit of the parameter at `index`.
    ///
    /// A comma-containing value is split across consecutive slots when the
    /// next slot is optional. Clearing an optional slot removes it. Writing
    /// past the end pads the gap with defaults.
    pub fn update_param(&mut self, raw: &str, index: usize) -> Result<()> {
        let next_optional = self
            .def
            .params
            .get(index + 1)
            .is_some_and(|spec| spec.optional);
        if raw.contains(',') && next_optional {
            for (offset, part) in raw.split(',').enumerate() {
                self.set_param(part.trim(), index + offset)?;
            }
            return Ok(());
        }
        self.set_param(raw, index)
    }

    fn set_param(&mut self, raw: &str, index: usize) -> Result<()> {
        let Some(spec) = self.def.params.get(index) else {
            return Err(Error::invalid_param(
                &self.def.name,
                index,
                format!("{} takes {} parameters", self.def.name, self.def.params.len()),
            ));
        };

        if raw.is_empty() && spec.optional {
            if index < self.params.len() {
                self.params.remove(index);
            }
            return Ok(());
        }

        let value = ParamValue::Text(raw.to_string());
        if let Some(slot) = self.params.get_mut(index) {
            *slot = value;
            return Ok(());
        }
        while self.params.len() < index {
            let filler = self
                .def
                .default_params
                .get(self.params.len())
                .cloned()
                .unwrap_or_else(|| ParamValue::Text(String::new()));
            self.params.push(filler);
        }
        self.params.push(value);
        Ok(())
    }

    /// Resolves the instance into an executable function with its
    /// parameters coerced and captured.
    pub fn bind(&self) -> Result<BoundFunction> {
        operator::bind(self)
    }
}

fn split_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in args.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current);
    }
    parts
}

fn parse_arg(arg: &str) -> ParamValue {
    let arg = arg.trim();
    if let Some(inner) = arg
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return ParamValue::Text(inner.to_string());
    }
    match arg {
        "true" => ParamValue::Bool(true),
        "false" => ParamValue::Bool(false),
        _ => arg
            .parse::<f64>()
            .map(ParamValue::Number)
            .unwrap_or_else(|_| ParamValue::Text(arg.to_string())),
    }
}
