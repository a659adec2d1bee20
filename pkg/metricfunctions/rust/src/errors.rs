// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

use crate::catalog::Category;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid function definition {function}: {reason}")]
    InvalidDefinition { function: String, reason: String },

    #[error("function {0} is already registered")]
    DuplicateDefinition(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid parameter #{index} of {function}: {reason}")]
    InvalidParameter {
        function: String,
        index: usize,
        reason: String,
    },

    #[error("invalid interval: {0:?}")]
    InvalidInterval(String),

    #[error("timestamp {timestamp} shifted by {shift_ms}ms is out of range")]
    TimestampOverflow { timestamp: i64, shift_ms: i64 },

    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("{function} cannot be applied in the {phase} phase")]
    PhaseMismatch { function: String, phase: Category },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_param(function: &str, index: usize, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            function: function.to_string(),
            index,
            reason: reason.into(),
        }
    }
}
