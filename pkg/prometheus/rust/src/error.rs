// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use rmcp::ErrorData;
use thiserror::Error;

/// Failure of a single tool invocation.
///
/// Every variant is terminal for the call that produced it. The first group
/// is caused by caller input and is reported as invalid params; the rest are
/// reported as internal errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("invalid time format: {0:?} (expected RFC 3339 or Unix epoch milliseconds)")]
    InvalidTimeFormat(String),

    #[error("invalid duration {input:?}: {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("query failed: {0}")]
    QueryBackend(String),

    #[error("query result is not a matrix (got {0})")]
    UnsupportedResultType(String),

    #[error("no data returned for query")]
    NoData,

    #[error("failed to render chart: {0}")]
    Render(String),

    #[error("failed to serialize result: {0}")]
    Serialization(String),

    #[error("request cancelled")]
    Cancelled,
}

impl ToolError {
    pub(crate) fn missing(name: &str) -> Self {
        ToolError::InvalidArgument {
            name: name.to_string(),
            reason: "missing required argument".to_string(),
        }
    }

    pub(crate) fn wrong_type(name: &str, found: &str) -> Self {
        ToolError::InvalidArgument {
            name: name.to_string(),
            reason: format!("expected a string, found {found}"),
        }
    }

    /// True when the caller can fix the failure by changing the arguments.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ToolError::InvalidArgument { .. }
                | ToolError::InvalidTimeFormat(_)
                | ToolError::InvalidDuration { .. }
                | ToolError::UnknownTool(_)
        )
    }
}

impl From<BackendError> for ToolError {
    fn from(err: BackendError) -> Self {
        ToolError::QueryBackend(err.to_string())
    }
}

impl From<ToolError> for ErrorData {
    fn from(err: ToolError) -> Self {
        if err.is_caller_error() {
            ErrorData::invalid_params(err.to_string(), None)
        } else {
            ErrorData::internal_error(err.to_string(), None)
        }
    }
}

/// Errors surfaced by a Prometheus API implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with `status: "error"`.
    #[error("{error_type}: {message}")]
    Api { error_type: String, message: String },

    #[error("unexpected response from {endpoint} (HTTP {status}): {reason}")]
    InvalidResponse {
        endpoint: String,
        status: u16,
        reason: String,
    },

    #[error("cannot build API URL from {0}")]
    InvalidUrl(String),
}
