// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use rmcp::model::JsonObject;
use serde_json::Value;

use crate::error::ToolError;

/// Typed view over the argument object of a tool call.
///
/// Extraction never panics: absent or mistyped values become
/// [`ToolError::InvalidArgument`] naming the argument.
#[derive(Debug, Default, Clone)]
pub struct ToolArgs {
    inner: JsonObject,
}

impl ToolArgs {
    pub fn new(arguments: Option<JsonObject>) -> Self {
        Self {
            inner: arguments.unwrap_or_default(),
        }
    }

    /// A string argument that must be present.
    pub fn required_str(&self, name: &str) -> Result<&str, ToolError> {
        match self.inner.get(name) {
            None | Some(Value::Null) => Err(ToolError::missing(name)),
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(ToolError::wrong_type(name, kind(other))),
        }
    }

    /// A string argument that may be absent. `null` counts as absent.
    pub fn optional_str(&self, name: &str) -> Result<Option<&str>, ToolError> {
        match self.inner.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ToolError::wrong_type(name, kind(other))),
        }
    }
}

impl From<JsonObject> for ToolArgs {
    fn from(inner: JsonObject) -> Self {
        Self { inner }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
