// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Query result types of the Prometheus HTTP API.
//!
//! Results deserialize from the `data` object of a query response
//! (`{"resultType": ..., "result": ...}`) and serialize back to the bare
//! `result` value, so a matrix becomes a top-level array of
//! `{"metric": ..., "values": ...}` objects. Timestamps keep their JSON
//! number representation and sample values stay strings, which keeps the
//! output field-for-field identical to what the backend returned.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};

/// Maximum number of series returned or charted for a range query.
pub const MAX_SERIES: usize = 5;

pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label set identifying a series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metric(pub BTreeMap<String, String>);

impl Metric {
    pub fn name(&self) -> Option<&str> {
        self.0.get(METRIC_NAME_LABEL).map(String::as_str)
    }
}

impl fmt::Display for Metric {
    /// `name{a="x", b="y"}` with labels sorted by name. A bare name has no
    /// braces and an empty label set renders as `{}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        let mut labels = self
            .0
            .iter()
            .filter(|(label, _)| label.as_str() != METRIC_NAME_LABEL)
            .peekable();

        if labels.peek().is_none() {
            return f.write_str(name.unwrap_or("{}"));
        }

        f.write_str(name.unwrap_or(""))?;
        f.write_str("{")?;
        for (i, (label, value)) in labels.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{label}={value:?}")?;
        }
        f.write_str("}")
    }
}

/// A `[<unix seconds>, "<value>"]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePair(pub Number, pub String);

impl SamplePair {
    pub fn timestamp_secs(&self) -> Option<f64> {
        self.0.as_f64()
    }

    /// Numeric value, `None` for NaN, infinities and unparseable strings.
    pub fn finite_value(&self) -> Option<f64> {
        self.1.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// One element of an instant vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantSample {
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<SamplePair>,
    /// Native histogram sample, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Value>,
}

/// One series of a range result.
///
/// Histogram-only series come without `values`, float-only series without
/// `histograms`. Both stay absent when serialized again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<SamplePair>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histograms: Option<Vec<Value>>,
}

impl Series {
    /// Float samples, empty for histogram-only series.
    pub fn samples(&self) -> &[SamplePair] {
        self.values.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryResult {
    Scalar(SamplePair),
    String(SamplePair),
    Vector(Vec<InstantSample>),
    Matrix(Vec<Series>),
}

impl QueryResult {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryResult::Scalar(_) => "scalar",
            QueryResult::String(_) => "string",
            QueryResult::Vector(_) => "vector",
            QueryResult::Matrix(_) => "matrix",
        }
    }

    /// Applies the series cap to matrix results and returns how many series
    /// were dropped. Other result types are left alone.
    pub fn cap_series(&mut self) -> usize {
        match self {
            QueryResult::Matrix(series) => cap_series(series),
            _ => 0,
        }
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryResult::Scalar(pair) | QueryResult::String(pair) => pair.serialize(serializer),
            QueryResult::Vector(samples) => samples.serialize(serializer),
            QueryResult::Matrix(series) => series.serialize(serializer),
        }
    }
}

/// Keeps the first [`MAX_SERIES`] series in backend order.
pub fn cap_series(series: &mut Vec<Series>) -> usize {
    let dropped = series.len().saturating_sub(MAX_SERIES);
    series.truncate(MAX_SERIES);
    dropped
}
