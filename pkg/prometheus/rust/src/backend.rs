// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Port for the metrics backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BackendError;
use crate::model::QueryResult;

/// Evaluation window of a range query. `start <= end` is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

/// Read-only access to a Prometheus-compatible query API.
///
/// Implementations are shared across concurrent tool calls. Dropping a
/// returned future must abort the underlying request.
#[async_trait]
pub trait PrometheusApi: Send + Sync {
    /// Evaluate an instant query at `time`.
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryResult, BackendError>;

    /// Evaluate a range query.
    async fn query_range(&self, expr: &str, range: &Range) -> Result<QueryResult, BackendError>;

    /// Label names of the series matching any of `matchers` in the window.
    async fn label_names(
        &self,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError>;

    /// Values of `label` across the series matching any of `matchers`.
    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError>;
}
