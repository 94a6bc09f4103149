// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory backend for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Number;

use crate::backend::{PrometheusApi, Range};
use crate::error::BackendError;
use crate::model::{Metric, QueryResult, SamplePair, Series};

/// A backend call as seen by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Query {
        expr: String,
        time: DateTime<Utc>,
    },
    QueryRange {
        expr: String,
        range: Range,
    },
    LabelNames {
        matchers: Vec<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    LabelValues {
        label: String,
        matchers: Vec<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Records every call and answers with canned data.
#[derive(Clone, Default)]
pub struct MockBackend {
    calls: Arc<Mutex<Vec<Call>>>,
    result: Option<QueryResult>,
    labels: Vec<String>,
    error: Option<String>,
    hang: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer query and query_range with `result`.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Answer label_names and label_values with `labels`.
    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Fail every call with a `bad_data` API error.
    pub fn failing(mut self, message: &str) -> Self {
        self.error = Some(message.to_string());
        self
    }

    /// Never complete any call.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn respond<T>(&self, call: Call, ok: T) -> Result<T, BackendError> {
        self.calls.lock().unwrap().push(call);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.error {
            Some(message) => Err(BackendError::Api {
                error_type: "bad_data".to_string(),
                message: message.clone(),
            }),
            None => Ok(ok),
        }
    }

    fn query_result(&self) -> QueryResult {
        self.result
            .clone()
            .unwrap_or_else(|| QueryResult::Matrix(Vec::new()))
    }
}

#[async_trait]
impl PrometheusApi for MockBackend {
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryResult, BackendError> {
        let call = Call::Query {
            expr: expr.to_string(),
            time,
        };
        self.respond(call, self.query_result()).await
    }

    async fn query_range(&self, expr: &str, range: &Range) -> Result<QueryResult, BackendError> {
        let call = Call::QueryRange {
            expr: expr.to_string(),
            range: *range,
        };
        self.respond(call, self.query_result()).await
    }

    async fn label_names(
        &self,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError> {
        let call = Call::LabelNames {
            matchers: matchers.to_vec(),
            start,
            end,
        };
        self.respond(call, self.labels.clone()).await
    }

    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError> {
        let call = Call::LabelValues {
            label: label.to_string(),
            matchers: matchers.to_vec(),
            start,
            end,
        };
        self.respond(call, self.labels.clone()).await
    }
}

/// `n` series of `up`, one per instance, with four samples each.
pub fn matrix(n: usize) -> Vec<Series> {
    (0..n)
        .map(|i| Series {
            metric: Metric(
                [
                    ("__name__".to_string(), "up".to_string()),
                    ("instance".to_string(), format!("10.0.0.{i}:9090")),
                    ("job".to_string(), "node".to_string()),
                ]
                .into_iter()
                .collect(),
            ),
            values: Some(
                (0..4u64)
                    .map(|k| {
                        SamplePair(
                            Number::from(1_704_067_200 + k * 900),
                            (i as u64 * 10 + k).to_string(),
                        )
                    })
                    .collect(),
            ),
            histograms: None,
        })
        .collect()
}
