// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! HTTP client for the Prometheus `/api/v1` endpoints.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::backend::{PrometheusApi, Range};
use crate::error::BackendError;
use crate::model::QueryResult;

/// Longest slice of a non-JSON error body kept in error messages.
const MAX_BODY_SNIPPET: usize = 256;

/// Response envelope shared by every API endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

/// [`PrometheusApi`] over HTTP.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PrometheusClient {
    base_url: Url,
    client: reqwest::Client,
}

impl PrometheusClient {
    /// Create a client for the API rooted at `base_url`, e.g.
    /// `http://localhost:9090` or `https://host/prometheus/`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid Prometheus URL {base_url:?}"))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            bail!("Prometheus URL must be an http(s) URL, got {base_url}");
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("prometheus-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(&str, String)],
    ) -> Result<T, BackendError> {
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "querying prometheus");

        let transport = |source| BackendError::Transport {
            endpoint: endpoint.clone(),
            source,
        };
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        // Error responses (4xx/5xx) still carry the JSON envelope when they
        // come from Prometheus itself; anything else is a proxy or a bug.
        let envelope: ApiResponse<T> = serde_json::from_slice(&body).map_err(|err| {
            let reason = if status.is_success() {
                err.to_string()
            } else {
                snippet(&body)
            };
            BackendError::InvalidResponse {
                endpoint: endpoint.clone(),
                status: status.as_u16(),
                reason,
            }
        })?;

        for warning in &envelope.warnings {
            warn!(endpoint = %endpoint, warning = %warning, "prometheus returned a warning");
        }

        if envelope.status != "success" {
            return Err(BackendError::Api {
                error_type: envelope.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: envelope
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            });
        }
        envelope.data.ok_or_else(|| BackendError::InvalidResponse {
            endpoint,
            status: status.as_u16(),
            reason: "missing data".to_string(),
        })
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_step(step: Duration) -> String {
    step.as_secs_f64().to_string()
}

fn window_params(
    matchers: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&str, String)> = matchers
        .iter()
        .map(|matcher| ("match[]", matcher.clone()))
        .collect();
    params.push(("start", format_time(start)));
    params.push(("end", format_time(end)));
    params
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((cut, _)) => format!("{}...", text.get(..cut).unwrap_or(text)),
        None => text.to_string(),
    }
}

#[async_trait]
impl PrometheusApi for PrometheusClient {
    async fn query(&self, expr: &str, time: DateTime<Utc>) -> Result<QueryResult, BackendError> {
        let url = self.endpoint(&["query"])?;
        self.get(
            url,
            &[("query", expr.to_string()), ("time", format_time(time))],
        )
        .await
    }

    async fn query_range(&self, expr: &str, range: &Range) -> Result<QueryResult, BackendError> {
        let url = self.endpoint(&["query_range"])?;
        self.get(
            url,
            &[
                ("query", expr.to_string()),
                ("start", format_time(range.start)),
                ("end", format_time(range.end)),
                ("step", format_step(range.step)),
            ],
        )
        .await
    }

    async fn label_names(
        &self,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&["labels"])?;
        self.get(url, &window_params(matchers, start, end)).await
    }

    async fn label_values(
        &self,
        label: &str,
        matchers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, BackendError> {
        let url = self.endpoint(&["label", label, "values"])?;
        self.get(url, &window_params(matchers, start, end)).await
    }
}
