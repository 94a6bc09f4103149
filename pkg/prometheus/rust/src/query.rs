// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Tool operations against the metrics backend.
//!
//! Every operation resolves its inputs first and only then performs a single
//! backend call, raced against the caller's cancellation token. Nothing is
//! retried. "Now" is read once per operation from the dispatcher clock.

use std::future::Future;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backend::{PrometheusApi, Range};
use crate::chart;
use crate::error::{BackendError, ToolError};
use crate::model::{METRIC_NAME_LABEL, QueryResult, Series, cap_series};
use crate::time::{parse_step, resolve};

/// Lookback window of the label and metric search tools.
pub const LABEL_LOOKBACK: TimeDelta = TimeDelta::hours(1);

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Executes tool operations against a [`PrometheusApi`].
pub struct QueryDispatcher<B: ?Sized> {
    backend: Arc<B>,
    clock: Clock,
}

impl<B: ?Sized> Clone for QueryDispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<B: PrometheusApi + ?Sized> QueryDispatcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_clock(backend, Arc::new(Utc::now))
    }

    pub fn with_clock(backend: Arc<B>, clock: Clock) -> Self {
        Self { backend, clock }
    }

    /// Instant query at `time`, or at the current time when absent.
    pub async fn instant_query(
        &self,
        query: &str,
        time: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let now = (self.clock)();
        let at = match time {
            Some(raw) => resolve(raw)?,
            None => now,
        };

        let result = cancellable(ct, self.backend.query(query, at)).await?;
        debug!(query = %query, result_type = result.kind(), "instant query done");
        to_json(&result)
    }

    /// Range query; matrix results are capped to the first series.
    pub async fn range_query(
        &self,
        query: &str,
        start: &str,
        end: &str,
        step: &str,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let range = parse_range(start, end, step)?;

        let mut result = cancellable(ct, self.backend.query_range(query, &range)).await?;
        let dropped = result.cap_series();
        if dropped > 0 {
            debug!(query = %query, dropped, "capped range query result");
        }
        to_json(&result)
    }

    /// Range query rendered as a base64 PNG. Only non-empty matrix results
    /// can be charted.
    pub async fn render_chart(
        &self,
        query: &str,
        start: &str,
        end: &str,
        step: &str,
        title: Option<&str>,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let range = parse_range(start, end, step)?;

        let result = cancellable(ct, self.backend.query_range(query, &range)).await?;
        let (title, series) = chart_input(query, title, result)?;
        debug!(query = %query, series = series.len(), "rendering chart");

        let window = (range.start, range.end);
        let png = tokio::task::spawn_blocking(move || chart::render_png(&title, &series, window))
            .await
            .map_err(|err| ToolError::Render(err.to_string()))??;
        Ok(BASE64.encode(png))
    }

    /// Metric names matching the regular expression `pattern`.
    pub async fn search_metrics(
        &self,
        pattern: &str,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let (start, end) = self.label_window();
        let matchers = [name_matcher("=~", pattern)];

        let names = cancellable(
            ct,
            self.backend
                .label_values(METRIC_NAME_LABEL, &matchers, start, end),
        )
        .await?;
        to_json(&names)
    }

    /// Label names of metric `name`, without `__name__`.
    pub async fn metric_labels(
        &self,
        name: &str,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let (start, end) = self.label_window();
        let matchers = [name_matcher("=", name)];

        let mut labels =
            cancellable(ct, self.backend.label_names(&matchers, start, end)).await?;
        labels.retain(|label| label != METRIC_NAME_LABEL);
        to_json(&labels)
    }

    /// Values of `label` across the series of metric `name`.
    pub async fn metric_label_values(
        &self,
        name: &str,
        label: &str,
        ct: &CancellationToken,
    ) -> Result<String, ToolError> {
        let (start, end) = self.label_window();
        let matchers = [name_matcher("=", name)];

        let values =
            cancellable(ct, self.backend.label_values(label, &matchers, start, end)).await?;
        to_json(&values)
    }

    fn label_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = (self.clock)();
        (now - LABEL_LOOKBACK, now)
    }
}

/// Title and series of a chart: the first series of a non-empty matrix,
/// titled after the query unless a title is given.
fn chart_input(
    query: &str,
    title: Option<&str>,
    result: QueryResult,
) -> Result<(String, Vec<Series>), ToolError> {
    let mut series = match result {
        QueryResult::Matrix(series) => series,
        other => return Err(ToolError::UnsupportedResultType(other.kind().to_string())),
    };
    if series.is_empty() {
        return Err(ToolError::NoData);
    }
    let dropped = cap_series(&mut series);
    if dropped > 0 {
        debug!(query = %query, dropped, "capped chart series");
    }
    Ok((title.unwrap_or(query).to_string(), series))
}

fn parse_range(start: &str, end: &str, step: &str) -> Result<Range, ToolError> {
    Ok(Range {
        start: resolve(start)?,
        end: resolve(end)?,
        step: parse_step(step)?,
    })
}

/// Runs a backend call unless the caller cancels first. Losing the race
/// drops the request future, which aborts the HTTP request.
async fn cancellable<T>(
    ct: &CancellationToken,
    call: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, ToolError> {
    tokio::select! {
        biased;
        () = ct.cancelled() => Err(ToolError::Cancelled),
        result = call => result.map_err(ToolError::from),
    }
}

/// `{__name__<op>"<value>"}` with the value quoted as a PromQL string.
fn name_matcher(op: &str, value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    format!("{{{METRIC_NAME_LABEL}{op}\"{quoted}\"}}")
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ToolError> {
    serde_json::to_string(value).map_err(|err| ToolError::Serialization(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InstantSample, Metric, SamplePair};
    use crate::testing::{Call, MockBackend, matrix};
    use chrono::TimeZone;
    use serde_json::{Number, Value, json};
    use std::time::Duration;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn dispatcher(backend: &MockBackend) -> QueryDispatcher<MockBackend> {
        QueryDispatcher::with_clock(Arc::new(backend.clone()), Arc::new(fixed_now))
    }

    fn ct() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_instant_query_defaults_to_wall_clock_now() {
        let backend = MockBackend::new().with_result(QueryResult::Vector(vec![]));
        let dispatcher = QueryDispatcher::new(Arc::new(backend.clone()));

        let before = Utc::now();
        let text = dispatcher.instant_query("up", None, &ct()).await.unwrap();
        assert_eq!(text, "[]");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let Call::Query { expr, time } = &calls[0] else {
            panic!("expected an instant query, got {calls:?}");
        };
        assert_eq!(expr, "up");
        assert!((*time - before).abs() < TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn test_instant_query_resolves_both_time_encodings() {
        let backend = MockBackend::new().with_result(QueryResult::Vector(vec![]));
        let dispatcher = dispatcher(&backend);

        dispatcher
            .instant_query("up", Some("2024-01-01T00:00:00Z"), &ct())
            .await
            .unwrap();
        dispatcher
            .instant_query("up", Some("1704067200000"), &ct())
            .await
            .unwrap();

        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for call in backend.calls() {
            assert!(matches!(call, Call::Query { time, .. } if time == expected));
        }
    }

    #[tokio::test]
    async fn test_instant_query_serializes_vector() {
        let result = QueryResult::Vector(vec![InstantSample {
            metric: Metric([("job".to_string(), "api".to_string())].into_iter().collect()),
            value: Some(SamplePair(Number::from(1_704_067_200), "1".to_string())),
            histogram: None,
        }]);
        let backend = MockBackend::new().with_result(result);

        let text = dispatcher(&backend)
            .instant_query("up", None, &ct())
            .await
            .unwrap();
        assert_eq!(text, r#"[{"metric":{"job":"api"},"value":[1704067200,"1"]}]"#);
    }

    #[tokio::test]
    async fn test_instant_query_bad_time_skips_backend() {
        let backend = MockBackend::new();
        let err = dispatcher(&backend)
            .instant_query("up", Some("yesterday"), &ct())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidTimeFormat(ref raw) if raw == "yesterday"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_range_query_caps_to_five_series_in_order() {
        let backend = MockBackend::new().with_result(QueryResult::Matrix(matrix(8)));
        let text = dispatcher(&backend)
            .range_query(
                "up",
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
                "15m",
                &ct(),
            )
            .await
            .unwrap();

        let parsed: Value = serde_json::from_str(&text).unwrap();
        let items = parsed.as_array().unwrap();
        assert_eq!(items.len(), 5);
        let expected = serde_json::to_value(&matrix(8)[..5]).unwrap();
        assert_eq!(parsed, expected);
        for item in items {
            let keys: Vec<&String> = item.as_object().unwrap().keys().collect();
            assert_eq!(keys, ["metric", "values"]);
        }

        assert_eq!(
            backend.calls(),
            [Call::QueryRange {
                expr: "up".to_string(),
                range: Range {
                    start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                    end: Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
                    step: Duration::from_secs(900),
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_range_query_small_matrix_is_lossless() {
        let backend_json = json!([
            {
                "metric": {"__name__": "up", "job": "a"},
                "values": [[1704067200, "1"], [1704067215.5, "NaN"]]
            },
            {"metric": {}, "values": []}
        ]);
        let series = serde_json::from_value(backend_json.clone()).unwrap();
        let backend = MockBackend::new().with_result(QueryResult::Matrix(series));

        let text = dispatcher(&backend)
            .range_query("up", "0", "60000", "15s", &ct())
            .await
            .unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), backend_json);
    }

    #[tokio::test]
    async fn test_range_query_passes_other_shapes_through() {
        let backend = MockBackend::new().with_result(QueryResult::Scalar(SamplePair(
            Number::from(1_704_067_200),
            "42".to_string(),
        )));
        let text = dispatcher(&backend)
            .range_query("scalar(up)", "0", "60000", "15s", &ct())
            .await
            .unwrap();
        assert_eq!(text, r#"[1704067200,"42"]"#);
    }

    #[tokio::test]
    async fn test_range_query_bad_step_skips_backend() {
        let backend = MockBackend::new();
        let err = dispatcher(&backend)
            .range_query(
                "up",
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
                "abc",
                &ct(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidDuration { ref input, .. } if input == "abc"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_range_query_start_after_end_is_left_to_backend() {
        let backend = MockBackend::new().failing("end timestamp must not be before start time");
        let err = dispatcher(&backend)
            .range_query(
                "up",
                "2024-01-01T01:00:00Z",
                "2024-01-01T00:00:00Z",
                "0",
                &ct(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::QueryBackend(ref msg) if msg.contains("before start")));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_chart_rejects_non_matrix() {
        let backend = MockBackend::new().with_result(QueryResult::Vector(vec![]));
        let err = dispatcher(&backend)
            .render_chart("up", "0", "60000", "15s", None, &ct())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnsupportedResultType(ref kind) if kind == "vector"));
    }

    #[tokio::test]
    async fn test_chart_rejects_empty_matrix() {
        let backend = MockBackend::new().with_result(QueryResult::Matrix(vec![]));
        let err = dispatcher(&backend)
            .render_chart("up", "0", "60000", "15s", Some("Uptime"), &ct())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NoData));
    }

    #[tokio::test]
    async fn test_chart_returns_base64_png() {
        let backend = MockBackend::new().with_result(QueryResult::Matrix(matrix(8)));
        let encoded = dispatcher(&backend)
            .render_chart(
                "up",
                "2024-01-01T00:00:00Z",
                "2024-01-01T01:00:00Z",
                "15m",
                None,
                &ct(),
            )
            .await
            .unwrap();

        let png = BASE64.decode(encoded).unwrap();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    fn test_chart_input_keeps_first_five_series() {
        let (title, series) = chart_input("up", None, QueryResult::Matrix(matrix(8))).unwrap();
        assert_eq!(title, "up");
        assert_eq!(series.len(), 5);
        assert_eq!(series, matrix(8)[..5]);
    }

    #[test]
    fn test_chart_input_uses_given_title() {
        let (title, series) =
            chart_input("up", Some("Uptime"), QueryResult::Matrix(matrix(2))).unwrap();
        assert_eq!(title, "Uptime");
        assert_eq!(series, matrix(2));
    }

    #[tokio::test]
    async fn test_search_metrics_uses_regex_matcher() {
        let backend = MockBackend::new().with_labels(&["http_requests_total", "http_errors_total"]);
        let text = dispatcher(&backend)
            .search_metrics("http_.*", &ct())
            .await
            .unwrap();
        assert_eq!(text, r#"["http_requests_total","http_errors_total"]"#);

        assert_eq!(
            backend.calls(),
            [Call::LabelValues {
                label: "__name__".to_string(),
                matchers: vec![r#"{__name__=~"http_.*"}"#.to_string()],
                start: fixed_now() - TimeDelta::hours(1),
                end: fixed_now(),
            }]
        );
    }

    #[tokio::test]
    async fn test_metric_labels_drops_name_label() {
        let backend = MockBackend::new().with_labels(&["__name__", "instance", "job"]);
        let text = dispatcher(&backend)
            .metric_labels("http_requests_total", &ct())
            .await
            .unwrap();
        assert_eq!(text, r#"["instance","job"]"#);

        assert_eq!(
            backend.calls(),
            [Call::LabelNames {
                matchers: vec![r#"{__name__="http_requests_total"}"#.to_string()],
                start: fixed_now() - TimeDelta::hours(1),
                end: fixed_now(),
            }]
        );
    }

    #[tokio::test]
    async fn test_metric_label_values_queries_label() {
        let backend = MockBackend::new().with_labels(&["GET", "POST"]);
        let text = dispatcher(&backend)
            .metric_label_values("http_requests_total", "method", &ct())
            .await
            .unwrap();
        assert_eq!(text, r#"["GET","POST"]"#);
        assert!(matches!(
            &backend.calls()[..],
            [Call::LabelValues { label, matchers, .. }]
                if label == "method" && matchers == &[r#"{__name__="http_requests_total"}"#]
        ));
    }

    #[tokio::test]
    async fn test_backend_error_is_wrapped() {
        let backend = MockBackend::new().failing("parse error at char 1");
        let err = dispatcher(&backend)
            .instant_query("(", None, &ct())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "query failed: bad_data: parse error at char 1");
    }

    #[tokio::test]
    async fn test_cancellation_aborts_pending_call() {
        let backend = MockBackend::new().hanging();
        let dispatcher = dispatcher(&backend);
        let token = ct();

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let err = dispatcher
            .range_query("up", "0", "60000", "15s", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    fn test_name_matcher_quotes_value() {
        assert_eq!(name_matcher("=", "up"), r#"{__name__="up"}"#);
        assert_eq!(name_matcher("=~", r"http_\d+"), r#"{__name__=~"http_\\d+"}"#);
        assert_eq!(name_matcher("=", r#"a"b"#), r#"{__name__="a\"b"}"#);
    }
}
