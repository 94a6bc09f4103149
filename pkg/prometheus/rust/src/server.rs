// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! MCP server exposing the query tools.
//!
//! Tool arguments are read from the raw argument object through
//! [`ToolArgs`], so a missing or mistyped argument is reported by name
//! before anything is parsed or sent to the backend. The schemas below only
//! describe the arguments to clients.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        CallToolRequestParam, CallToolResult, Content, JsonObject, ListToolsResult,
        PaginatedRequestParam, ServerCapabilities, ServerInfo, Tool, ToolAnnotations,
    },
    service::RequestContext,
};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::args::ToolArgs;
use crate::backend::PrometheusApi;
use crate::error::ToolError;
use crate::query::QueryDispatcher;

pub const QUERY: &str = "query";
pub const QUERY_RANGE: &str = "query_range";
pub const QUERY_CHART: &str = "query_chart";
pub const SEARCH_METRICS: &str = "search_metrics";
pub const GET_METRIC_LABELS: &str = "get_metric_labels";
pub const GET_METRIC_LABEL_VALUES: &str = "get_metric_label_values";

const PNG_MIME_TYPE: &str = "image/png";

// --- Tool Parameter Types ---

/// Parameters for the query tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// PromQL expression.
    pub query: String,

    /// Evaluation time, RFC 3339 or Unix epoch milliseconds. Defaults to now.
    #[serde(default)]
    pub time: Option<String>,
}

/// Parameters for the query_range tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryRangeParams {
    /// PromQL expression.
    pub query: String,

    /// Range start, RFC 3339 or Unix epoch milliseconds.
    pub start: String,

    /// Range end, RFC 3339 or Unix epoch milliseconds.
    pub end: String,

    /// Resolution step, e.g. "15s", "1m" or "1h30m".
    pub step: String,
}

/// Parameters for the query_chart tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryChartParams {
    /// PromQL expression.
    pub query: String,

    /// Range start, RFC 3339 or Unix epoch milliseconds.
    pub start: String,

    /// Range end, RFC 3339 or Unix epoch milliseconds.
    pub end: String,

    /// Resolution step, e.g. "15s", "1m" or "1h30m".
    pub step: String,

    /// Chart title. Defaults to the query expression.
    #[serde(default)]
    pub title: Option<String>,
}

/// Parameters for the search_metrics tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchMetricsParams {
    /// Regular expression matched against metric names, e.g. "http_.*".
    pub pattern: String,
}

/// Parameters for the get_metric_labels tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MetricLabelsParams {
    /// Exact metric name.
    pub name: String,
}

/// Parameters for the get_metric_label_values tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MetricLabelValuesParams {
    /// Exact metric name.
    pub name: String,

    /// Label whose values are listed.
    pub label: String,
}

/// MCP server backed by a Prometheus API.
pub struct PrometheusMcpServer<B: ?Sized = dyn PrometheusApi> {
    dispatcher: QueryDispatcher<B>,
}

impl<B: ?Sized> Clone for PrometheusMcpServer<B> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<B: PrometheusApi + ?Sized + 'static> PrometheusMcpServer<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_dispatcher(QueryDispatcher::new(backend))
    }

    pub fn with_dispatcher(dispatcher: QueryDispatcher<B>) -> Self {
        Self { dispatcher }
    }

    /// Runs one tool call. All arguments are extracted before the operation
    /// starts.
    pub async fn call(
        &self,
        name: &str,
        args: &ToolArgs,
        ct: &CancellationToken,
    ) -> Result<CallToolResult, ToolError> {
        let d = &self.dispatcher;
        let content = match name {
            QUERY => {
                let query = args.required_str("query")?;
                let time = args.optional_str("time")?;
                Content::text(d.instant_query(query, time, ct).await?)
            }
            QUERY_RANGE => {
                let query = args.required_str("query")?;
                let start = args.required_str("start")?;
                let end = args.required_str("end")?;
                let step = args.required_str("step")?;
                Content::text(d.range_query(query, start, end, step, ct).await?)
            }
            QUERY_CHART => {
                let query = args.required_str("query")?;
                let start = args.required_str("start")?;
                let end = args.required_str("end")?;
                let step = args.required_str("step")?;
                let title = args.optional_str("title")?;
                let png = d.render_chart(query, start, end, step, title, ct).await?;
                Content::image(png, PNG_MIME_TYPE)
            }
            SEARCH_METRICS => {
                let pattern = args.required_str("pattern")?;
                Content::text(d.search_metrics(pattern, ct).await?)
            }
            GET_METRIC_LABELS => {
                let name = args.required_str("name")?;
                Content::text(d.metric_labels(name, ct).await?)
            }
            GET_METRIC_LABEL_VALUES => {
                let name = args.required_str("name")?;
                let label = args.required_str("label")?;
                Content::text(d.metric_label_values(name, label, ct).await?)
            }
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(CallToolResult::success(vec![content]))
    }
}

/// The tool catalog served by `tools/list`.
pub fn tools() -> Vec<Tool> {
    vec![
        tool::<QueryParams>(
            QUERY,
            "Run an instant PromQL query and return the result as JSON.",
        ),
        tool::<QueryRangeParams>(
            QUERY_RANGE,
            "Run a PromQL range query and return the result as JSON. \
             At most 5 series are returned.",
        ),
        tool::<QueryChartParams>(
            QUERY_CHART,
            "Run a PromQL range query and render it as a PNG line chart. \
             At most 5 series are drawn.",
        ),
        tool::<SearchMetricsParams>(
            SEARCH_METRICS,
            "Find metric names matching a regular expression, looking at the last hour.",
        ),
        tool::<MetricLabelsParams>(
            GET_METRIC_LABELS,
            "List the label names of a metric, looking at the last hour.",
        ),
        tool::<MetricLabelValuesParams>(
            GET_METRIC_LABEL_VALUES,
            "List the values of one label of a metric, looking at the last hour.",
        ),
    ]
}

fn tool<P: JsonSchema + 'static>(name: &'static str, description: &'static str) -> Tool {
    Tool::new(name, description, Arc::new(JsonObject::new()))
        .with_input_schema::<P>()
        .annotate(ToolAnnotations::new().read_only(true).open_world(true))
}

impl<B: PrometheusApi + ?Sized + 'static> ServerHandler for PrometheusMcpServer<B> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: "prometheus-mcp-server".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("Prometheus MCP Server".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Query a Prometheus server. Use search_metrics to find metric names, \
                 get_metric_labels and get_metric_label_values to explore their labels, \
                 query or query_range to fetch data, and query_chart to plot it. Times are \
                 RFC 3339 timestamps or Unix epoch milliseconds; steps look like 15s, 1m \
                 or 1h30m."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(tools()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = ToolArgs::new(request.arguments);
        debug!(tool = %request.name, "tool call");

        self.call(&request.name, &args, &context.ct)
            .await
            .map_err(|err| {
                warn!(tool = %request.name, error = %err, "tool call failed");
                err.into()
            })
    }
}
