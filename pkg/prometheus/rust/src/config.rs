// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// How MCP clients reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// JSON-RPC over stdin/stdout, for clients that spawn the server.
    Stdio,
    /// Streamable HTTP served at `/mcp`.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Command line and environment configuration.
#[derive(Parser, Debug)]
#[command(name = "prometheus-mcp-server")]
#[command(about = "MCP server for querying and charting Prometheus metrics")]
#[command(version)]
pub struct Config {
    /// Base URL of the Prometheus HTTP API.
    /// Example: http://localhost:9090
    #[arg(long, env = "PROMETHEUS_URL")]
    pub prometheus_url: String,

    /// Transport used to talk to MCP clients.
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Listen address for the http transport.
    #[arg(long, env = "MCP_BIND", default_value = "127.0.0.1:8081")]
    pub bind: SocketAddr,

    /// Append logs to this file instead of stderr.
    #[arg(long, env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Timeout of each request to Prometheus, in seconds.
    #[arg(
        long,
        env = "PROMETHEUS_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
