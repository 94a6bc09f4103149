// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Prometheus MCP server binary.
//!
//! # Usage
//!
//! ```bash
//! prometheus-mcp-server --prometheus-url http://localhost:9090
//! prometheus-mcp-server --prometheus-url http://localhost:9090 --transport http --bind 0.0.0.0:8081
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus_mcp::config::{Config, Transport};
use prometheus_mcp::{PrometheusApi, PrometheusClient, PrometheusMcpServer, logging};
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::{StreamableHttpServerConfig, StreamableHttpService};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    logging::init(config.log_format, config.log_file.as_deref())?;

    let client = PrometheusClient::new(&config.prometheus_url, config.timeout())?;
    info!(
        prometheus_url = %client.base_url(),
        transport = ?config.transport,
        "starting prometheus MCP server"
    );

    let backend: Arc<dyn PrometheusApi> = Arc::new(client);
    let server = PrometheusMcpServer::new(backend);

    match config.transport {
        Transport::Stdio => serve_stdio(server).await,
        Transport::Http => serve_http(server, config.bind).await,
    }
}

async fn serve_stdio(server: PrometheusMcpServer) -> Result<()> {
    let service = server
        .serve(stdio())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start MCP server: {}", e))?;

    service
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {}", e))?;

    info!("client disconnected, exiting");
    Ok(())
}

async fn serve_http(server: PrometheusMcpServer, bind: SocketAddr) -> Result<()> {
    let shutdown = CancellationToken::new();

    // Every session gets its own handler sharing the same backend client.
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: shutdown.child_token(),
            ..Default::default()
        },
    );
    let router = axum::Router::new().nest_service("/mcp", service);

    let signals = ShutdownSignals::new()?;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("MCP HTTP server listening on http://{}/mcp", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            signals.recv().await;
            info!("MCP HTTP server shutting down");
            shutdown.cancel();
        })
        .await
        .context("MCP HTTP server failed")?;

    Ok(())
}

/// SIGTERM (container stop) and SIGINT (Ctrl-C) handlers, installed before
/// the server starts accepting connections.
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    fn new() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?,
        })
    }

    /// Resolves on the first of either signal.
    async fn recv(mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => info!("received SIGTERM"),
            _ = self.sigint.recv() => info!("received SIGINT"),
        }
    }
}
