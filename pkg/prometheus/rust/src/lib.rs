// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! MCP tool server exposing a Prometheus-compatible HTTP API.
//!
//! Six read-only tools are served: instant and range queries, a PNG chart of
//! a range query, metric name search, and label / label value listing. Range
//! results are capped to [`model::MAX_SERIES`] series.

// Correctness
#![cfg_attr(not(test), deny(clippy::indexing_slicing))]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
// Panicking code
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod args;
pub mod backend;
pub mod chart;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod server;
pub mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::PrometheusApi;
pub use client::PrometheusClient;
pub use error::{BackendError, ToolError};
pub use server::PrometheusMcpServer;
