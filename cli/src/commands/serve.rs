// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Run the HTTP/SSE server for the configured agency

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::load_agency;
use crate::server;

#[derive(Args)]
pub struct ServeArgs {
    /// Bind address (default: spec.server.bind_address)
    #[arg(long, env = "SWITCHBOARD_HOST")]
    pub host: Option<String>,

    /// HTTP port (default: spec.server.port)
    #[arg(long, env = "SWITCHBOARD_PORT")]
    pub port: Option<u16>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "SWITCHBOARD_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

pub async fn execute(args: ServeArgs, config_override: Option<PathBuf>) -> Result<()> {
    let (manifest, agency) = load_agency(config_override)?;

    if let Some(port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics exposed on port {}", port);
    }

    let host = args
        .host
        .unwrap_or_else(|| manifest.spec.server.bind_address.clone());
    let port = args.port.unwrap_or(manifest.spec.server.port);
    let addr = format!("{}:{}", host, port);

    server::serve(Arc::new(agency), &addr).await
}
