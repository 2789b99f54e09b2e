//! File-age exporter entry point
//!
//! Watches a start and an end marker file and serves metrics plus
//! health/liveness probes derived from their modification times.

use anyhow::Context;
use clap::Parser;
use fileage_core::{Exporter, ExporterConfig, VERSION};
use fileage_server::{init_tracing, serve, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = ExporterConfig::from(Cli::parse());
    init_tracing(config.debug);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "fileage-exporter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    tracing::info!(version = VERSION, "Starting fileage-exporter");

    let exporter = Exporter::start(config)
        .await
        .context("failed to start exporter")?;

    let addr = exporter.config().bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;

    tracing::info!(
        listen = %addr,
        metrics = %exporter.config().metrics_path,
        health = %exporter.config().health_path,
        liveness = %exporter.config().liveness_path,
        "Serving"
    );

    serve(exporter, listener).await.context("server error")?;
    Ok(())
}
