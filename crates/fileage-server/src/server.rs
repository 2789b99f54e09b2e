//! HTTP surface of the file-age exporter
//!
//! Three GET routes, paths taken from the exporter configuration:
//! - metrics (default `/metrics`) - Prometheus text exposition
//! - health (default `/healthz`) - 200 or 503 with a plain-text body
//! - liveness (default `/liveness`) - same contract, no grace window
//!
//! Handlers only read exporter state; they never touch the filesystem.

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use fileage_core::{metrics::CONTENT_TYPE as METRICS_CONTENT_TYPE, Exporter, Readiness};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

/// Upper bound for reading and answering one request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

const PROBE_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Create the router for `exporter`'s configured endpoints
pub fn create_router(exporter: Arc<Exporter>) -> Router {
    let config = exporter.config().clone();
    Router::new()
        .route(&config.metrics_path, get(metrics_handler))
        .route(&config.health_path, get(health_handler))
        .route(&config.liveness_path, get(liveness_handler))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        // One request per connection.
        .layer(SetResponseHeaderLayer::overriding(
            header::CONNECTION,
            HeaderValue::from_static("close"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(exporter)
}

/// Serve `exporter` on an already bound listener until the process ends
pub async fn serve(exporter: Arc<Exporter>, listener: TcpListener) -> std::io::Result<()> {
    let router = create_router(exporter);
    axum::serve(listener, router).await
}

/// Prometheus scrape; refreshes the age gauge first
async fn metrics_handler(State(exporter): State<Arc<Exporter>>) -> Response {
    match exporter.scrape() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health_handler(State(exporter): State<Arc<Exporter>>) -> Response {
    probe_response(exporter.health())
}

async fn liveness_handler(State(exporter): State<Arc<Exporter>>) -> Response {
    probe_response(exporter.liveness())
}

fn probe_response(readiness: Readiness) -> Response {
    let status = if readiness.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        [(header::CONTENT_TYPE, PROBE_CONTENT_TYPE)],
        readiness.body(),
    )
        .into_response()
}
