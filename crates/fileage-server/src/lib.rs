//! File-age exporter server
//!
//! Wires the exporter core to an HTTP listener and a command line.
//!
//! # Endpoints
//! - `GET /metrics` - Prometheus text exposition
//! - `GET /healthz` - 200 while the end file is fresh or during the grace window
//! - `GET /liveness` - 200 while the end file is fresh

pub mod cli;
pub mod server;

pub use cli::{init_tracing, Cli};
pub use server::{create_router, serve, REQUEST_TIMEOUT};
