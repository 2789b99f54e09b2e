//! Command-line interface
//!
//! Every flag can also be given through a `FILEAGE_*` environment variable,
//! which is the usual way to configure a sidecar container.

use clap::Parser;
use fileage_core::config::{parse_duration, DEFAULT_LISTEN};
use fileage_core::ExporterConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug, Clone)]
#[command(name = "fileage-exporter")]
#[command(about = "Exports the age of start/end marker files as Prometheus metrics and probes")]
#[command(version)]
pub struct Cli {
    /// The start file (empty disables run tracking)
    #[arg(long = "file-start", env = "FILEAGE_FILE_START", default_value = "")]
    pub file_start: String,

    /// The end file
    #[arg(long = "file-end", env = "FILEAGE_FILE_END", default_value = "")]
    pub file_end: String,

    /// host:port to listen at
    #[arg(long, env = "FILEAGE_LISTEN", default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Publish prometheus metrics on this URL endpoint
    #[arg(long = "prom", env = "FILEAGE_PROM", default_value = "/metrics")]
    pub metrics_path: String,

    /// Publish health status on this URL endpoint
    #[arg(long = "health", env = "FILEAGE_HEALTH", default_value = "/healthz")]
    pub health_path: String,

    /// Publish liveness status on this URL endpoint
    #[arg(long = "liveness", env = "FILEAGE_LIVENESS", default_value = "/liveness")]
    pub liveness_path: String,

    /// Prometheus namespace
    #[arg(long, env = "FILEAGE_NAMESPACE", default_value = "")]
    pub namespace: String,

    /// Prometheus subsystem
    #[arg(long, env = "FILEAGE_SUBSYSTEM", default_value = "")]
    pub subsystem: String,

    /// When should the service be considered unhealthy
    #[arg(long, env = "FILEAGE_HEALTH_TIMEOUT", default_value = "10m", value_parser = parse_duration)]
    pub health_timeout: Duration,

    /// When should the service be considered un-live
    #[arg(long, env = "FILEAGE_LIVENESS_TIMEOUT", default_value = "10m", value_parser = parse_duration)]
    pub liveness_timeout: Duration,

    /// How long initially the service is considered healthy
    #[arg(
        long = "health-grace",
        visible_alias = "health-welpenschutz",
        env = "FILEAGE_HEALTH_GRACE",
        default_value = "10m",
        value_parser = parse_duration
    )]
    pub health_grace: Duration,

    /// How long to wait for missing directories
    #[arg(long, env = "FILEAGE_DIRECTORY_TIMEOUT", default_value = "10m", value_parser = parse_duration)]
    pub directory_timeout: Duration,

    /// Enable debug logging
    #[arg(long, env = "FILEAGE_DEBUG")]
    pub debug: bool,
}

impl From<Cli> for ExporterConfig {
    fn from(cli: Cli) -> Self {
        let start_file = if cli.file_start.is_empty() {
            None
        } else {
            Some(PathBuf::from(cli.file_start))
        };

        ExporterConfig {
            start_file,
            end_file: PathBuf::from(cli.file_end),
            listen: cli.listen,
            metrics_path: cli.metrics_path,
            health_path: cli.health_path,
            liveness_path: cli.liveness_path,
            health_timeout: cli.health_timeout,
            liveness_timeout: cli.liveness_timeout,
            grace: cli.health_grace,
            directory_timeout: cli.directory_timeout,
            namespace: cli.namespace,
            subsystem: cli.subsystem,
            debug: cli.debug,
            ..ExporterConfig::default()
        }
    }
}

/// Initialise JSON logging.
///
/// `--debug` forces the `debug` level; otherwise `RUST_LOG` applies, falling
/// back to `info`.
pub fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
