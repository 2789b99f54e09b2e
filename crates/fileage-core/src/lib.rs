//! File-age exporter core
//!
//! Observes a "start" and an "end" marker file written by an external batch
//! process and derives liveness, health and duration metrics from their
//! modification times. The filesystem is the only channel to the monitored
//! workload, which makes this suitable for a sidecar container.
//!
//! ## Architecture
//!
//! 1. **Time source** (`timestamp`): mtime of a file, or `Absent`.
//! 2. **Directory watcher** (`watcher`): notify-based watch on the parent
//!    directory with exponential-backoff attach.
//! 3. **Run-state tracker** (`tracker`): the update algorithm and derived
//!    metrics, behind a reader/writer lock.
//! 4. **Readiness** (`readiness`): health/liveness evaluation and probe body.
//! 5. **Exporter** (`exporter`): construction order, watch loop and the views
//!    used by the HTTP layer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fileage_core::{Exporter, ExporterConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ExporterConfig::builder()
//!         .start_file("/data/update.start")
//!         .end_file("/data/update.end")
//!         .build();
//!
//!     let exporter = Exporter::start(config).await?;
//!     println!("{}", exporter.health().body());
//!     println!("{}", exporter.scrape()?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod readiness;
pub mod timestamp;
pub mod tracker;
pub mod watcher;

pub use config::{parse_duration, ExporterConfig, ExporterConfigBuilder};
pub use error::{ExporterError, Result};
pub use exporter::{Exporter, FileRole};
pub use metrics::{FileAgeMetrics, MetricKind};
pub use readiness::{evaluate_at, Readiness};
pub use timestamp::{measure, Timestamp, ZERO_TIME};
pub use tracker::{RunSnapshot, RunState, RunTracker, UpdateOutcome};
pub use watcher::{attach, classify, BackoffPolicy, DirectoryWatcher, EventStream, WatchEvent};

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
