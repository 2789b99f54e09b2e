//! Prometheus metrics for the file-age exporter
//!
//! - `update_count_total` (counter) - completed, chronologically sane runs
//! - `update_age_seconds` (gauge) - time since the end file was last written
//! - `update_running` (gauge) - 1 while a run seems to be in progress
//! - `update_duration_seconds` (histogram) - duration of completed runs
//!
//! Only the counter is registered up front. The other series are registered
//! the first time they carry meaning, so an exporter without a start file
//! never publishes a permanently-zero running gauge. Which kinds are already
//! registered is tracked by the caller (see [`crate::tracker`]), under the
//! same lock as the state those metrics describe.

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

use crate::error::Result;

/// Content type of the text exposition format
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// The lazily registered metric families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    UpdateCount,
    UpdateAge,
    UpdateRunning,
    UpdateDuration,
}

/// Exporter-owned registry and metric handles
pub struct FileAgeMetrics {
    registry: Registry,
    update_count: IntCounter,
    update_age: Gauge,
    update_running: IntGauge,
    update_duration: Histogram,
}

impl FileAgeMetrics {
    /// Create all metrics and register the counter (and, on Linux, the
    /// process collector) with a fresh registry.
    pub fn new(namespace: &str, subsystem: &str) -> Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace)
                .subsystem(subsystem)
        };

        let update_count = IntCounter::with_opts(opts(
            "update_count_total",
            "Counter of update runs.",
        ))?;

        let update_age = Gauge::with_opts(opts(
            "update_age_seconds",
            "Time since last time an update finished.",
        ))?;

        let update_running = IntGauge::with_opts(opts(
            "update_running",
            "If the monitored process seems to run: 0 no; 1 yes.",
        ))?;

        // Batch runs last seconds to hours: 1s .. ~9h.
        let update_duration = Histogram::with_opts(
            HistogramOpts::new("update_duration_seconds", "Duration of update runs in seconds.")
                .namespace(namespace)
                .subsystem(subsystem)
                .buckets(prometheus::exponential_buckets(1.0, 2.0, 16)?),
        )?;

        let registry = Registry::new();
        registry.register(Box::new(update_count.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            update_count,
            update_age,
            update_running,
            update_duration,
        })
    }

    /// Add a lazily registered metric to the registry.
    ///
    /// Callers guarantee at most one call per kind; registering the counter
    /// is a no-op because it is registered at construction.
    pub fn register(&self, kind: MetricKind) -> Result<()> {
        let collector: Box<dyn prometheus::core::Collector> = match kind {
            MetricKind::UpdateCount => return Ok(()),
            MetricKind::UpdateAge => Box::new(self.update_age.clone()),
            MetricKind::UpdateRunning => Box::new(self.update_running.clone()),
            MetricKind::UpdateDuration => Box::new(self.update_duration.clone()),
        };
        self.registry.register(collector)?;
        Ok(())
    }

    /// Count one completed run
    pub fn inc_update_count(&self) {
        self.update_count.inc();
    }

    pub fn set_running(&self, running: bool) {
        self.update_running.set(i64::from(running));
    }

    pub fn set_age(&self, seconds: f64) {
        self.update_age.set(seconds);
    }

    pub fn observe_duration(&self, seconds: f64) {
        self.update_duration.observe(seconds);
    }

    /// Completed runs so far
    pub fn update_count(&self) -> u64 {
        self.update_count.get()
    }

    /// Current value of the running gauge
    pub fn running(&self) -> i64 {
        self.update_running.get()
    }

    /// Number of observed run durations
    pub fn duration_count(&self) -> u64 {
        self.update_duration.get_sample_count()
    }

    /// Sum of observed run durations in seconds
    pub fn duration_sum(&self) -> f64 {
        self.update_duration.get_sample_sum()
    }

    /// Last value written to the age gauge
    pub fn age(&self) -> f64 {
        self.update_age.get()
    }

    /// The underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all registered metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(e.to_string()).into())
    }
}
