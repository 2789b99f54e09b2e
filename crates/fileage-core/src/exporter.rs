//! Exporter façade
//!
//! Wires configuration, watchers, tracker and metrics together and offers
//! read-only views for the HTTP layer.

use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::ExporterConfig;
use crate::error::Result;
use crate::metrics::{FileAgeMetrics, MetricKind};
use crate::readiness::{evaluate_at, Readiness};
use crate::timestamp::Timestamp;
use crate::tracker::{RunSnapshot, RunTracker, UpdateOutcome};
use crate::watcher::{attach, DirectoryWatcher, EventStream, WatchEvent};

/// Which marker file a watcher serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Start,
    End,
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRole::Start => f.write_str("start"),
            FileRole::End => f.write_str("end"),
        }
    }
}

/// The file-age exporter
pub struct Exporter {
    config: ExporterConfig,
    startup: DateTime<Utc>,
    metrics: Arc<FileAgeMetrics>,
    tracker: Arc<RunTracker>,
}

impl Exporter {
    /// Validate `config`, resolve its paths and set up metrics.
    ///
    /// Nothing is watched yet; see [`Exporter::start`].
    pub fn new(config: ExporterConfig) -> Result<Self> {
        let startup = Utc::now();
        let config = config.resolve()?;
        let metrics = Arc::new(FileAgeMetrics::new(&config.namespace, &config.subsystem)?);
        let tracker = Arc::new(RunTracker::new(
            config.start_file.clone(),
            config.end_file.clone(),
            startup,
            Arc::clone(&metrics),
        ));

        Ok(Self {
            config,
            startup,
            metrics,
            tracker,
        })
    }

    /// Build the exporter, attach both directory watchers, take the initial
    /// measurement and spawn the watch loop on the current runtime.
    ///
    /// Fails if a watched directory does not show up within the configured
    /// directory timeout.
    pub async fn start(config: ExporterConfig) -> Result<Arc<Self>> {
        let deadline = Instant::now() + config.directory_timeout;
        let exporter = Self::new(config)?;
        let policy = exporter.config.directory_backoff;

        let start_watcher = match &exporter.config.start_file {
            Some(path) => attach(path, deadline, policy).await?,
            None => None,
        };
        let end_watcher = attach(&exporter.config.end_file, deadline, policy).await?;

        exporter.update().await;

        let snapshot = exporter.snapshot();
        tracing::info!(
            start_file = ?exporter.config.start_file,
            end_file = %exporter.config.end_file.display(),
            start = %snapshot.start,
            end = %snapshot.end,
            "Watching marker files"
        );

        let (start_stream, start_backend) = start_watcher.map(DirectoryWatcher::into_parts).unzip();
        let (end_stream, end_backend) = end_watcher.map(DirectoryWatcher::into_parts).unzip();
        let tracker = Arc::clone(&exporter.tracker);
        tokio::spawn(async move {
            // Watches stop when the backends drop.
            let _backends = (start_backend, end_backend);
            watch_loop(tracker, start_stream, end_stream).await;
        });

        Ok(Arc::new(exporter))
    }

    /// Re-measure both files without blocking the runtime
    pub async fn update(&self) -> Option<UpdateOutcome> {
        refresh(&self.tracker).await
    }

    /// Refresh the age gauge and encode all metrics
    pub fn scrape(&self) -> Result<String> {
        if let Some(end) = self.tracker.end().instant() {
            self.tracker.ensure_registered(MetricKind::UpdateAge);
            let age = (Utc::now() - end).num_nanoseconds().unwrap_or(i64::MAX) as f64 / 1e9;
            self.metrics.set_age(age);
        }
        self.metrics.encode_text()
    }

    /// Health probe: health timeout plus grace window
    pub fn health(&self) -> Readiness {
        evaluate_at(
            self.tracker.end(),
            self.startup,
            Utc::now(),
            self.config.health_timeout,
            self.config.grace,
        )
    }

    /// Liveness probe: liveness timeout, no grace window
    pub fn liveness(&self) -> Readiness {
        evaluate_at(
            self.tracker.end(),
            self.startup,
            Utc::now(),
            self.config.liveness_timeout,
            std::time::Duration::ZERO,
        )
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.tracker.snapshot()
    }

    /// Last observed end timestamp
    pub fn last_update(&self) -> Timestamp {
        self.tracker.end()
    }

    /// Resolved configuration
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn metrics(&self) -> &FileAgeMetrics {
        &self.metrics
    }
}

async fn next_event(stream: &mut Option<EventStream>) -> Option<WatchEvent> {
    match stream {
        Some(s) => s.recv().await,
        None => std::future::pending().await,
    }
}

/// Stat both files on the blocking pool, then apply the result.
///
/// Slow storage stalls only this call, never the runtime serving probes.
async fn refresh(tracker: &Arc<RunTracker>) -> Option<UpdateOutcome> {
    let measuring = Arc::clone(tracker);
    match tokio::task::spawn_blocking(move || measuring.measure()).await {
        Ok((start, end)) => Some(tracker.apply(start, end)),
        Err(e) => {
            tracing::warn!(error = %e, "Measuring marker files failed");
            None
        }
    }
}

async fn handle_event(
    tracker: &Arc<RunTracker>,
    role: FileRole,
    file_name: &OsString,
    event: WatchEvent,
) {
    match event {
        WatchEvent::Changed(paths) => {
            if paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                refresh(tracker).await;
            }
        }
        WatchEvent::Rescan => {
            tracing::debug!(file = %role, "Events were dropped, re-measuring");
            refresh(tracker).await;
        }
        WatchEvent::Error(e) => {
            tracing::warn!(file = %role, error = %e, "Error waiting for fs event");
        }
    }
}

/// Wait on both streams and update the tracker for every matching event.
///
/// A disabled stream never takes part in the select. The loop ends only if
/// both streams close.
async fn watch_loop(
    tracker: Arc<RunTracker>,
    mut start: Option<EventStream>,
    mut end: Option<EventStream>,
) {
    let start_name = start.as_ref().map(|s| s.file_name().clone());
    let end_name = end.as_ref().map(|s| s.file_name().clone());
    let mut start_open = start.is_some();
    let mut end_open = end.is_some();

    loop {
        tokio::select! {
            event = next_event(&mut start), if start_open => match (event, &start_name) {
                (Some(event), Some(name)) => handle_event(&tracker, FileRole::Start, name, event).await,
                _ => start_open = false,
            },
            event = next_event(&mut end), if end_open => match (event, &end_name) {
                (Some(event), Some(name)) => handle_event(&tracker, FileRole::End, name, event).await,
                _ => end_open = false,
            },
            else => break,
        }
    }

    tracing::debug!("Watch loop finished");
}
