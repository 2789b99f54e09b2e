//! Run-state tracker
//!
//! Owns the authoritative `start` / `end` / `previous_end` triple and keeps
//! the derived metrics in step with it. [`RunTracker::apply`] is the only
//! writer: it gets the result of [`RunTracker::measure`] once at startup and
//! once per relevant filesystem event.
//!
//! Raw timestamps are overwritten on every call so probes always see the
//! freshest mtimes. Counters and durations only move when a *new* end
//! timestamp shows up that is chronologically sane:
//!
//! - not earlier than the start timestamp (no negative durations), and
//! - not earlier than this exporter's own startup (leftovers from a previous
//!   incarnation are not counted again after a restart).
//!
//! Directory watches deliver several events per write, so the same end value
//! arriving twice must not count twice.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::metrics::{FileAgeMetrics, MetricKind};
use crate::timestamp::{measure, Timestamp};

/// Mutable state guarded by the tracker lock
#[derive(Debug, Default)]
pub struct RunState {
    pub start: Timestamp,
    pub end: Timestamp,
    pub previous_end: Timestamp,
    registered: HashSet<MetricKind>,
}

/// Consistent copy of the tracked timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSnapshot {
    pub start: Timestamp,
    pub end: Timestamp,
    pub previous_end: Timestamp,
}

/// What one update did
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateOutcome {
    /// Running flag, `None` while no start file has been seen
    pub running: Option<bool>,

    /// A new completed run was counted
    pub completed: bool,

    /// Duration recorded for the completed run, in seconds
    pub duration: Option<f64>,
}

/// Single authority over the run state of the watched file pair
pub struct RunTracker {
    start_file: Option<PathBuf>,
    end_file: PathBuf,
    startup: DateTime<Utc>,
    metrics: Arc<FileAgeMetrics>,
    state: RwLock<RunState>,
}

impl RunTracker {
    pub fn new(
        start_file: Option<PathBuf>,
        end_file: PathBuf,
        startup: DateTime<Utc>,
        metrics: Arc<FileAgeMetrics>,
    ) -> Self {
        Self {
            start_file,
            end_file,
            startup,
            metrics,
            state: RwLock::new(RunState::default()),
        }
    }

    /// Stat both marker files. Blocking; never called with the lock held.
    pub fn measure(&self) -> (Timestamp, Timestamp) {
        let start = self
            .start_file
            .as_deref()
            .map(measure)
            .unwrap_or(Timestamp::Absent);
        (start, measure(&self.end_file))
    }

    /// Apply freshly measured timestamps
    pub fn apply(&self, start: Timestamp, end: Timestamp) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();
        let mut state = self.write_state();

        state.start = start;
        state.end = end;

        if !start.is_absent() {
            self.register_once(&mut state, MetricKind::UpdateRunning);
            let running = end.is_absent() || start.is_after(&end);
            if running {
                tracing::info!(start = %start, "An update run started.");
            }
            self.metrics.set_running(running);
            outcome.running = Some(running);
        }

        if !end.is_absent() && end != state.previous_end {
            state.previous_end = end;

            let startup = Timestamp::At(self.startup);
            if start.is_after(&end) || startup.is_after(&end) {
                tracing::debug!(
                    start = %start,
                    end = %end,
                    startup = %startup,
                    "Ignoring end timestamp that predates start or startup"
                );
                return outcome;
            }

            tracing::info!(end = %end, "An update run ended.");
            self.metrics.inc_update_count();
            outcome.completed = true;

            if let (Some(s), Some(e)) = (start.instant(), end.instant()) {
                if let Ok(elapsed) = (e - s).to_std() {
                    self.register_once(&mut state, MetricKind::UpdateDuration);
                    let seconds = elapsed.as_secs_f64();
                    self.metrics.observe_duration(seconds);
                    outcome.duration = Some(seconds);
                }
            }
        }

        outcome
    }

    /// Copy of the current timestamps
    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.read_state();
        RunSnapshot {
            start: state.start,
            end: state.end,
            previous_end: state.previous_end,
        }
    }

    /// Current end timestamp
    pub fn end(&self) -> Timestamp {
        self.read_state().end
    }

    /// Register `kind` unless that already happened
    pub fn ensure_registered(&self, kind: MetricKind) {
        if self.read_state().registered.contains(&kind) {
            return;
        }
        let mut state = self.write_state();
        self.register_once(&mut state, kind);
    }

    /// Whether `kind` has been registered
    pub fn is_registered(&self, kind: MetricKind) -> bool {
        self.read_state().registered.contains(&kind)
    }

    fn register_once(&self, state: &mut RunState, kind: MetricKind) {
        if state.registered.insert(kind) {
            if let Err(e) = self.metrics.register(kind) {
                tracing::warn!(metric = ?kind, error = %e, "Failed to register metric");
            }
        }
    }

    // The state is plain data, so a panic in another holder cannot leave it
    // half-written in a way readers care about.
    fn read_state(&self) -> RwLockReadGuard<'_, RunState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RunState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
