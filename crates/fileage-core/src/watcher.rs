//! Directory watcher with bounded-retry attach
//!
//! A marker file is watched through its parent directory, because the file
//! itself is routinely replaced or missing. Directory watches are coarse, so
//! consumers narrow events with [`DirectoryWatcher::matches`].
//!
//! The directory may not exist yet when the exporter starts (a sibling
//! container creating its volume layout, for example). [`attach`] retries the
//! registration with exponential backoff until a deadline and only then gives
//! up with [`ExporterError::DirectoryTimeout`].

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::config::resolve_absolute;
use crate::error::{ExporterError, Result};

/// Exponential backoff schedule for directory registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt
    pub initial: Duration,

    /// Factor applied to the delay after every failed attempt
    pub multiplier: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl BackoffPolicy {
    /// Delay that follows `current`
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier.max(1))
    }
}

/// Something happened in a watched directory
#[derive(Debug)]
pub enum WatchEvent {
    /// Paths touched by a create, write, metadata, rename or remove
    Changed(Vec<PathBuf>),

    /// The backend dropped events (e.g. inotify queue overflow); the target
    /// may have changed without a notification
    Rescan,

    /// The notification backend reported an error; the stream continues
    Error(notify::Error),
}

/// Map a backend event to a [`WatchEvent`], or `None` for pure reads.
///
/// Unspecific events carry no usable path when the backend lost track, so
/// they become [`WatchEvent::Rescan`].
pub fn classify(event: Event) -> Option<WatchEvent> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            Some(WatchEvent::Changed(event.paths))
        }
        EventKind::Any | EventKind::Other => {
            if event.need_rescan() || event.paths.is_empty() {
                Some(WatchEvent::Rescan)
            } else {
                Some(WatchEvent::Changed(event.paths))
            }
        }
        _ => None,
    }
}

/// Events relevant to one target file, detached from their backend
#[derive(Debug)]
pub struct EventStream {
    file_name: OsString,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl EventStream {
    pub fn new(file_name: impl Into<OsString>, events: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self {
            file_name: file_name.into(),
            events,
        }
    }

    /// Base name of the target file
    pub fn file_name(&self) -> &OsString {
        &self.file_name
    }

    /// Whether `path` refers to the target file (base name comparison)
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name() == Some(self.file_name.as_os_str())
    }

    /// Next event; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}

/// Live watch on the parent directory of one target file
pub struct DirectoryWatcher {
    directory: PathBuf,
    stream: EventStream,
    backend: RecommendedWatcher,
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .field("file_name", &self.stream.file_name)
            .finish_non_exhaustive()
    }
}

impl DirectoryWatcher {
    /// The directory actually registered with the backend
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Base name of the target file
    pub fn file_name(&self) -> &OsString {
        self.stream.file_name()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.stream.matches(path)
    }

    /// Split into the event stream and the backend.
    ///
    /// Events keep flowing only while the backend is alive.
    pub fn into_parts(self) -> (EventStream, RecommendedWatcher) {
        (self.stream, self.backend)
    }
}

/// Attach a watcher to the parent directory of `target`.
///
/// An empty `target` disables watching and yields `Ok(None)`. Otherwise
/// registration is retried following `policy` until it succeeds or
/// `deadline` passes. The last backoff is clipped to the deadline and one
/// final attempt is made there, so giving up never happens early.
pub async fn attach(
    target: &Path,
    deadline: Instant,
    policy: BackoffPolicy,
) -> Result<Option<DirectoryWatcher>> {
    if target.as_os_str().is_empty() {
        return Ok(None);
    }

    let target = resolve_absolute(target)?;
    let directory = target
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            ExporterError::config(format!("{} has no parent directory", target.display()))
        })?;
    let file_name = target
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| {
            ExporterError::config(format!("{} does not name a file", target.display()))
        })?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut backend = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let message = match res {
            Ok(event) => match classify(event) {
                Some(message) => message,
                None => return,
            },
            Err(e) => WatchEvent::Error(e),
        };
        // Receiver gone means the exporter is shutting down.
        let _ = tx.send(message);
    })?;

    let started = Instant::now();
    let mut backoff = policy.initial;
    loop {
        match backend.watch(&directory, RecursiveMode::NonRecursive) {
            Ok(()) => break,
            Err(e) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(ExporterError::DirectoryTimeout {
                        directory,
                        timeout: deadline.saturating_duration_since(started),
                        source: e,
                    });
                }
                let wake = (now + backoff).min(deadline);
                tracing::warn!(
                    directory = %directory.display(),
                    backoff = ?backoff,
                    error = %e,
                    "Retrying to add directory"
                );
                sleep_until(wake).await;
                backoff = policy.next(backoff);
            }
        }
    }

    tracing::debug!(
        directory = %directory.display(),
        file = ?file_name,
        "Watching directory"
    );

    Ok(Some(DirectoryWatcher {
        directory,
        stream: EventStream::new(file_name, rx),
        backend,
    }))
}
