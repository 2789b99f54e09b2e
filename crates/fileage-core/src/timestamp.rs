//! Modification-time source
//!
//! A [`Timestamp`] is either a real instant or [`Timestamp::Absent`]. Absence
//! is the steady state for a marker file that has not been written yet, so
//! [`measure`] never returns an error.

use chrono::{DateTime, Utc};
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

/// Rendering of [`Timestamp::Absent`], the zero instant.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// A point in time, or the absence of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timestamp {
    /// File missing, unstatable or not configured
    #[default]
    Absent,
    /// A real instant
    At(DateTime<Utc>),
}

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        Timestamp::At(Utc::now())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Timestamp::Absent)
    }

    /// The instant, if any
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Absent => None,
            Timestamp::At(t) => Some(*t),
        }
    }

    /// Strictly later than `other`. Always false when either side is absent.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        match (self, other) {
            (Timestamp::At(a), Timestamp::At(b)) => a > b,
            _ => false,
        }
    }

    /// Strictly earlier than `other`. Always false when either side is absent.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        other.is_after(self)
    }

    /// RFC 3339 with nanoseconds, trailing zeros trimmed. Absent renders as
    /// [`ZERO_TIME`].
    pub fn to_rfc3339_nano(&self) -> String {
        match self {
            Timestamp::Absent => ZERO_TIME.to_string(),
            Timestamp::At(t) => {
                let mut out = t.format("%Y-%m-%dT%H:%M:%S").to_string();
                let nanos = t.timestamp_subsec_nanos() % 1_000_000_000;
                if nanos > 0 {
                    let frac = format!("{:09}", nanos);
                    out.push('.');
                    out.push_str(frac.trim_end_matches('0'));
                }
                out.push('Z');
                out
            }
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        Timestamp::At(DateTime::<Utc>::from(t))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(t: DateTime<Utc>) -> Self {
        Timestamp::At(t)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339_nano())
    }
}

/// Modification time of `path`.
///
/// An empty path means the feature is disabled. Any stat failure yields
/// [`Timestamp::Absent`].
pub fn measure(path: &Path) -> Timestamp {
    if path.as_os_str().is_empty() {
        return Timestamp::Absent;
    }

    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(mtime) => Timestamp::from(mtime),
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "Cannot stat file");
            }
            Timestamp::Absent
        }
    }
}
