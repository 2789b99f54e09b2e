//! Health and liveness evaluation
//!
//! A probe is good while the end file is younger than its timeout. The
//! health probe additionally gets a grace window after exporter startup, so a
//! freshly started sidecar that has not seen a recent end file yet does not
//! get its pod marked unhealthy. Liveness never uses the grace window.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::timestamp::{Timestamp, ZERO_TIME};

/// Result of one probe evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ok: bool,
    pub last_update: Timestamp,
}

impl Readiness {
    /// Plain-text probe body, identical in shape for good and bad outcomes
    pub fn body(&self) -> String {
        format!(
            "last_update: {}\r\n# time {} means never.\r\n# alive/healthy: {}\r\n",
            self.last_update.to_rfc3339_nano(),
            ZERO_TIME,
            self.ok
        )
    }
}

/// Evaluate a probe at `now`.
///
/// `ok` holds when `now - end < timeout`, or when `grace` is non-zero and the
/// exporter started less than `grace` ago. An absent end is never fresh.
pub fn evaluate_at(
    end: Timestamp,
    startup: DateTime<Utc>,
    now: DateTime<Utc>,
    timeout: Duration,
    grace: Duration,
) -> Readiness {
    let fresh = match end.instant() {
        Some(t) => shorter_than(now - t, timeout),
        None => false,
    };
    let warming_up = !grace.is_zero() && shorter_than(now - startup, grace);

    Readiness {
        ok: fresh || warming_up,
        last_update: end,
    }
}

fn shorter_than(elapsed: chrono::Duration, limit: Duration) -> bool {
    match chrono::Duration::from_std(limit) {
        Ok(limit) => elapsed < limit,
        // Limits beyond chrono's range are effectively infinite.
        Err(_) => true,
    }
}
