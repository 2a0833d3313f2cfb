//! Staleness policy for stored credentials.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};

/// Default credential lifetime before a refresh is attempted (hours)
pub const DEFAULT_THRESHOLD_HOURS: i64 = 6;

/// Returns true if a credential created at `last` is still usable at `now`.
///
/// A gap exactly equal to `threshold` still counts as fresh. A `last` in
/// the future (clock skew) is fresh.
pub fn is_fresh(last: DateTime<Utc>, now: DateTime<Utc>, threshold: Duration) -> bool {
    now - last <= threshold
}

/// Freshness check with a per-deployment threshold.
#[derive(Debug, Clone, Copy)]
pub struct StalenessSupervisor {
    threshold: Duration,
}

impl StalenessSupervisor {
    /// Fails with `Error::Config` unless `threshold_hours` is positive and
    /// representable as a `chrono::Duration`.
    pub fn new(threshold_hours: i64) -> Result<Self> {
        let threshold = threshold_duration(threshold_hours)?;
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    pub fn is_fresh(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_fresh(last, now, self.threshold)
    }
}

impl Default for StalenessSupervisor {
    fn default() -> Self {
        Self {
            threshold: Duration::hours(DEFAULT_THRESHOLD_HOURS),
        }
    }
}

/// Converts an hour count into a threshold, rejecting values chrono cannot hold.
pub fn threshold_duration(hours: i64) -> Result<Duration> {
    match Duration::try_hours(hours) {
        Some(threshold) if hours > 0 => Ok(threshold),
        _ => Err(Error::Config(format!(
            "Staleness threshold out of range: {} hours",
            hours
        ))),
    }
}
