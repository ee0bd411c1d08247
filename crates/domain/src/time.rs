//! Time and timestamp helpers.

use chrono::{DateTime, Duration, Utc};

/// UTC timestamp used for history entries and bus events.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Oldest timestamp still inside a retention window of `days` ending at `from`.
#[must_use]
pub fn retention_cutoff(from: Timestamp, days: u32) -> Timestamp {
    from - Duration::days(i64::from(days))
}
