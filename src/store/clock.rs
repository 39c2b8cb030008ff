// src/store/clock.rs
// =============================================================================
// Wall-clock source for link timestamps.
//
// Timestamps are plain i64 milliseconds since the Unix epoch, which is what
// ends up in the store file. Going through a trait lets tests pin "now".
// =============================================================================

use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// The real clock, backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Converts a duration to whole milliseconds, saturating instead of wrapping.
pub fn duration_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
pub use manual::ManualClock;
