//! Clock port - wall-clock time for heartbeat timestamps.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
///
/// Timers (backoff, heartbeat cadence, connect timeout) run on the tokio clock;
/// this port only supplies the timestamps written into outbound frames.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
