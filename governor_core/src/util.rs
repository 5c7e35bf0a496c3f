//! Small timing helpers shared by the runner and the CLI.

use std::time::{Duration, Instant};

/// Idle sleep between telemetry polls; zero is bumped to one
/// millisecond so a misconfigured loop cannot busy-spin.
#[must_use]
pub fn poll_interval(poll_ms: u64) -> Duration {
    Duration::from_millis(poll_ms.max(1))
}

/// Stop predicate that fires once `limit` has elapsed from now.
#[must_use]
pub fn deadline_predicate(limit: Duration) -> impl FnMut() -> bool + Send {
    let deadline = Instant::now() + limit;
    move || Instant::now() >= deadline
}
