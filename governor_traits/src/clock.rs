use std::thread;
use std::time::{Duration, Instant};

/// Time source for the control loop.
///
/// The loop stamps cycle records with `ms_since()` and idles between
/// telemetry polls with `sleep()`. Tests inject a fake implementation
/// so cycle pacing is deterministic.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Whole milliseconds elapsed since `epoch`; 0 if `epoch` is in the future.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Wall clock used on the real rig, backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_since_saturates_for_future_epochs() {
        let clock = MonotonicClock::new();
        let future = clock.now() + Duration::from_secs(60);
        assert_eq!(clock.ms_since(future), 0);
    }

    #[test]
    fn ms_since_tracks_elapsed_time() {
        let clock = MonotonicClock::new();
        let epoch = clock.now();
        clock.sleep(Duration::from_millis(20));
        assert!(clock.ms_since(epoch) >= 20);
    }
}
