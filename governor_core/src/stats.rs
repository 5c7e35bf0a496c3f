//! Running error statistics for a single run.

/// Incremental mean of `|setpoint - rpm|`, measured from spin-up.
///
/// Samples taken while the rotor still reads zero RPM are ignored; the
/// first non-zero sample opens the window and is itself included. With
/// no samples in the window the average reports `+inf`, which keeps
/// "never spun up" distinguishable from "tracked perfectly".
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStatistics {
    window_start_ms: Option<u64>,
    abs_error_sum: f64,
    samples: u64,
}

impl RunStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one cycle's measurement.
    pub fn observe(&mut self, setpoint: f64, rpm: f64, now_ms: u64) {
        if self.window_start_ms.is_none() {
            if rpm > 0.0 {
                self.window_start_ms = Some(now_ms);
            } else {
                return;
            }
        }
        self.abs_error_sum += (setpoint - rpm).abs();
        self.samples += 1;
    }

    #[must_use]
    pub fn average_error(&self) -> f64 {
        if self.samples == 0 {
            f64::INFINITY
        } else {
            self.abs_error_sum / self.samples as f64
        }
    }

    /// When the rotor first reported a non-zero speed, if ever.
    #[must_use]
    pub fn window_start_ms(&self) -> Option<u64> {
        self.window_start_ms
    }

    #[must_use]
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_infinity_before_spin_up() {
        let mut stats = RunStatistics::new();
        assert_eq!(stats.average_error(), f64::INFINITY);

        stats.observe(210.0, 0.0, 0);
        stats.observe(210.0, 0.0, 1000);
        assert_eq!(stats.average_error(), f64::INFINITY);
        assert_eq!(stats.samples(), 0);
        assert_eq!(stats.window_start_ms(), None);
    }

    #[test]
    fn first_non_zero_sample_opens_and_joins_the_window() {
        let mut stats = RunStatistics::new();
        stats.observe(210.0, 0.0, 0);
        stats.observe(210.0, 60.0, 2000);
        assert_eq!(stats.window_start_ms(), Some(2000));
        assert_eq!(stats.samples(), 1);
        assert_eq!(stats.average_error(), 150.0);
    }

    #[test]
    fn later_standstill_samples_still_count() {
        // a stall after spin-up is a real control error, not pre-start noise
        let mut stats = RunStatistics::new();
        stats.observe(210.0, 210.0, 0);
        stats.observe(210.0, 0.0, 1000);
        assert_eq!(stats.samples(), 2);
        assert_eq!(stats.average_error(), 105.0);
    }

    #[test]
    fn running_mean_matches_a_direct_recomputation() {
        let rpms = [180.0, 200.0, 215.0, 190.0, 230.0, 210.0];
        let mut stats = RunStatistics::new();
        for (i, &rpm) in rpms.iter().enumerate() {
            stats.observe(210.0, rpm, i as u64 * 1000);
        }
        let direct: f64 =
            rpms.iter().map(|&rpm| (210.0 - rpm).abs()).sum::<f64>() / rpms.len() as f64;
        assert!((stats.average_error() - direct).abs() < 1e-12);
    }
}
