//! Rotor speed estimation from IR beam-break pulses.
//!
//! The sensor counts one pulse per blade crossing, so over a window of
//! `sample_period_s` seconds a rotor with `blade_count` blades making
//! `n` pulses turns at `n * (60 / period) / blades` RPM.

/// Convert a pulse count for one sample window into RPM.
///
/// Callers validate `blade_count >= 1` and `sample_period_s > 0` at
/// configuration time.
#[must_use]
pub fn estimate_rpm(pulse_count: u32, blade_count: u32, sample_period_s: f64) -> f64 {
    debug_assert!(blade_count > 0, "blade_count must be >= 1");
    debug_assert!(
        sample_period_s > 0.0 && sample_period_s.is_finite(),
        "sample_period_s must be finite and > 0"
    );
    let pulses_per_minute = f64::from(pulse_count) * (60.0 / sample_period_s);
    pulses_per_minute / f64::from(blade_count)
}
