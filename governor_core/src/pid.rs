//! Discrete PID controller for the speed loop.
//!
//! The discretization bakes the sample interval into the gains: the
//! integral term is a plain running sum of errors and the derivative a
//! first difference, both advanced once per telemetry frame. Given the
//! same gains and the same error sequence the controller reproduces
//! bit-identical outputs, which the loop relies on for repeatable runs.

/// Proportional, integral, and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Default for PidGains {
    fn default() -> Self {
        // reference rig tuning for the 210 RPM loop
        Self {
            kp: 0.1,
            ki: 0.02,
            kd: 0.0003,
        }
    }
}

/// Controller memory carried between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    pub integral: f64,
    pub previous_error: f64,
}

/// Stateful controller; one instance lives for the whole run.
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral_limit: Option<f64>,
    state: ControllerState,
}

impl PidController {
    /// `integral_limit`, when set, clamps the accumulator to
    /// `[-limit, limit]` after each update so a long standstill cannot
    /// wind the integral term up without bound.
    pub fn new(gains: PidGains, integral_limit: Option<f64>) -> Self {
        Self {
            gains,
            integral_limit,
            state: ControllerState::default(),
        }
    }

    /// Advance one cycle and return the raw control output.
    pub fn compute(&mut self, setpoint: f64, measured: f64) -> f64 {
        let error = setpoint - measured;
        self.state.integral += error;
        if let Some(limit) = self.integral_limit {
            self.state.integral = self.state.integral.clamp(-limit, limit);
        }
        let derivative = error - self.state.previous_error;
        let output = self.gains.kp * error
            + self.gains.ki * self.state.integral
            + self.gains.kd * derivative;
        self.state.previous_error = error;
        output
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig_controller() -> PidController {
        PidController::new(PidGains::default(), None)
    }

    #[test]
    fn first_cycle_matches_hand_computation() {
        let mut pid = rig_controller();
        // error 210, integral 210, derivative 210
        let out = pid.compute(210.0, 0.0);
        let expected = 0.1 * 210.0 + 0.02 * 210.0 + 0.0003 * 210.0;
        assert_eq!(out, expected);
        assert_eq!(pid.state().integral, 210.0);
        assert_eq!(pid.state().previous_error, 210.0);
    }

    #[test]
    fn derivative_tracks_the_error_difference() {
        let mut pid = PidController::new(
            PidGains {
                kp: 0.0,
                ki: 0.0,
                kd: 1.0,
            },
            None,
        );
        assert_eq!(pid.compute(100.0, 0.0), 100.0); // error 100, prev 0
        assert_eq!(pid.compute(100.0, 40.0), -40.0); // error 60, prev 100
    }

    #[test]
    fn identical_sequences_produce_identical_bits() {
        let inputs = [0.0, 12.5, 80.0, 150.0, 199.9, 210.0, 230.0, 207.3];
        let mut a = rig_controller();
        let mut b = rig_controller();
        for &rpm in &inputs {
            let oa = a.compute(210.0, rpm);
            let ob = b.compute(210.0, rpm);
            assert_eq!(oa.to_bits(), ob.to_bits());
        }
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn unbounded_integral_keeps_accumulating_at_standstill() {
        let mut pid = rig_controller();
        for _ in 0..100 {
            pid.compute(210.0, 0.0);
        }
        assert_eq!(pid.state().integral, 21_000.0);
    }

    #[test]
    fn integral_limit_caps_windup_in_both_directions() {
        let mut pid = PidController::new(PidGains::default(), Some(500.0));
        for _ in 0..100 {
            pid.compute(210.0, 0.0);
        }
        assert_eq!(pid.state().integral, 500.0);

        for _ in 0..100 {
            pid.compute(210.0, 1000.0);
        }
        assert_eq!(pid.state().integral, -500.0);
    }
}
