//! Conversions from the TOML config schema into core parameter structs.

use crate::pid::PidGains;
use crate::{ControlCfg, PositionCfg, RotorCfg, Timing};

impl From<&governor_config::Control> for ControlCfg {
    fn from(control: &governor_config::Control) -> Self {
        Self {
            setpoint_rpm: control.setpoint_rpm,
            gains: PidGains {
                kp: control.kp,
                ki: control.ki,
                kd: control.kd,
            },
            integral_limit: control.integral_limit,
        }
    }
}

impl From<&governor_config::Rotor> for RotorCfg {
    fn from(rotor: &governor_config::Rotor) -> Self {
        Self {
            blade_count: rotor.blade_count,
            sample_period_s: rotor.sample_period_s,
        }
    }
}

impl From<&governor_config::Position> for PositionCfg {
    fn from(position: &governor_config::Position) -> Self {
        Self {
            min: position.min,
            max: position.max,
        }
    }
}

impl From<&governor_config::Timeouts> for Timing {
    fn from(timeouts: &governor_config::Timeouts) -> Self {
        Self {
            poll_ms: timeouts.poll_ms,
        }
    }
}
