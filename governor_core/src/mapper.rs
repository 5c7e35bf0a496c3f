//! Mapping from controller output to servo goal positions.

use crate::error::BuildError;

/// Affine map from raw PID output onto the valve's travel.
///
/// An output of zero commands the closed stop (`min`), an output equal
/// to the setpoint commands fully open (`max`), and everything in
/// between interpolates linearly. The result is rounded to the nearest
/// tick and clamped into `[min, max]`, so the actuator can never be
/// commanded outside its mechanical travel.
#[derive(Debug, Clone, Copy)]
pub struct CommandMapper {
    setpoint: f64,
    min_position: u16,
    max_position: u16,
}

impl CommandMapper {
    pub fn new(
        setpoint: f64,
        min_position: u16,
        max_position: u16,
    ) -> Result<Self, BuildError> {
        if !setpoint.is_finite() || setpoint <= 0.0 {
            return Err(BuildError::InvalidSetpoint(
                "setpoint must be finite and > 0",
            ));
        }
        if min_position >= max_position {
            return Err(BuildError::InvalidBounds(
                "min position must be below max position",
            ));
        }
        Ok(Self {
            setpoint,
            min_position,
            max_position,
        })
    }

    /// Map one PID output to a goal position within bounds.
    #[must_use]
    pub fn map_to_position(&self, pid_output: f64) -> u16 {
        let span = f64::from(self.max_position - self.min_position);
        let raw = f64::from(self.min_position) + span * pid_output / self.setpoint;
        if raw.is_nan() {
            // fail closed
            return self.min_position;
        }
        let rounded = raw.round();
        if rounded <= f64::from(self.min_position) {
            self.min_position
        } else if rounded >= f64::from(self.max_position) {
            self.max_position
        } else {
            rounded as u16
        }
    }

    pub fn bounds(&self) -> (u16, u16) {
        (self.min_position, self.max_position)
    }
}
