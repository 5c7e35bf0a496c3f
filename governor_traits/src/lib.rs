pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Line-oriented telemetry input (the sensing side of the rig).
///
/// Implementations buffer raw bytes internally and hand out one complete
/// line per call. `poll_line` must never block: `Ok(None)` means no full
/// line has arrived yet. Returned lines may or may not carry their
/// terminator; decoders are expected to trim.
pub trait TelemetrySource {
    fn poll_line(
        &mut self,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Positional actuator on the command side of the rig.
///
/// Positions are raw device ticks; callers decide what the bounds mean.
pub trait Servo {
    fn set_torque(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn write_goal_position(
        &mut self,
        position: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn read_present_position(
        &mut self,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: TelemetrySource + ?Sized> TelemetrySource for Box<T> {
    fn poll_line(
        &mut self,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).poll_line()
    }
}

impl<S: Servo + ?Sized> Servo for Box<S> {
    fn set_torque(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_torque(enabled)
    }

    fn write_goal_position(
        &mut self,
        position: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write_goal_position(position)
    }

    fn read_present_position(
        &mut self,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        (**self).read_present_position()
    }
}
