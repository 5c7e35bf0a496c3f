pub mod ax12;
pub mod error;
pub mod link;
#[cfg(feature = "hardware")]
pub mod serial;

use std::time::{Duration, Instant};

use governor_traits::{Servo, TelemetrySource};

// AX-12 position registers are 10 bits wide.
const POSITION_CEILING: u16 = 1023;

/// Simulated positional servo.
///
/// Tracks torque state and slews the present position toward the last
/// goal a fixed number of ticks per write, roughly how the real horn
/// trails its goal between control cycles. With torque off the goal is
/// stored but the horn does not move.
pub struct SimulatedServo {
    torque_on: bool,
    goal: u16,
    present: u16,
    slew: u16,
}

impl SimulatedServo {
    pub fn new() -> Self {
        Self {
            torque_on: false,
            goal: 200,
            present: 200,
            slew: 64,
        }
    }

    pub fn present(&self) -> u16 {
        self.present
    }

    pub fn torque_on(&self) -> bool {
        self.torque_on
    }
}

impl Default for SimulatedServo {
    fn default() -> Self {
        Self::new()
    }
}

impl Servo for SimulatedServo {
    fn set_torque(
        &mut self,
        enabled: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.torque_on = enabled;
        tracing::debug!(enabled, "simulated torque");
        Ok(())
    }

    fn write_goal_position(
        &mut self,
        position: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.goal = position.min(POSITION_CEILING);
        if self.torque_on {
            let step = self.slew.min(self.goal.abs_diff(self.present));
            if self.goal > self.present {
                self.present += step;
            } else {
                self.present -= step;
            }
        }
        Ok(())
    }

    fn read_present_position(
        &mut self,
    ) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.present)
    }
}

/// Simulated telemetry feed.
///
/// Emits one JSON frame per interval with a deterministic spin-up
/// profile: the pulse count climbs from standstill and then hovers, so
/// downstream speed estimates settle near 200-220 RPM with the default
/// three-blade rotor and one-second window. Setting
/// `GOVERNOR_TEST_SIM_STALL=1` pins the rotor at standstill, which
/// tests use to drive the never-spun-up reporting paths.
pub struct SimulatedTelemetry {
    interval: Duration,
    next_due: Instant,
    tick: u64,
    stalled: bool,
}

impl SimulatedTelemetry {
    pub fn new(interval: Duration) -> Self {
        let stalled = std::env::var("GOVERNOR_TEST_SIM_STALL").is_ok_and(|v| v == "1");
        Self {
            interval,
            next_due: Instant::now(),
            tick: 0,
            stalled,
        }
    }

    fn pulse_count(&self) -> u64 {
        if self.stalled {
            return 0;
        }
        self.tick.min(10) + self.tick % 2
    }
}

impl TelemetrySource for SimulatedTelemetry {
    fn poll_line(
        &mut self,
    ) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
        let now = Instant::now();
        if now < self.next_due {
            return Ok(None);
        }
        self.next_due = now + self.interval;

        let pulses = self.pulse_count();
        self.tick += 1;
        let rpm = pulses as f64 * 20.0;
        let pressure = 1.0 + rpm / 300.0;
        let flow = rpm / 60.0;
        let line = format!(
            r#"{{"pressure_bar":{pressure:.3},"ir_pulse_count":{pulses},"flow_rate":{flow:.3}}}"#
        );
        tracing::trace!(tick = self.tick, pulses, "simulated frame");
        Ok(Some(line.into_bytes()))
    }
}
