#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core closed-loop speed regulation (hardware-agnostic).
//!
//! One control cycle runs sense -> estimate -> decide -> act: a JSON
//! telemetry line is decoded (`frame`), the pulse count becomes an RPM
//! estimate (`rpm`), a PID step turns the speed error into a raw
//! output (`pid`), the output maps onto the valve's travel (`mapper`),
//! and the goal is written to the servo with a position read-back.
//! Every completed cycle emits a [`CycleRecord`] on a bounded stream
//! (`record`) and feeds the running error statistics (`stats`).
//!
//! All hardware goes through `governor_traits::TelemetrySource` and
//! `governor_traits::Servo`, so the whole loop runs unchanged against
//! the in-memory rig. The `runner` module wraps a [`Governor`] in the
//! Starting/Running/Stopping state machine and owns the safety
//! guarantee: once torque has been enabled, it is disabled exactly
//! once on the way out, whatever path the run takes.

pub mod conversions;
pub mod error;
pub mod frame;
pub mod mapper;
pub mod mocks;
pub mod pid;
pub mod record;
pub mod rpm;
pub mod runner;
pub mod stats;
pub mod util;

pub use frame::{DecodeError, TelemetryFrame};
pub use mapper::CommandMapper;
pub use pid::{ControllerState, PidController, PidGains};
pub use record::{ActuatorStatus, CycleRecord, RecordReceiver, RecordSender, record_channel};
pub use stats::RunStatistics;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use governor_traits::clock::{Clock, MonotonicClock};
use governor_traits::{Servo, TelemetrySource};

use crate::error::{BuildError, GovernorError, Report, Result};

/// Speed-loop parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlCfg {
    pub setpoint_rpm: f64,
    pub gains: PidGains,
    /// Optional symmetric clamp on the PID integral accumulator.
    pub integral_limit: Option<f64>,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            setpoint_rpm: 210.0,
            gains: PidGains::default(),
            integral_limit: None,
        }
    }
}

/// Rotor geometry and sampling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorCfg {
    pub blade_count: u32,
    pub sample_period_s: f64,
}

impl Default for RotorCfg {
    fn default() -> Self {
        Self {
            blade_count: 3,
            sample_period_s: 1.0,
        }
    }
}

/// Valve travel in servo ticks; `min` is the closed stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionCfg {
    pub min: u16,
    pub max: u16,
}

impl Default for PositionCfg {
    fn default() -> Self {
        Self { min: 200, max: 512 }
    }
}

/// Loop timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Idle sleep between telemetry polls, in milliseconds.
    pub poll_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self { poll_ms: 10 }
    }
}

/// Map a boxed transport error onto the typed domain error.
///
/// With the `bus-errors` feature the hardware crate's error type is
/// downcast for an exact mapping; otherwise a string heuristic keeps
/// timeouts distinguishable.
fn map_bus_error_dyn(e: &(dyn std::error::Error + 'static)) -> GovernorError {
    #[cfg(feature = "bus-errors")]
    if let Some(bus) = e.downcast_ref::<governor_hardware::error::BusError>() {
        use governor_hardware::error::BusError;
        return match bus {
            BusError::Timeout => GovernorError::BusTimeout,
            BusError::DeviceError(code) => GovernorError::Device(*code),
            other => GovernorError::Bus(other.to_string()),
        };
    }
    let text = e.to_string();
    if text.to_lowercase().contains("timeout") {
        GovernorError::BusTimeout
    } else {
        GovernorError::Bus(text)
    }
}

/// What one telemetry line produced.
#[derive(Debug, Clone, Copy)]
pub enum CycleOutcome {
    /// The line decoded; a full cycle ran and produced this record.
    Completed(CycleRecord),
    /// The line failed to decode; the cycle was skipped.
    Skipped(DecodeError),
}

/// The closed-loop governor: one instance per run.
///
/// Owns both transports plus all per-run state. Dropping a governor
/// whose servo was ever energized disables torque, so an early return
/// or a panic cannot leave the valve powered.
pub struct Governor<T: TelemetrySource, V: Servo> {
    telemetry: T,
    servo: V,
    control: ControlCfg,
    rotor: RotorCfg,
    position: PositionCfg,
    timing: Timing,
    pid: PidController,
    mapper: CommandMapper,
    stats: RunStatistics,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    last_position: u16,
    torque_armed: bool,
    cycles: u64,
    skipped: u64,
    degraded: u64,
}

impl<T: TelemetrySource, V: Servo> std::fmt::Debug for Governor<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governor")
            .field("control", &self.control)
            .field("rotor", &self.rotor)
            .field("position", &self.position)
            .field("timing", &self.timing)
            .field("pid", &self.pid)
            .field("mapper", &self.mapper)
            .field("stats", &self.stats)
            .field("epoch", &self.epoch)
            .field("last_position", &self.last_position)
            .field("torque_armed", &self.torque_armed)
            .field("cycles", &self.cycles)
            .field("skipped", &self.skipped)
            .field("degraded", &self.degraded)
            .finish_non_exhaustive()
    }
}

/// Boxed-transport governor, as produced by [`GovernorBuilder`].
pub type BoxedGovernor = Governor<Box<dyn TelemetrySource>, Box<dyn Servo>>;

impl Governor<Box<dyn TelemetrySource>, Box<dyn Servo>> {
    pub fn builder() -> GovernorBuilder<Missing, Missing> {
        GovernorBuilder::default()
    }
}

impl<T: TelemetrySource, V: Servo> Governor<T, V> {
    /// Startup sequence: reset per-run state, energize the servo,
    /// command fully open, and seed the last-known position with one
    /// read. Any failure here is fatal to the run.
    pub fn begin(&mut self) -> Result<()> {
        self.epoch = self.clock.now();
        self.pid = PidController::new(self.control.gains, self.control.integral_limit);
        self.stats = RunStatistics::new();
        self.cycles = 0;
        self.skipped = 0;
        self.degraded = 0;

        // Arm before the first bus write: if startup dies partway the
        // shutdown path still clears whatever was energized.
        self.torque_armed = true;
        tracing::info!(
            setpoint_rpm = self.control.setpoint_rpm,
            open = self.position.max,
            "startup: energizing actuator"
        );
        self.servo
            .set_torque(true)
            .map_err(|e| Report::new(map_bus_error_dyn(e.as_ref())))
            .wrap_err("startup: enable torque")?;
        self.servo
            .write_goal_position(self.position.max)
            .map_err(|e| Report::new(map_bus_error_dyn(e.as_ref())))
            .wrap_err("startup: command initial position")?;
        let present = self
            .servo
            .read_present_position()
            .map_err(|e| Report::new(map_bus_error_dyn(e.as_ref())))
            .wrap_err("startup: read present position")?;
        self.last_position = present;
        Ok(())
    }

    /// Non-blocking poll for the next raw telemetry line.
    ///
    /// Transport failures are fatal: a dead sensor feed leaves the
    /// loop blind and the run must stop.
    pub fn poll_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.telemetry
            .poll_line()
            .map_err(|e| Report::new(GovernorError::Telemetry(e.to_string())))
            .wrap_err("telemetry poll")
    }

    /// Feed one raw telemetry line through a full control cycle.
    ///
    /// Decode failures skip the cycle entirely. Bus failures degrade
    /// it: the controller state still advances on the measurement, the
    /// record is still produced, and the loop keeps running.
    pub fn step_line(&mut self, line: &[u8]) -> CycleOutcome {
        let frame = match frame::decode(line) {
            Ok(frame) => frame,
            Err(err) => {
                self.skipped += 1;
                tracing::warn!(error = %err, "telemetry line discarded");
                return CycleOutcome::Skipped(err);
            }
        };

        let timestamp_ms = self.clock.ms_since(self.epoch);
        let rpm = rpm::estimate_rpm(
            frame.ir_pulse_count,
            self.rotor.blade_count,
            self.rotor.sample_period_s,
        );
        let output = self.pid.compute(self.control.setpoint_rpm, rpm);
        let goal = self.mapper.map_to_position(output);

        let mut ok = true;
        if let Err(e) = self.servo.write_goal_position(goal) {
            ok = false;
            tracing::warn!(
                error = %map_bus_error_dyn(e.as_ref()),
                goal,
                "goal write failed; cycle degraded"
            );
        }
        match self.servo.read_present_position() {
            Ok(position) => self.last_position = position,
            Err(e) => {
                ok = false;
                tracing::warn!(
                    error = %map_bus_error_dyn(e.as_ref()),
                    "position read failed; cycle degraded"
                );
            }
        }

        self.stats
            .observe(self.control.setpoint_rpm, rpm, timestamp_ms);
        self.cycles += 1;
        if !ok {
            self.degraded += 1;
        }

        let record = CycleRecord {
            timestamp_ms,
            rpm,
            pressure_bar: frame.pressure_bar,
            flow_rate: frame.flow_rate,
            goal_position: goal,
            actuator: ActuatorStatus {
                present_position: self.last_position,
                ok,
            },
            average_error: self.stats.average_error(),
        };
        tracing::debug!(
            t_ms = timestamp_ms,
            rpm,
            goal,
            present = self.last_position,
            ok,
            "cycle"
        );
        CycleOutcome::Completed(record)
    }

    /// Disable torque if it was ever enabled this run.
    ///
    /// Idempotent: the bus sees a single disable write no matter how
    /// often this is called, including from Drop.
    pub fn shutdown(&mut self) {
        if !self.torque_armed {
            return;
        }
        self.torque_armed = false;
        match self.servo.set_torque(false) {
            Ok(()) => tracing::info!("torque disabled"),
            Err(e) => {
                tracing::warn!(
                    error = %map_bus_error_dyn(e.as_ref()),
                    "torque disable failed during shutdown"
                );
            }
        }
    }

    pub fn idle(&self, d: Duration) {
        self.clock.sleep(d);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn skipped_cycles(&self) -> u64 {
        self.skipped
    }

    pub fn degraded_cycles(&self) -> u64 {
        self.degraded
    }

    pub fn average_error(&self) -> f64 {
        self.stats.average_error()
    }

    pub fn window_start_ms(&self) -> Option<u64> {
        self.stats.window_start_ms()
    }

    /// Last position the bus actually delivered.
    pub fn last_position(&self) -> u16 {
        self.last_position
    }

    pub fn controller_state(&self) -> ControllerState {
        self.pid.state()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn setpoint_rpm(&self) -> f64 {
        self.control.setpoint_rpm
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }
}

impl<T: TelemetrySource, V: Servo> Drop for Governor<T, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build a governor over concrete transports after validating the
/// parameters. `clock` defaults to the real monotonic clock.
pub fn build_governor<T: TelemetrySource, V: Servo>(
    telemetry: T,
    servo: V,
    control: ControlCfg,
    rotor: RotorCfg,
    position: PositionCfg,
    timing: Timing,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<Governor<T, V>> {
    validate_control(&control)?;
    validate_rotor(&rotor)?;
    let mapper = CommandMapper::new(control.setpoint_rpm, position.min, position.max)
        .map_err(Report::new)?;
    let pid = PidController::new(control.gains, control.integral_limit);
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(clock) => Arc::from(clock),
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();
    Ok(Governor {
        telemetry,
        servo,
        last_position: position.max,
        control,
        rotor,
        position,
        timing,
        pid,
        mapper,
        stats: RunStatistics::new(),
        clock,
        epoch,
        torque_armed: false,
        cycles: 0,
        skipped: 0,
        degraded: 0,
    })
}

fn validate_control(control: &ControlCfg) -> Result<()> {
    if !(control.setpoint_rpm.is_finite() && control.setpoint_rpm > 0.0) {
        return Err(Report::new(BuildError::InvalidSetpoint(
            "setpoint must be finite and > 0",
        )));
    }
    let PidGains { kp, ki, kd } = control.gains;
    if ![kp, ki, kd].iter().all(|gain| gain.is_finite()) {
        return Err(Report::new(BuildError::InvalidConfig(
            "pid gains must be finite",
        )));
    }
    if let Some(limit) = control.integral_limit
        && !(limit.is_finite() && limit > 0.0)
    {
        return Err(Report::new(BuildError::InvalidConfig(
            "integral limit must be finite and > 0",
        )));
    }
    Ok(())
}

fn validate_rotor(rotor: &RotorCfg) -> Result<()> {
    if rotor.blade_count == 0 {
        return Err(Report::new(BuildError::InvalidConfig(
            "blade count must be >= 1",
        )));
    }
    if !(rotor.sample_period_s.is_finite() && rotor.sample_period_s > 0.0) {
        return Err(Report::new(BuildError::InvalidConfig(
            "sample period must be finite and > 0",
        )));
    }
    Ok(())
}

/// Type-state marker: part not yet provided.
pub struct Missing;
/// Type-state marker: part provided.
pub struct Set;

/// Builder for a boxed governor.
///
/// The two transports are tracked in the type, so `build` only exists
/// once both are present. `try_build` is available in any state and
/// reports what is missing as a typed [`BuildError`], which keeps
/// config-driven call sites honest without panicking.
pub struct GovernorBuilder<Tm, Sv> {
    telemetry: Option<Box<dyn TelemetrySource>>,
    servo: Option<Box<dyn Servo>>,
    control: Option<ControlCfg>,
    rotor: Option<RotorCfg>,
    position: Option<PositionCfg>,
    timing: Option<Timing>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    _telemetry: PhantomData<Tm>,
    _servo: PhantomData<Sv>,
}

impl Default for GovernorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            telemetry: None,
            servo: None,
            control: None,
            rotor: None,
            position: None,
            timing: None,
            clock: None,
            _telemetry: PhantomData,
            _servo: PhantomData,
        }
    }
}

impl GovernorBuilder<Missing, Missing> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<Sv> GovernorBuilder<Missing, Sv> {
    pub fn with_telemetry(
        self,
        telemetry: impl TelemetrySource + 'static,
    ) -> GovernorBuilder<Set, Sv> {
        GovernorBuilder {
            telemetry: Some(Box::new(telemetry)),
            servo: self.servo,
            control: self.control,
            rotor: self.rotor,
            position: self.position,
            timing: self.timing,
            clock: self.clock,
            _telemetry: PhantomData,
            _servo: PhantomData,
        }
    }
}

impl<Tm> GovernorBuilder<Tm, Missing> {
    pub fn with_servo(self, servo: impl Servo + 'static) -> GovernorBuilder<Tm, Set> {
        GovernorBuilder {
            telemetry: self.telemetry,
            servo: Some(Box::new(servo)),
            control: self.control,
            rotor: self.rotor,
            position: self.position,
            timing: self.timing,
            clock: self.clock,
            _telemetry: PhantomData,
            _servo: PhantomData,
        }
    }
}

impl<Tm, Sv> GovernorBuilder<Tm, Sv> {
    #[must_use]
    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    #[must_use]
    pub fn with_rotor(mut self, rotor: RotorCfg) -> Self {
        self.rotor = Some(rotor);
        self
    }

    #[must_use]
    pub fn with_position(mut self, position: PositionCfg) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Override the clock, e.g. with a deterministic one in tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build regardless of type-state; missing transports come back as
    /// typed errors.
    pub fn try_build(self) -> Result<BoxedGovernor> {
        let telemetry = self
            .telemetry
            .ok_or_else(|| Report::new(BuildError::MissingTelemetry))?;
        let servo = self
            .servo
            .ok_or_else(|| Report::new(BuildError::MissingServo))?;
        build_governor(
            telemetry,
            servo,
            self.control.unwrap_or_default(),
            self.rotor.unwrap_or_default(),
            self.position.unwrap_or_default(),
            self.timing.unwrap_or_default(),
            self.clock,
        )
    }
}

impl GovernorBuilder<Set, Set> {
    pub fn build(self) -> Result<BoxedGovernor> {
        self.try_build()
    }
}

#[cfg(test)]
mod map_bus_error_tests {
    use super::*;

    #[test]
    fn string_heuristic_classifies_timeouts() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            "read Timeout after 100ms".to_string().into();
        assert!(matches!(
            map_bus_error_dyn(err.as_ref()),
            GovernorError::BusTimeout
        ));

        let err: Box<dyn std::error::Error + Send + Sync> = "wire unplugged".to_string().into();
        assert!(matches!(
            map_bus_error_dyn(err.as_ref()),
            GovernorError::Bus(_)
        ));
    }

    #[cfg(feature = "bus-errors")]
    #[test]
    fn typed_bus_errors_map_exactly() {
        use governor_hardware::error::BusError;

        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(BusError::Timeout);
        assert!(matches!(
            map_bus_error_dyn(err.as_ref()),
            GovernorError::BusTimeout
        ));

        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(BusError::DeviceError(0x24));
        assert!(matches!(
            map_bus_error_dyn(err.as_ref()),
            GovernorError::Device(0x24)
        ));

        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(BusError::CommFailure("framing".into()));
        assert!(matches!(
            map_bus_error_dyn(err.as_ref()),
            GovernorError::Bus(_)
        ));
    }
}
