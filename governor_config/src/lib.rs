#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the rotor speed governor.
//!
//! Deserialized from TOML and validated before a run starts. Every
//! section defaults to the reference rig: a three-blade rotor sampled
//! once per second, held at 210 RPM by a needle valve actuated over
//! positions 200 (closed) to 512 (fully open).
use serde::Deserialize;

/// Sensor feed: the microcontroller streaming JSON frames over serial.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    pub port: String,
    pub baud: u32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 19_200,
        }
    }
}

/// Actuator bus: the half-duplex servo link.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bus {
    pub port: String,
    pub baud: u32,
    pub device_id: u8,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".to_string(),
            baud: 1_000_000,
            device_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Control {
    pub setpoint_rpm: f64,
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Optional symmetric clamp on the integral accumulator. Absent
    /// means the accumulator is unbounded, matching the plain textbook
    /// controller.
    pub integral_limit: Option<f64>,
}

impl Default for Control {
    fn default() -> Self {
        Self {
            setpoint_rpm: 210.0,
            kp: 0.1,
            ki: 0.02,
            kd: 0.0003,
            integral_limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Rotor {
    pub blade_count: u32,
    /// Length of the pulse-counting window, in seconds.
    pub sample_period_s: f64,
}

impl Default for Rotor {
    fn default() -> Self {
        Self {
            blade_count: 3,
            sample_period_s: 1.0,
        }
    }
}

/// Valve travel in raw servo ticks. `min` is fully closed.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Position {
    pub min: u16,
    pub max: u16,
}

impl Default for Position {
    fn default() -> Self {
        Self { min: 200, max: 512 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Deadline for one servo register exchange (ms).
    pub bus_ms: u64,
    /// Idle sleep between telemetry polls (ms).
    pub poll_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            bus_ms: 100,
            poll_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Run {
    /// Wall-clock run length in seconds; 0 runs until interrupted.
    pub duration_s: u64,
}

impl Default for Run {
    fn default() -> Self {
        Self { duration_s: 60 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Report {
    /// Trailing window used for the settled-error figure, in seconds.
    pub settle_window_s: u64,
}

impl Default for Report {
    fn default() -> Self {
        Self { settle_window_s: 20 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Optional JSON log file; rotation is one of "daily", "hourly", "never".
    pub file: Option<String>,
    pub rotation: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telemetry: Telemetry,
    pub bus: Bus,
    pub control: Control,
    pub rotor: Rotor,
    pub position: Position,
    pub timeouts: Timeouts,
    pub run: Run,
    pub report: Report,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        if !(self.control.setpoint_rpm.is_finite() && self.control.setpoint_rpm > 0.0) {
            eyre::bail!("control.setpoint_rpm must be finite and > 0");
        }
        for (name, gain) in [
            ("kp", self.control.kp),
            ("ki", self.control.ki),
            ("kd", self.control.kd),
        ] {
            if !(gain.is_finite() && gain >= 0.0) {
                eyre::bail!("control.{name} must be finite and >= 0");
            }
        }
        if let Some(limit) = self.control.integral_limit
            && !(limit.is_finite() && limit > 0.0)
        {
            eyre::bail!("control.integral_limit must be finite and > 0 when set");
        }
        if self.rotor.blade_count == 0 {
            eyre::bail!("rotor.blade_count must be >= 1");
        }
        if !(self.rotor.sample_period_s.is_finite() && self.rotor.sample_period_s > 0.0) {
            eyre::bail!("rotor.sample_period_s must be finite and > 0");
        }
        if self.position.min >= self.position.max {
            eyre::bail!("position.min must be below position.max");
        }
        if self.timeouts.bus_ms == 0 || self.timeouts.bus_ms > 1_000 {
            eyre::bail!("timeouts.bus_ms must be in 1..=1000");
        }
        if self.timeouts.poll_ms == 0 {
            eyre::bail!("timeouts.poll_ms must be >= 1");
        }
        if self.report.settle_window_s == 0 {
            eyre::bail!("report.settle_window_s must be >= 1");
        }
        if self.telemetry.baud == 0 {
            eyre::bail!("telemetry.baud must be > 0");
        }
        if self.bus.baud == 0 {
            eyre::bail!("bus.baud must be > 0");
        }
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "daily" | "hourly" | "never")
        {
            eyre::bail!("logging.rotation must be one of daily, hourly, never");
        }
        Ok(())
    }
}
