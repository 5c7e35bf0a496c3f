//! Quick Start Example
//!
//! Drives the full speed-control loop against the in-memory rig for a
//! few seconds and prints each cycle record as it arrives.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p governor_core --example simulated_rig
//! ```
//!
//! The simulated sensor spins the rotor up to hover around the default
//! 210 RPM setpoint, so the printed goal positions settle mid-travel.

use std::thread;
use std::time::Duration;

use governor_core::record::record_channel;
use governor_core::runner::{RunParams, StopHandle, run};
use governor_core::util::deadline_predicate;
use governor_hardware::{SimulatedServo, SimulatedTelemetry};

fn main() -> Result<(), eyre::Report> {
    // One frame every 100 ms keeps the demo short; each frame still
    // reports pulses for a one-second window, matching the defaults.
    let telemetry = SimulatedTelemetry::new(Duration::from_millis(100));
    let servo = SimulatedServo::new();

    let (tx, rx) = record_channel(64);
    let printer = thread::spawn(move || {
        for record in rx.iter() {
            println!(
                "t={:6} ms  rpm={:6.1}  goal={:3}  present={:4}  avg_err={:6.2}",
                record.timestamp_ms,
                record.rpm,
                record.goal_position,
                record.actuator.present_position,
                record.average_error,
            );
        }
    });

    let stop = StopHandle::new();
    let summary = run(
        telemetry,
        servo,
        &stop,
        Some(Box::new(deadline_predicate(Duration::from_secs(3)))),
        Some(tx),
        RunParams::default(),
    )?;
    let _ = printer.join();

    println!(
        "run finished: {} cycles, {} skipped, {} degraded, average error {:.2} RPM",
        summary.cycles, summary.skipped, summary.degraded, summary.average_error
    );
    Ok(())
}
