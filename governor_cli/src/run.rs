//! Transport assembly and the `run`/`self-check` entry points.

use std::path::PathBuf;
use std::time::Duration;

use eyre::WrapErr;
use governor_config::Config;
use governor_core::error::GovernorError;
use governor_core::record::record_channel;
use governor_core::runner::{self, RunParams, StopHandle, StopPredicate};
use governor_core::util::deadline_predicate;
use governor_core::ControlCfg;

use crate::cli::RtLock;
use crate::report::{self, ReportSummary};
use crate::rt::setup_rt_once;

// Record stream capacity; the sink drains far faster than one cycle
// per sample window, so this never fills in practice.
const RECORD_CAPACITY: usize = 256;

pub struct RunArgs {
    pub duration_s: Option<u64>,
    pub setpoint_rpm: Option<f64>,
    pub csv: Option<PathBuf>,
    pub rt: bool,
    pub rt_prio: Option<i32>,
    pub rt_lock: Option<RtLock>,
}

/// Figures printed at the end of a run.
pub struct RunOutcome {
    pub cycles: u64,
    pub skipped: u64,
    pub degraded: u64,
    pub average_error: f64,
    pub settled_error: f64,
    pub elapsed_ms: u64,
    pub csv: Option<PathBuf>,
}

#[cfg(feature = "hardware")]
fn open_rig(
    cfg: &Config,
) -> eyre::Result<(
    governor_hardware::serial::SerialTelemetry,
    governor_hardware::ax12::Ax12Client<governor_hardware::serial::SerialLink>,
)> {
    let telemetry =
        governor_hardware::serial::SerialTelemetry::open(&cfg.telemetry.port, cfg.telemetry.baud)
            .wrap_err_with(|| format!("open telemetry feed {}", cfg.telemetry.port))?;
    let link = governor_hardware::serial::SerialLink::open(&cfg.bus.port, cfg.bus.baud)
        .wrap_err_with(|| format!("open servo bus {}", cfg.bus.port))?;
    let servo = governor_hardware::ax12::Ax12Client::new(
        link,
        cfg.bus.device_id,
        Duration::from_millis(cfg.timeouts.bus_ms),
    );
    Ok((telemetry, servo))
}

#[cfg(not(feature = "hardware"))]
fn open_rig(
    cfg: &Config,
) -> eyre::Result<(
    governor_hardware::SimulatedTelemetry,
    governor_hardware::SimulatedServo,
)> {
    // The sim emits one frame per sample window, like the real sensor.
    let interval = Duration::try_from_secs_f64(cfg.rotor.sample_period_s)
        .unwrap_or(Duration::from_secs(1));
    tracing::info!("no hardware feature; using the simulated rig");
    Ok((
        governor_hardware::SimulatedTelemetry::new(interval),
        governor_hardware::SimulatedServo::new(),
    ))
}

pub fn run(cfg: &Config, args: RunArgs) -> eyre::Result<RunOutcome> {
    setup_rt_once(args.rt, args.rt_prio, args.rt_lock.unwrap_or_else(RtLock::os_default));

    let mut control = ControlCfg::from(&cfg.control);
    if let Some(setpoint_rpm) = args.setpoint_rpm {
        control.setpoint_rpm = setpoint_rpm;
    }
    let params = RunParams {
        control,
        rotor: (&cfg.rotor).into(),
        position: (&cfg.position).into(),
        timing: (&cfg.timeouts).into(),
    };
    let duration_s = args.duration_s.unwrap_or(cfg.run.duration_s);

    let stop = StopHandle::new();
    let sigint = stop.clone();
    ctrlc::set_handler(move || {
        tracing::info!("interrupt received; stopping");
        sigint.request_stop();
    })
    .wrap_err("install interrupt handler")?;

    let stop_when = (duration_s > 0).then(|| -> StopPredicate {
        Box::new(deadline_predicate(Duration::from_secs(duration_s)))
    });

    let (tx, rx) = record_channel(RECORD_CAPACITY);
    let sink = report::spawn_sink(rx, args.csv.clone());

    let (telemetry, servo) = open_rig(cfg)?;
    let result = runner::run(telemetry, servo, &stop, stop_when, Some(tx), params);

    // The loop has dropped its sender by now, so the sink is draining
    // its last records and will exit.
    let report: ReportSummary = sink.finish()?;
    let summary = result?;

    let settled_error = report::settle_average(
        &report.records,
        params.control.setpoint_rpm,
        cfg.report.settle_window_s.saturating_mul(1000),
    );
    Ok(RunOutcome {
        cycles: summary.cycles,
        skipped: summary.skipped,
        degraded: summary.degraded,
        average_error: summary.average_error,
        settled_error,
        elapsed_ms: summary.elapsed_ms,
        csv: args.csv,
    })
}

/// Open both transports and exchange one round with each.
pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    use governor_traits::{Servo, TelemetrySource};

    let (mut telemetry, mut servo) = open_rig(cfg)?;

    let present = servo
        .read_present_position()
        .map_err(|e| eyre::Report::new(GovernorError::Bus(e.to_string())))
        .wrap_err("actuator bus check failed")?;
    tracing::info!(present, "actuator bus ok");

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        let line = telemetry
            .poll_line()
            .map_err(|e| eyre::Report::new(GovernorError::Telemetry(e.to_string())))
            .wrap_err("telemetry feed check failed")?;
        match line {
            Some(line) => match governor_core::frame::decode(&line) {
                Ok(frame) => {
                    tracing::info!(pulses = frame.ir_pulse_count, "telemetry feed ok");
                    break;
                }
                // a torn first line is normal right after opening
                Err(err) => tracing::debug!(error = %err, "discarding partial line"),
            },
            None => {
                if std::time::Instant::now() >= deadline {
                    return Err(eyre::Report::new(GovernorError::Telemetry(
                        "no frame within 2s".to_string(),
                    ))
                    .wrap_err("telemetry feed check failed"));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    println!("self-check ok: telemetry and actuator bus responding");
    Ok(())
}
