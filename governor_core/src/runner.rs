//! The run loop: a state machine wrapped around a [`Governor`].
//!
//! Starting -> Running -> Stopping -> Stopped. A startup failure
//! aborts before Running is ever entered; inside Running only a dead
//! telemetry transport is fatal, everything else degrades or skips a
//! single cycle. Stop requests are level-triggered and checked once
//! per iteration, so an in-flight bus exchange always completes before
//! the loop winds down. The torque-disable shutdown runs on every exit
//! path, exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use governor_traits::{Servo, TelemetrySource};

use crate::error::Result;
use crate::record::{CycleRecord, RecordSender};
use crate::util::poll_interval;
use crate::{
    ControlCfg, CycleOutcome, Governor, PositionCfg, RotorCfg, Timing, build_governor,
};

/// Clonable stop flag, safe to trip from a signal handler or another
/// thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Additional stop condition polled each iteration, e.g. a wall-clock
/// deadline.
pub type StopPredicate = Box<dyn FnMut() -> bool + Send>;

/// Everything a run needs besides the transports.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunParams {
    pub control: ControlCfg,
    pub rotor: RotorCfg,
    pub position: PositionCfg,
    pub timing: Timing,
}

/// Counters and figures from a clean run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Completed cycles (records produced), degraded ones included.
    pub cycles: u64,
    /// Telemetry lines that failed to decode.
    pub skipped: u64,
    /// Cycles whose bus write or read failed.
    pub degraded: u64,
    /// Mean absolute speed error since spin-up; `+inf` if the rotor
    /// never moved.
    pub average_error: f64,
    /// When the rotor first reported non-zero speed, if ever.
    pub window_start_ms: Option<u64>,
    pub elapsed_ms: u64,
}

/// Drive a full run over the given transports.
///
/// Returns the summary on a clean stop. On error the shutdown sequence
/// has already executed; the summary is traded for the error report.
pub fn run<T: TelemetrySource, V: Servo>(
    telemetry: T,
    servo: V,
    stop: &StopHandle,
    stop_when: Option<StopPredicate>,
    records: Option<RecordSender>,
    params: RunParams,
) -> Result<RunSummary> {
    let mut governor = build_governor(
        telemetry,
        servo,
        params.control,
        params.rotor,
        params.position,
        params.timing,
        None,
    )?;
    tracing::info!(
        setpoint_rpm = params.control.setpoint_rpm,
        poll_ms = params.timing.poll_ms,
        "run starting"
    );

    let outcome = drive(&mut governor, stop, stop_when, records);
    governor.shutdown();

    let summary = RunSummary {
        cycles: governor.cycles(),
        skipped: governor.skipped_cycles(),
        degraded: governor.degraded_cycles(),
        average_error: governor.average_error(),
        window_start_ms: governor.window_start_ms(),
        elapsed_ms: governor.elapsed_ms(),
    };
    match outcome {
        Ok(()) => {
            tracing::info!(
                cycles = summary.cycles,
                skipped = summary.skipped,
                degraded = summary.degraded,
                average_error = summary.average_error,
                elapsed_ms = summary.elapsed_ms,
                "run complete"
            );
            Ok(summary)
        }
        Err(e) => {
            tracing::error!(error = %e, cycles = summary.cycles, "run aborted");
            Err(e)
        }
    }
}

fn drive<T: TelemetrySource, V: Servo>(
    governor: &mut Governor<T, V>,
    stop: &StopHandle,
    mut stop_when: Option<StopPredicate>,
    records: Option<RecordSender>,
) -> Result<()> {
    governor.begin().wrap_err("startup failed")?;
    let poll = poll_interval(governor.timing().poll_ms);
    let mut stream = RecordStream::new(records);

    loop {
        if stop.stop_requested() {
            tracing::info!("stop requested");
            return Ok(());
        }
        if let Some(predicate) = stop_when.as_mut()
            && predicate()
        {
            tracing::info!("stop condition met");
            return Ok(());
        }

        // Drain every complete line before sleeping; the sensor may
        // have buffered several frames while we were busy.
        let mut advanced = false;
        while let Some(line) = governor.poll_line()? {
            advanced = true;
            if let CycleOutcome::Completed(record) = governor.step_line(&line) {
                stream.publish(record);
            }
        }
        if !advanced {
            governor.idle(poll);
        }
    }
}

/// Record sender that never blocks or fails the loop.
struct RecordStream {
    sender: Option<RecordSender>,
}

impl RecordStream {
    fn new(sender: Option<RecordSender>) -> Self {
        Self { sender }
    }

    fn publish(&mut self, record: CycleRecord) {
        let Some(sender) = &self.sender else { return };
        match sender.try_send(record) {
            Ok(()) => {}
            Err(crossbeam_channel::TrySendError::Full(_)) => {
                tracing::debug!(t_ms = record.timestamp_ms, "record stream full, sample dropped");
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                tracing::debug!("record consumer gone, stream closed");
                self.sender = None;
            }
        }
    }
}
