//! Run reporting: CSV export of cycle records and the settled-error
//! figure computed after the run.

use std::path::PathBuf;
use std::thread::JoinHandle;

use eyre::WrapErr;
use governor_core::record::{CycleRecord, RecordReceiver};

const CSV_HEADER: [&str; 8] = [
    "timestamp_ms",
    "rpm",
    "pressure_bar",
    "flow_rate",
    "goal_position",
    "present_position",
    "actuator_ok",
    "average_error",
];

// Progress line cadence, in records.
const PROGRESS_EVERY: usize = 10;

/// Everything the sink collected by the time the stream closed.
pub struct ReportSummary {
    pub records: Vec<CycleRecord>,
}

/// Consumer thread for the record stream.
///
/// Runs until the control loop drops its sender, then hands back the
/// full history. Keeping the consumer off the control thread means a
/// slow disk stalls the CSV, never the loop.
pub struct ReportSink {
    handle: JoinHandle<eyre::Result<ReportSummary>>,
}

pub fn spawn_sink(rx: RecordReceiver, csv_path: Option<PathBuf>) -> ReportSink {
    let handle = std::thread::spawn(move || drain(rx, csv_path));
    ReportSink { handle }
}

impl ReportSink {
    /// Wait for the stream to close and collect the history. Call only
    /// after the control loop has finished, or this blocks.
    pub fn finish(self) -> eyre::Result<ReportSummary> {
        self.handle
            .join()
            .map_err(|_| eyre::eyre!("report sink panicked"))?
    }
}

fn drain(rx: RecordReceiver, csv_path: Option<PathBuf>) -> eyre::Result<ReportSummary> {
    let mut writer = match &csv_path {
        Some(path) => {
            let mut w = csv::Writer::from_path(path)
                .wrap_err_with(|| format!("open csv {}", path.display()))?;
            w.write_record(CSV_HEADER)
                .wrap_err("write csv header")?;
            Some(w)
        }
        None => None,
    };

    let mut records = Vec::new();
    for record in rx.iter() {
        if let Some(w) = writer.as_mut() {
            w.write_record(&csv_row(&record)).wrap_err("write csv row")?;
        }
        if records.len() % PROGRESS_EVERY == 0 {
            tracing::info!(
                t_ms = record.timestamp_ms,
                rpm = record.rpm,
                goal = record.goal_position,
                average_error = record.average_error,
                "progress"
            );
        }
        records.push(record);
    }
    if let Some(w) = writer.as_mut() {
        w.flush().wrap_err("flush csv")?;
    }
    Ok(ReportSummary { records })
}

fn csv_row(record: &CycleRecord) -> [String; 8] {
    [
        record.timestamp_ms.to_string(),
        format!("{:.3}", record.rpm),
        format!("{:.3}", record.pressure_bar),
        format!("{:.3}", record.flow_rate),
        record.goal_position.to_string(),
        record.actuator.present_position.to_string(),
        record.actuator.ok.to_string(),
        format!("{:.3}", record.average_error),
    ]
}

/// Mean absolute speed error over the trailing settle window.
///
/// The window reaches back `window_ms` from the final record but never
/// before spin-up, so a short run is judged on what it had. Returns
/// `+inf` when the rotor never reported a non-zero speed.
pub fn settle_average(records: &[CycleRecord], setpoint_rpm: f64, window_ms: u64) -> f64 {
    let Some(last) = records.last() else {
        return f64::INFINITY;
    };
    let Some(first_spin) = records.iter().find(|r| r.rpm > 0.0) else {
        return f64::INFINITY;
    };
    let window_start = last
        .timestamp_ms
        .saturating_sub(window_ms)
        .max(first_spin.timestamp_ms);

    let mut sum = 0.0;
    let mut samples = 0u64;
    for record in records {
        if record.timestamp_ms >= window_start {
            sum += (setpoint_rpm - record.rpm).abs();
            samples += 1;
        }
    }
    if samples == 0 {
        f64::INFINITY
    } else {
        sum / samples as f64
    }
}
