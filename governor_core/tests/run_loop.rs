//! End-to-end runs through `runner::run`: stop paths, record delivery,
//! and the shutdown bracket around every exit.

use std::thread;
use std::time::Duration;

use governor_core::Timing;
use governor_core::error::GovernorError;
use governor_core::mocks::{FailingTelemetry, RecordingServo, ScriptedTelemetry, ServoCall};
use governor_core::record::record_channel;
use governor_core::runner::{RunParams, StopHandle, run};
use governor_core::util::deadline_predicate;

fn fast_params() -> RunParams {
    RunParams {
        timing: Timing { poll_ms: 1 },
        ..RunParams::default()
    }
}

fn no_lines() -> ScriptedTelemetry {
    ScriptedTelemetry::new(Vec::<Vec<u8>>::new())
}

#[test]
fn deadline_stops_a_run_and_reports_counts() {
    let lines = [
        br#"{"pressure_bar":1.0,"ir_pulse_count":0,"flow_rate":0.0}"#.to_vec(),
        br#"{"pressure_bar":1.6,"ir_pulse_count":10,"flow_rate":3.1}"#.to_vec(),
        b"garbage".to_vec(),
        br#"{"pressure_bar":1.7,"ir_pulse_count":11,"flow_rate":3.4}"#.to_vec(),
    ];
    let servo = RecordingServo::new();
    let log = servo.call_log();
    let (tx, rx) = record_channel(16);
    let stop = StopHandle::new();

    let summary = run(
        ScriptedTelemetry::new(lines),
        servo,
        &stop,
        Some(Box::new(deadline_predicate(Duration::from_millis(50)))),
        Some(tx),
        fast_params(),
    )
    .expect("run completes");

    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.degraded, 0);
    // two samples in the window, both 10 RPM off the 210 setpoint
    assert_eq!(summary.average_error, 10.0);
    assert!(summary.window_start_ms.is_some());

    let records: Vec<_> = rx.try_iter().collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].goal_position, 238);
    assert!(records.iter().all(|record| record.actuator.ok));

    let calls = log.lock().expect("log lock");
    assert_eq!(calls.first(), Some(&ServoCall::Torque(true)));
    assert_eq!(calls.last(), Some(&ServoCall::Torque(false)));
    let disables = calls
        .iter()
        .filter(|call| **call == ServoCall::Torque(false))
        .count();
    assert_eq!(disables, 1);
}

#[test]
fn stop_handle_halts_an_idle_run() {
    let stop = StopHandle::new();
    let trip = stop.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        trip.request_stop();
    });

    let summary = run(
        no_lines(),
        RecordingServo::new(),
        &stop,
        None,
        None,
        fast_params(),
    )
    .expect("run stops cleanly");
    stopper.join().expect("stopper thread");

    assert_eq!(summary.cycles, 0);
    assert!(summary.average_error.is_infinite());
    assert!(summary.elapsed_ms >= 20);
}

#[test]
fn pre_tripped_stop_still_brackets_with_startup_and_shutdown() {
    let stop = StopHandle::new();
    stop.request_stop();
    let servo = RecordingServo::new();
    let log = servo.call_log();

    let summary = run(no_lines(), servo, &stop, None, None, fast_params())
        .expect("run exits at once");
    assert_eq!(summary.cycles, 0);

    let calls = log.lock().expect("log lock");
    assert_eq!(
        *calls,
        vec![
            ServoCall::Torque(true),
            ServoCall::Goal(512),
            ServoCall::ReadPresent,
            ServoCall::Torque(false),
        ]
    );
}

#[test]
fn dead_telemetry_aborts_with_a_typed_error() {
    let servo = RecordingServo::new();
    let log = servo.call_log();
    let stop = StopHandle::new();

    let err = run(
        FailingTelemetry::new(0),
        servo,
        &stop,
        None,
        None,
        fast_params(),
    )
    .expect_err("transport failure is fatal");
    match err.downcast_ref::<GovernorError>() {
        Some(GovernorError::Telemetry(_)) => {}
        other => panic!("expected Telemetry, got: {other:?}"),
    }

    let calls = log.lock().expect("log lock");
    assert_eq!(calls.last(), Some(&ServoCall::Torque(false)));
}

#[test]
fn startup_failure_aborts_and_still_clears_torque() {
    let mut servo = RecordingServo::new();
    servo.fail_torque = true;
    let log = servo.call_log();
    let stop = StopHandle::new();

    let err = run(no_lines(), servo, &stop, None, None, fast_params())
        .expect_err("startup failure is fatal");
    assert!(err.to_string().contains("startup failed"));

    let calls = log.lock().expect("log lock");
    assert_eq!(
        *calls,
        vec![ServoCall::Torque(true), ServoCall::Torque(false)]
    );
}

#[test]
fn invalid_params_fail_before_any_bus_traffic() {
    let mut params = fast_params();
    params.control.setpoint_rpm = -1.0;
    let servo = RecordingServo::new();
    let log = servo.call_log();
    let stop = StopHandle::new();

    run(no_lines(), servo, &stop, None, None, params).expect_err("bad setpoint must fail");
    assert!(log.lock().expect("log lock").is_empty());
}
