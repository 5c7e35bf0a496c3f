use governor_core::error::BuildError;
use governor_core::mocks::{RecordingServo, ScriptedTelemetry};
use governor_core::{ControlCfg, Governor, PidGains, PositionCfg, RotorCfg};
use rstest::rstest;

fn idle_telemetry() -> ScriptedTelemetry {
    ScriptedTelemetry::new(Vec::<Vec<u8>>::new())
}

#[rstest]
fn builder_missing_telemetry_yields_typed_build_error() {
    let err = Governor::builder()
        // missing with_telemetry()
        .try_build()
        .expect_err("should fail with MissingTelemetry");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingTelemetry) => {}
        other => panic!("expected MissingTelemetry, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_servo_yields_typed_build_error() {
    let err = Governor::builder()
        .with_telemetry(idle_telemetry())
        // missing with_servo()
        .try_build()
        .expect_err("should fail with MissingServo");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingServo) => {}
        other => panic!("expected MissingServo, got: {other:?}"),
    }
}

#[test]
fn full_builder_produces_a_working_governor() {
    let governor = Governor::builder()
        .with_telemetry(idle_telemetry())
        .with_servo(RecordingServo::new())
        .build()
        .expect("defaults are valid");
    assert_eq!(governor.setpoint_rpm(), 210.0);
    assert_eq!(governor.timing().poll_ms, 10);
    assert_eq!(governor.last_position(), 512);
}

#[rstest]
#[case::zero(0.0)]
#[case::negative(-50.0)]
#[case::nan(f64::NAN)]
#[case::infinite(f64::INFINITY)]
fn bad_setpoints_are_rejected(#[case] setpoint_rpm: f64) {
    let err = Governor::builder()
        .with_telemetry(idle_telemetry())
        .with_servo(RecordingServo::new())
        .with_control(ControlCfg {
            setpoint_rpm,
            ..ControlCfg::default()
        })
        .build()
        .expect_err("setpoint must be rejected");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidSetpoint(_)) => {}
        other => panic!("expected InvalidSetpoint, got: {other:?}"),
    }
}

#[rstest]
#[case::nan_gain(ControlCfg {
    gains: PidGains { kp: f64::NAN, ..PidGains::default() },
    ..ControlCfg::default()
})]
#[case::zero_integral_limit(ControlCfg {
    integral_limit: Some(0.0),
    ..ControlCfg::default()
})]
#[case::infinite_integral_limit(ControlCfg {
    integral_limit: Some(f64::INFINITY),
    ..ControlCfg::default()
})]
fn bad_controller_parameters_are_rejected(#[case] control: ControlCfg) {
    let err = Governor::builder()
        .with_telemetry(idle_telemetry())
        .with_servo(RecordingServo::new())
        .with_control(control)
        .build()
        .expect_err("controller parameters must be rejected");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
#[case::inverted(512, 200)]
#[case::empty(200, 200)]
fn unordered_position_bounds_are_rejected(#[case] min: u16, #[case] max: u16) {
    let err = Governor::builder()
        .with_telemetry(idle_telemetry())
        .with_servo(RecordingServo::new())
        .with_position(PositionCfg { min, max })
        .build()
        .expect_err("bounds must be ordered");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidBounds(_)) => {}
        other => panic!("expected InvalidBounds, got: {other:?}"),
    }
}

#[test]
fn zero_blade_rotor_is_rejected() {
    let err = Governor::builder()
        .with_telemetry(idle_telemetry())
        .with_servo(RecordingServo::new())
        .with_rotor(RotorCfg {
            blade_count: 0,
            ..RotorCfg::default()
        })
        .build()
        .expect_err("blade count must be rejected");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(_)) => {}
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}
