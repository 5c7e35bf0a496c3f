//! Behavior of the in-memory rig used when no hardware is attached.

use std::time::Duration;

use governor_hardware::{SimulatedServo, SimulatedTelemetry};
use governor_traits::{Servo, TelemetrySource};
use rstest::rstest;

#[test]
fn servo_holds_still_with_torque_off() {
    let mut servo = SimulatedServo::new();
    let before = servo.present();
    servo.write_goal_position(512).expect("goal write");
    assert_eq!(servo.present(), before);
}

#[test]
fn servo_slews_toward_goal_with_torque_on() {
    let mut servo = SimulatedServo::new();
    servo.set_torque(true).expect("torque on");
    let start = servo.present();
    servo.write_goal_position(512).expect("goal write");
    let after_one = servo.present();
    assert!(after_one > start);
    assert!(after_one <= 512);

    for _ in 0..20 {
        servo.write_goal_position(512).expect("goal write");
    }
    assert_eq!(servo.present(), 512);
    assert_eq!(servo.read_present_position().expect("read"), 512);
}

#[rstest]
#[case(2000, 1023)]
#[case(1023, 1023)]
#[case(0, 0)]
fn servo_clamps_goal_to_register_range(#[case] goal: u16, #[case] reach: u16) {
    let mut servo = SimulatedServo::new();
    servo.set_torque(true).expect("torque on");
    for _ in 0..40 {
        servo.write_goal_position(goal).expect("goal write");
    }
    assert_eq!(servo.present(), reach);
}

#[test]
fn telemetry_emits_one_frame_per_interval() {
    let mut feed = SimulatedTelemetry::new(Duration::from_millis(30));

    let first = feed.poll_line().expect("poll");
    let line = first.expect("first frame due immediately");
    let text = String::from_utf8(line).expect("frames are utf-8");
    assert!(text.contains("\"pressure_bar\""));
    assert!(text.contains("\"ir_pulse_count\":0"));
    assert!(text.contains("\"flow_rate\""));

    assert!(feed.poll_line().expect("poll").is_none());

    std::thread::sleep(Duration::from_millis(40));
    let second = feed.poll_line().expect("poll").expect("next frame due");
    let text = String::from_utf8(second).expect("frames are utf-8");
    // spin-up profile: pulse count leaves zero after the first frame
    assert!(text.contains("\"ir_pulse_count\":2"));
}
