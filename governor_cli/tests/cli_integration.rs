use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use assert_cmd::Command;
use tempfile::tempdir;

// Build a valid TOML config for sim mode, tightened so a run finishes
// in about a second.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[telemetry]
port = "/dev/ttyUSB0"
baud = 19200

[bus]
port = "/dev/ttyUSB1"
baud = 1000000
device_id = 0

[control]
setpoint_rpm = 210.0
kp = 0.1
ki = 0.02
kd = 0.0003

[rotor]
blade_count = 3
# fast sampling so the sim emits frames every 50 ms
sample_period_s = 0.05

[position]
min = 200
max = 512

[timeouts]
bus_ms = 100
poll_ms = 5

[run]
# short runs keep the suite fast
duration_s = 1

[report]
settle_window_s = 1
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run"], 0, "run complete", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["run", "--setpoint-rpm", "nan"], 2, "Invalid setpoint", "stderr")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();

    // Always include a valid config to avoid relying on the default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn csv_export_writes_header_and_rows() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv_path = dir.path().join("records.csv");

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--csv")
        .arg(&csv_path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("records written to"));

    let text = fs::read_to_string(&csv_path).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "timestamp_ms,rpm,pressure_bar,flow_rate,goal_position,present_position,actuator_ok,average_error"
    );
    assert!(lines.count() >= 1, "expected at least one record row");
}

#[rstest]
fn stalled_rotor_is_reported_in_the_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.env("GOVERNOR_TEST_SIM_STALL", "1")
        .arg("--config")
        .arg(&cfg)
        .arg("run");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("rotor never spun up"));
}

#[rstest]
fn duration_flag_overrides_the_config() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    // Stretch the configured run; the flag must win or the timeout
    // below kills the process.
    let text = fs::read_to_string(&cfg).unwrap();
    fs::write(&cfg, text.replace("duration_s = 1", "duration_s = 120")).unwrap();

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.timeout(std::time::Duration::from_secs(20));
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--duration-s")
        .arg("1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("run complete"));
}
