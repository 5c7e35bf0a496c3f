use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[rstest]
fn config_rejection_is_humanized() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[position]\nmin = 512\nmax = 200\n").unwrap();

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("run");
    cmd.assert().code(2).stderr(predicate::str::contains(
        "What happened: Configuration rejected",
    ));
}

#[rstest]
fn toml_syntax_error_carries_the_parser_message() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[control\nsetpoint_rpm = 210\n").unwrap();

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("run");
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("TOML parse error"));
}

#[rstest]
fn csv_open_failure_bubbles_to_cli() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        "[rotor]\nsample_period_s = 0.05\n\n[run]\nduration_s = 1\n",
    )
    .unwrap();
    let missing = dir.path().join("missing-dir").join("records.csv");

    let mut cmd = Command::cargo_bin("governor_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--csv")
        .arg(&missing);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("open csv"));
}
