//! Binary entry point: parse arguments, load and validate the config,
//! bring up logging, and dispatch the subcommand.

mod cli;
mod error_fmt;
mod report;
mod rt;
mod run;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;
use governor_core::error::GovernorError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

fn main() {
    if let Err(err) = color_eyre::install() {
        eprintln!("error reporter init failed: {err}");
    }
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let (cfg, defaulted) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(err) => fail(&err),
    };
    init_logging(&cli, &cfg);
    if defaulted {
        tracing::warn!(
            path = %cli.config.display(),
            "config file not found; running on built-in defaults"
        );
    }

    let result = match cli.cmd {
        Commands::Run {
            duration_s,
            setpoint_rpm,
            csv,
            rt,
            rt_prio,
            rt_lock,
        } => run::run(
            &cfg,
            run::RunArgs {
                duration_s,
                setpoint_rpm,
                csv,
                rt,
                rt_prio,
                rt_lock,
            },
        )
        .map(|outcome| print_outcome(&outcome, cli.json)),
        Commands::SelfCheck => run::self_check(&cfg),
    };

    if let Err(err) = result {
        fail(&err);
    }
}

fn fail(err: &eyre::Report) -> ! {
    if JSON_MODE.get().copied().unwrap_or(false) {
        eprintln!("{}", error_fmt::format_error_json(err));
    } else {
        eprintln!("{}", error_fmt::humanize(err));
    }
    std::process::exit(error_fmt::exit_code_for_error(err));
}

/// Load the TOML config, falling back to defaults when the file does
/// not exist. Parse and validation failures are typed config errors.
fn load_config(cli: &Cli) -> eyre::Result<(governor_config::Config, bool)> {
    let (cfg, defaulted) = if cli.config.exists() {
        let text = std::fs::read_to_string(&cli.config)
            .wrap_err_with(|| format!("read config {}", cli.config.display()))?;
        let cfg = governor_config::load_toml(&text)
            .map_err(|e| eyre::Report::new(GovernorError::Config(e.to_string())))
            .wrap_err_with(|| format!("parse config {}", cli.config.display()))?;
        (cfg, false)
    } else {
        (governor_config::Config::default(), true)
    };
    if let Err(e) = cfg.validate() {
        return Err(eyre::Report::new(GovernorError::Config(e.to_string())));
    }
    Ok((cfg, defaulted))
}

/// Console logging to stderr (pretty or JSON), plus an optional JSON
/// file sink when the config names one. RUST_LOG wins over both the
/// --log-level flag and the config's logging.level.
fn init_logging(cli: &Cli, cfg: &governor_config::Config) {
    let base = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

    let file_layer = cfg.logging.file.as_ref().map(|file| {
        let rotation = match cfg.logging.rotation.as_deref() {
            Some("hourly") => tracing_appender::rolling::Rotation::HOURLY,
            Some("never") => tracing_appender::rolling::Rotation::NEVER,
            _ => tracing_appender::rolling::Rotation::DAILY,
        };
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| std::ffi::OsString::from("governor.log"), ToOwned::to_owned);
        let appender = tracing_appender::rolling::RollingFileAppender::new(rotation, dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    if cli.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn print_outcome(outcome: &run::RunOutcome, json: bool) {
    if json {
        // non-finite figures serialize as null
        let value = serde_json::json!({
            "cycles": outcome.cycles,
            "skipped": outcome.skipped,
            "degraded": outcome.degraded,
            "average_error_rpm": outcome.average_error,
            "settled_error_rpm": outcome.settled_error,
            "elapsed_ms": outcome.elapsed_ms,
            "csv": outcome.csv.as_ref().map(|p| p.display().to_string()),
        });
        println!("{value}");
        return;
    }

    println!(
        "run complete: {} cycles ({} skipped, {} degraded) in {:.1} s",
        outcome.cycles,
        outcome.skipped,
        outcome.degraded,
        outcome.elapsed_ms as f64 / 1000.0
    );
    if outcome.settled_error.is_finite() {
        println!(
            "settled error {:.2} RPM (run average {:.2} RPM)",
            outcome.settled_error, outcome.average_error
        );
    } else {
        println!("rotor never spun up; no settled-error figure");
    }
    if let Some(path) = &outcome.csv {
        println!("records written to {}", path.display());
    }
}
