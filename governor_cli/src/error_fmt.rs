//! Human-readable error descriptions and structured JSON error formatting.

use governor_core::error::{BuildError, GovernorError};

/// Device status bits reported by the actuator, by position.
const DEVICE_FAULT_BITS: [(u8, &str); 7] = [
    (0x01, "input voltage"),
    (0x02, "angle limit"),
    (0x04, "overheating"),
    (0x08, "range"),
    (0x10, "checksum"),
    (0x20, "overload"),
    (0x40, "instruction"),
];

fn device_faults(code: u8) -> String {
    let names: Vec<&str> = DEVICE_FAULT_BITS
        .iter()
        .filter(|(bit, _)| code & bit != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "unknown".to_string()
    } else {
        names.join(", ")
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTelemetry => {
                "What happened: No telemetry source was provided to the control loop.\nLikely causes: The sensor feed failed to open or was not wired into the builder.\nHow to fix: Check telemetry.port in the config and ensure the feed opens before the run starts.".to_string()
            }
            BuildError::MissingServo => {
                "What happened: No servo was provided to the control loop.\nLikely causes: The actuator bus failed to open or was not wired into the builder.\nHow to fix: Check bus.port in the config and ensure the bus opens before the run starts.".to_string()
            }
            BuildError::InvalidSetpoint(msg) => format!(
                "What happened: Invalid setpoint ({msg}).\nLikely causes: control.setpoint_rpm is zero, negative, or not a number.\nHow to fix: Set a positive finite RPM target in the config or via --setpoint-rpm."
            ),
            BuildError::InvalidBounds(msg) => format!(
                "What happened: Invalid valve travel ({msg}).\nLikely causes: position.min is at or above position.max.\nHow to fix: Order the bounds so the closed stop is below the open stop (e.g., 200 and 512)."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(ge) = err.downcast_ref::<GovernorError>() {
        return match ge {
            GovernorError::BusTimeout => {
                "What happened: The servo did not answer within the bus deadline.\nLikely causes: Wrong bus.port or baud, unpowered servo, or a device_id that does not match.\nHow to fix: Verify wiring and power, confirm bus.device_id, and consider raising timeouts.bus_ms.".to_string()
            }
            GovernorError::Device(code) => format!(
                "What happened: The servo reported a fault (status 0x{code:02x}: {}).\nLikely causes: Overload or supply voltage outside the servo's operating range.\nHow to fix: Check the supply and the valve for mechanical binding, then power-cycle the servo.",
                device_faults(*code)
            ),
            GovernorError::Bus(msg) => format!(
                "What happened: Servo bus exchange failed ({msg}).\nLikely causes: Loose adapter, wrong baud, or noise on the half-duplex line.\nHow to fix: Reseat the bus adapter and verify bus.port and bus.baud in the config."
            ),
            GovernorError::Telemetry(msg) => format!(
                "What happened: The telemetry feed died ({msg}).\nLikely causes: Sensor board reset, cable unplugged, or wrong telemetry.port.\nHow to fix: Check the sensor board and serial cable, then restart the run."
            ),
            GovernorError::Config(msg) => format!(
                "What happened: Configuration rejected ({msg}).\nLikely causes: A value in the TOML is missing or out of range.\nHow to fix: Edit the config file and rerun."
            ),
            GovernorError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or transport opening
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open telemetry feed") || lower.contains("open servo bus") {
        return "What happened: Failed to open a serial port.\nLikely causes: Wrong device path, the adapter is unplugged, or insufficient permissions.\nHow to fix: Check telemetry.port and bus.port in the config; ensure the user can access the serial devices (dialout group).".to_string();
    }

    if lower.contains("parse config") || lower.contains("read config") {
        return format!(
            "What happened: Could not load the configuration.\nLikely causes: The file is missing, unreadable, or not valid TOML.\nHow to fix: Check --config and the file contents. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name for the error category, used in JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    if let Some(ge) = err.downcast_ref::<GovernorError>() {
        return match ge {
            GovernorError::Bus(_) => "Bus",
            GovernorError::BusTimeout => "BusTimeout",
            GovernorError::Device(_) => "DeviceFault",
            GovernorError::Telemetry(_) => "Telemetry",
            GovernorError::Config(_) => "Config",
            GovernorError::State(_) => "State",
        };
    }
    "Error"
}

/// Map error categories to stable exit codes: config problems 2, bus
/// faults 3, telemetry 4, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if let Some(ge) = err.downcast_ref::<GovernorError>() {
        return match ge {
            GovernorError::Config(_) => 2,
            GovernorError::Bus(_) | GovernorError::BusTimeout | GovernorError::Device(_) => 3,
            GovernorError::Telemetry(_) => 4,
            GovernorError::State(_) => 1,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(GovernorError::Device(code)) = err.downcast_ref::<GovernorError>() {
        return json!({
            "reason": reason_name(err),
            "details": { "status": code, "faults": device_faults(*code) },
            "message": humanize(err),
        })
        .to_string();
    }

    json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
