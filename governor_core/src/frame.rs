//! Telemetry frame decoding.
//!
//! The sensor microcontroller streams newline-delimited JSON objects:
//!
//! ```json
//! {"pressure_bar": 2.31, "ir_pulse_count": 11, "flow_rate": 3.4}
//! ```
//!
//! Decoding is pure and total over arbitrary bytes: anything that is
//! not a well-formed frame comes back as a [`DecodeError`] and the
//! caller skips the cycle. Extra fields are tolerated so firmware can
//! grow the frame without breaking older governors.

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed telemetry payload")]
    MalformedPayload,
    #[error("telemetry frame missing field `{0}`")]
    MissingField(&'static str),
}

/// One decoded sensor frame, covering a single sample window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryFrame {
    pub pressure_bar: f64,
    pub ir_pulse_count: u32,
    pub flow_rate: f64,
}

/// Decode one raw line into a frame.
///
/// Non-UTF-8 bytes are substituted rather than aborting the line, and
/// surrounding whitespace (including a CR left over from CRLF framing)
/// is ignored. Numeric fields must be finite; the pulse count must be
/// a non-negative integer that fits in 32 bits.
pub fn decode(raw_line: &[u8]) -> Result<TelemetryFrame, DecodeError> {
    let text = String::from_utf8_lossy(raw_line);
    let text = text.trim();
    if text.is_empty() {
        return Err(DecodeError::MalformedPayload);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| DecodeError::MalformedPayload)?;
    let obj = value.as_object().ok_or(DecodeError::MalformedPayload)?;

    let pressure_bar = finite_field(obj, "pressure_bar")?;
    let flow_rate = finite_field(obj, "flow_rate")?;
    let ir_pulse_count = obj
        .get("ir_pulse_count")
        .ok_or(DecodeError::MissingField("ir_pulse_count"))?
        .as_u64()
        .filter(|&count| count <= u64::from(u32::MAX))
        .ok_or(DecodeError::MalformedPayload)?;

    Ok(TelemetryFrame {
        pressure_bar,
        ir_pulse_count: ir_pulse_count as u32,
        flow_rate,
    })
}

fn finite_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    name: &'static str,
) -> Result<f64, DecodeError> {
    obj.get(name)
        .ok_or(DecodeError::MissingField(name))?
        .as_f64()
        .filter(|value| value.is_finite())
        .ok_or(DecodeError::MalformedPayload)
}
