use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum GovernorError {
    #[error("bus error: {0}")]
    Bus(String),
    #[error("bus timeout")]
    BusTimeout,
    #[error("actuator fault: device status 0x{0:02x}")]
    Device(u8),
    #[error("telemetry error: {0}")]
    Telemetry(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing telemetry source")]
    MissingTelemetry,
    #[error("missing servo")]
    MissingServo,
    #[error("invalid setpoint: {0}")]
    InvalidSetpoint(&'static str),
    #[error("invalid position bounds: {0}")]
    InvalidBounds(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
