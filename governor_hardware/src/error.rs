use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus communication failure: {0}")]
    CommFailure(String),
    #[error("device reported error status 0x{0:02x}")]
    DeviceError(u8),
    #[error("bus timeout")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;
