use thiserror::Error;

/// Terminal outcome of a measurement session that produced no weight.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeasureError {
    #[error("timed out waiting for a stable weight")]
    Timeout,
    #[error("sample buffer never filled during the settle window")]
    InsufficientData,
    #[error("failed to open the sensor data channel")]
    DeviceOpenFailed,
    #[error("device type never resolved to the expected kind")]
    DevtypeResolution,
    #[error("canceled by shutdown request")]
    Canceled,
    #[error("bus error: {0}")]
    Bus(String),
    #[error("hardware error: {0}")]
    Hardware(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("device identity must not be empty")]
    EmptyIdentity,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
