use crate::status::ErrorCode;
use crate::types::Axis;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Could not acquire a device handle (is the Nano-Drive connected and powered?)")]
    HandleUnavailable,
    #[error("Device handle has already been released")]
    Disconnected,
    #[error(
        "Position on axis {axis} must be between 0 and {max_travel_um} µm after applying the \
         {offset_um} µm offset (requested {requested_um} µm, adjusted {adjusted_um} µm)"
    )]
    OutOfRange {
        axis: Axis,
        requested_um: f64,
        adjusted_um: f64,
        offset_um: f64,
        max_travel_um: f64,
    },
    #[error("{operation} failed: {code}")]
    Device {
        operation: &'static str,
        code: ErrorCode,
    },
    #[error("Sample count must be at least 1")]
    InvalidSampleCount,
    #[error("Invalid calibration for axis {axis}: {value} µm")]
    InvalidCalibration { axis: Axis, value: f64 },
    #[error("Settle on axis {axis} cancelled at {last_position_um} µm")]
    Cancelled { axis: Axis, last_position_um: f64 },
}

impl StageError {
    /// Build a device error from a raw library status.
    pub fn device(operation: &'static str, code: impl Into<ErrorCode>) -> Self {
        StageError::Device {
            operation,
            code: code.into(),
        }
    }

    /// The library status behind this error, if it came from the device.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            StageError::Device { code, .. } => Some(*code),
            _ => None,
        }
    }
}
