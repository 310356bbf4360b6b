//! Driver for Mad City Labs Nano-Drive piezo stages.
//!
//! [`NanoDrive`] owns the device handle, reads per-axis calibration once at
//! startup and exposes averaged reads plus offset-corrected, range-checked
//! moves with bounded settle loops. The vendor library sits behind
//! [`MadlibInterface`]; link the real one with the `madlib` feature or use
//! [`SimulatedMadlib`] without hardware.

pub mod calibration;
pub mod config;
pub mod error;
pub mod handle;
pub mod madlib;
pub mod stage;
pub mod status;
pub mod types;
pub mod utils;

pub use calibration::{Calibration, CalibrationEntry};
pub use config::{
    AppConfig, AxesConfig, AxisConfig, LoggingConfig, MotionConfig, StageConfig, load_config,
    load_config_or_default,
};
pub use error::StageError;
pub use handle::{DeviceSession, HandleState};
#[cfg(feature = "madlib")]
pub use madlib::Madlib;
pub use madlib::{MadlibInterface, SimulatedMadlib, SimulatorConfig};
pub use stage::{NanoDrive, NanoDriveBuilder, SharedNanoDrive};
pub use status::{ErrorCode, translate};
pub use types::{Axis, DeviceHandle, PositionCache, ProductInfo, Reading, Settle};
pub use utils::CancelToken;
