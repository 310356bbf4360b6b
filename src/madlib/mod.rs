//! Binding layer for the Mad City Labs Madlib motion-control library.
//!
//! Every foreign call the driver makes goes through [`MadlibInterface`].
//! Implementations return typed values so the rest of the crate never has
//! to look at a raw `f64` and guess whether it is a position or an error.
//! Calibration is the exception: it is read once and checked in
//! [`Calibration::load`](crate::calibration::Calibration::load).

#[cfg(feature = "madlib")]
pub mod ffi;
#[cfg(test)]
pub(crate) mod mock;
pub mod sim;

#[cfg(feature = "madlib")]
pub use ffi::Madlib;
pub use sim::{SimulatedMadlib, SimulatorConfig};

use crate::error::StageError;
use crate::status::ErrorCode;
use crate::types::{Axis, DeviceHandle, ProductInfo, Reading};

/// Operations the driver assumes of the vendor library.
///
/// The signatures mirror the C entry points one-to-one. Handles are passed
/// explicitly because the library owns the session state, not this crate.
///
/// # Design Philosophy
/// - One method per foreign symbol, nothing composite
/// - Return values keep the library's meaning, except where the library
///   overloads a value with a status code, which is resolved here
/// - Enable testing through mock implementations
pub trait MadlibInterface: Send {
    /// Request control of a new device. Returns the invalid handle when
    /// nothing could be acquired.
    fn init_handle(&mut self) -> DeviceHandle;

    /// Request control of a device, reusing a handle the library already
    /// holds for this process if no free device is left.
    fn init_handle_or_get_existing(&mut self) -> DeviceHandle;

    /// Give the handle back to the library.
    fn release_handle(&mut self, handle: DeviceHandle);

    /// Query the packed product information record.
    fn product_info(&mut self, handle: DeviceHandle) -> Result<ProductInfo, StageError>;

    /// Full-scale travel of an axis in micrometers.
    ///
    /// Negative values are library status codes.
    fn calibration(&mut self, axis: Axis, handle: DeviceHandle) -> f64;

    /// One unaveraged position sample in micrometers.
    fn single_read(&mut self, axis: Axis, handle: DeviceHandle) -> Reading;

    /// Command a new position without waiting for the actuator.
    fn single_write(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> ErrorCode;

    /// Command a new position and read one sample back in the same call.
    fn monitor(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> Reading;

    /// Let the library print its own device summary to stdout.
    fn print_device_info(&mut self, handle: DeviceHandle);
}
