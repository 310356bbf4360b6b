//! Raw Madlib entry points and the [`Madlib`] wrapper that calls them.
//!
//! This is the only place in the crate that crosses the foreign boundary.
//! The symbol table below is declared once for the whole process; every
//! [`Madlib`] value shares it.
//!
//! # Safety
//!
//! The library is not reentrant for a given handle. [`Madlib`] takes
//! `&mut self` on every call, and the stage driver owns it exclusively, so
//! calls through one driver are serialized by construction.

#![allow(non_snake_case)]

use log::debug;
use std::os::raw::{c_double, c_int, c_uint, c_void};

use super::MadlibInterface;
use crate::error::StageError;
use crate::status::ErrorCode;
use crate::types::{Axis, DeviceHandle, PRODUCT_INFO_LEN, ProductInfo, Reading};

#[cfg_attr(windows, link(name = "Madlib"))]
#[cfg_attr(not(windows), link(name = "madlib"))]
unsafe extern "C" {
    fn MCL_InitHandle() -> c_int;
    fn MCL_InitHandleOrGetExisting() -> c_int;
    fn MCL_ReleaseHandle(handle: c_int);
    /// `pi` points at an 11-byte record packed with 1-byte alignment.
    fn MCL_GetProductInfo(pi: *mut c_void, handle: c_int) -> c_int;
    fn MCL_GetCalibration(axis: c_uint, handle: c_int) -> c_double;
    fn MCL_SingleReadN(axis: c_uint, handle: c_int) -> c_double;
    fn MCL_SingleWriteN(position: c_double, axis: c_uint, handle: c_int) -> c_int;
    fn MCL_MonitorN(position: c_double, axis: c_uint, handle: c_int) -> c_double;
    fn MCL_PrintDeviceInfo(handle: c_int);
}

/// The vendor library, linked at build time.
#[derive(Debug, Default)]
pub struct Madlib {
    _private: (),
}

impl Madlib {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MadlibInterface for Madlib {
    fn init_handle(&mut self) -> DeviceHandle {
        let handle = unsafe { MCL_InitHandle() };
        debug!("MCL_InitHandle -> {handle}");
        DeviceHandle(handle)
    }

    fn init_handle_or_get_existing(&mut self) -> DeviceHandle {
        let handle = unsafe { MCL_InitHandleOrGetExisting() };
        debug!("MCL_InitHandleOrGetExisting -> {handle}");
        DeviceHandle(handle)
    }

    fn release_handle(&mut self, handle: DeviceHandle) {
        debug!("MCL_ReleaseHandle({handle})");
        unsafe { MCL_ReleaseHandle(handle.0) }
    }

    fn product_info(&mut self, handle: DeviceHandle) -> Result<ProductInfo, StageError> {
        let mut record = [0u8; PRODUCT_INFO_LEN];
        let status = unsafe { MCL_GetProductInfo(record.as_mut_ptr().cast(), handle.0) };
        let status = ErrorCode::from_raw(status);
        debug!("MCL_GetProductInfo({handle}) -> {}", status.name());
        if !status.is_success() {
            return Err(StageError::device("MCL_GetProductInfo", status));
        }
        ProductInfo::parse(&record)
    }

    fn calibration(&mut self, axis: Axis, handle: DeviceHandle) -> f64 {
        let value = unsafe { MCL_GetCalibration(axis.id(), handle.0) };
        debug!("MCL_GetCalibration({axis}, {handle}) -> {value}");
        value
    }

    fn single_read(&mut self, axis: Axis, handle: DeviceHandle) -> Reading {
        let value = unsafe { MCL_SingleReadN(axis.id(), handle.0) };
        debug!("MCL_SingleReadN({axis}, {handle}) -> {value}");
        Reading::from_raw(value)
    }

    fn single_write(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> ErrorCode {
        let status = unsafe { MCL_SingleWriteN(position_um, axis.id(), handle.0) };
        debug!("MCL_SingleWriteN({position_um}, {axis}, {handle}) -> {status}");
        ErrorCode::from_raw(status)
    }

    fn monitor(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> Reading {
        let value = unsafe { MCL_MonitorN(position_um, axis.id(), handle.0) };
        debug!("MCL_MonitorN({position_um}, {axis}, {handle}) -> {value}");
        Reading::from_raw(value)
    }

    fn print_device_info(&mut self, handle: DeviceHandle) {
        unsafe { MCL_PrintDeviceInfo(handle.0) }
    }
}
