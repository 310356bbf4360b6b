//! Scripted library used by the unit tests.

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::Arc;

use super::MadlibInterface;
use crate::error::StageError;
use crate::status::ErrorCode;
use crate::types::{Axis, DeviceHandle, ProductInfo, Reading};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    InitHandle,
    InitHandleOrGetExisting,
    Release(DeviceHandle),
    ProductInfo,
    Calibration(Axis),
    Read(Axis),
    Write(Axis, f64),
    Monitor(Axis, f64),
    PrintDeviceInfo,
}

#[derive(Debug)]
pub(crate) struct MockState {
    pub handle: DeviceHandle,
    pub product_status: ErrorCode,
    pub max_travel: [f64; 3],
    /// Queued raw reads; once empty the last value repeats.
    pub reads: VecDeque<f64>,
    pub last_read: f64,
    pub write_status: VecDeque<ErrorCode>,
    /// Queued raw monitor returns; once empty the commanded value is echoed.
    pub monitor: VecDeque<f64>,
    pub calls: Vec<Call>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            handle: DeviceHandle(7),
            product_status: ErrorCode::Success,
            max_travel: [100.0, 100.0, 100.0],
            reads: VecDeque::new(),
            last_read: 0.0,
            write_status: VecDeque::new(),
            monitor: VecDeque::new(),
            calls: Vec::new(),
        }
    }
}

/// Cloneable: tests keep one copy to inspect calls after handing the other
/// to the driver.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedMadlib {
    state: Arc<Mutex<MockState>>,
}

impl ScriptedMadlib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: Call) -> MutexGuard<'_, MockState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }
}

impl MadlibInterface for ScriptedMadlib {
    fn init_handle(&mut self) -> DeviceHandle {
        self.record(Call::InitHandle).handle
    }

    fn init_handle_or_get_existing(&mut self) -> DeviceHandle {
        self.record(Call::InitHandleOrGetExisting).handle
    }

    fn release_handle(&mut self, handle: DeviceHandle) {
        self.record(Call::Release(handle));
    }

    fn product_info(&mut self, _handle: DeviceHandle) -> Result<ProductInfo, StageError> {
        let state = self.record(Call::ProductInfo);
        if state.product_status.is_success() {
            Ok(ProductInfo {
                axis_bitmap: 0b111,
                ..Default::default()
            })
        } else {
            Err(StageError::device("MCL_GetProductInfo", state.product_status))
        }
    }

    fn calibration(&mut self, axis: Axis, _handle: DeviceHandle) -> f64 {
        self.record(Call::Calibration(axis)).max_travel[axis.index()]
    }

    fn single_read(&mut self, axis: Axis, _handle: DeviceHandle) -> Reading {
        let mut state = self.record(Call::Read(axis));
        if let Some(value) = state.reads.pop_front() {
            state.last_read = value;
        }
        Reading::from_raw(state.last_read)
    }

    fn single_write(&mut self, position_um: f64, axis: Axis, _handle: DeviceHandle) -> ErrorCode {
        self.record(Call::Write(axis, position_um))
            .write_status
            .pop_front()
            .unwrap_or(ErrorCode::Success)
    }

    fn monitor(&mut self, position_um: f64, axis: Axis, _handle: DeviceHandle) -> Reading {
        let value = self
            .record(Call::Monitor(axis, position_um))
            .monitor
            .pop_front()
            .unwrap_or(position_um);
        Reading::from_raw(value)
    }

    fn print_device_info(&mut self, _handle: DeviceHandle) {
        self.record(Call::PrintDeviceInfo);
    }
}
