use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::MadlibInterface;
use crate::error::StageError;
use crate::status::ErrorCode;
use crate::types::{Axis, DeviceHandle, ProductInfo, Reading};

/// Behaviour of the simulated stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Full-scale travel per axis (X, Y, Z) in micrometers.
    pub max_travel_um: [f64; 3],
    /// Peak amplitude of the uniform read noise.
    pub noise_um: f64,
    /// Fraction of the remaining distance covered on every read.
    pub response: f64,
    /// Systematic bias of the actuator: where it ends up relative to the
    /// commanded value.
    pub bias_um: [f64; 3],
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            max_travel_um: [100.0, 100.0, 100.0],
            noise_um: 0.005,
            response: 0.6,
            bias_um: [0.0, 0.0, 0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct AxisState {
    commanded: f64,
    actual: f64,
}

/// In-process stand-in for Madlib, for running without hardware.
///
/// Holds at most one device. A second plain `init_handle` fails the way the
/// real library does once every attached device is claimed.
#[derive(Debug)]
pub struct SimulatedMadlib {
    config: SimulatorConfig,
    axes: [AxisState; 3],
    open_handle: Option<DeviceHandle>,
    next_handle: i32,
}

impl SimulatedMadlib {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            axes: [AxisState::default(); 3],
            open_handle: None,
            next_handle: 1,
        }
    }

    fn check(&self, handle: DeviceHandle) -> Result<(), ErrorCode> {
        match self.open_handle {
            Some(open) if open == handle => Ok(()),
            _ => Err(ErrorCode::InvalidHandle),
        }
    }

    fn advance(&mut self, axis: Axis) -> f64 {
        let i = axis.index();
        let state = &mut self.axes[i];
        let goal = state.commanded + self.config.bias_um[i];
        state.actual += (goal - state.actual) * self.config.response.clamp(0.0, 1.0);
        let noise = if self.config.noise_um > 0.0 {
            rand::thread_rng().gen_range(-self.config.noise_um..=self.config.noise_um)
        } else {
            0.0
        };
        (state.actual + noise).max(0.0)
    }

    fn command(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> ErrorCode {
        if let Err(code) = self.check(handle) {
            return code;
        }
        if !(0.0..=self.config.max_travel_um[axis.index()]).contains(&position_um) {
            return ErrorCode::Argument;
        }
        self.axes[axis.index()].commanded = position_um;
        ErrorCode::Success
    }
}

impl Default for SimulatedMadlib {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl MadlibInterface for SimulatedMadlib {
    fn init_handle(&mut self) -> DeviceHandle {
        if self.open_handle.is_some() {
            return DeviceHandle(0);
        }
        let handle = DeviceHandle(self.next_handle);
        self.next_handle += 1;
        self.open_handle = Some(handle);
        debug!("Simulator: opened handle {handle}");
        handle
    }

    fn init_handle_or_get_existing(&mut self) -> DeviceHandle {
        match self.open_handle {
            Some(handle) => handle,
            None => self.init_handle(),
        }
    }

    fn release_handle(&mut self, handle: DeviceHandle) {
        if self.open_handle == Some(handle) {
            debug!("Simulator: released handle {handle}");
            self.open_handle = None;
        }
    }

    fn product_info(&mut self, handle: DeviceHandle) -> Result<ProductInfo, StageError> {
        self.check(handle)
            .map_err(|code| StageError::device("MCL_GetProductInfo", code))?;
        Ok(ProductInfo {
            axis_bitmap: 0b111,
            adc_resolution: 20,
            dac_resolution: 20,
            product_id: 0x2003,
            firmware_version: 1,
            firmware_profile: 0,
        })
    }

    fn calibration(&mut self, axis: Axis, handle: DeviceHandle) -> f64 {
        match self.check(handle) {
            Ok(()) => self.config.max_travel_um[axis.index()],
            Err(code) => code.raw() as f64,
        }
    }

    fn single_read(&mut self, axis: Axis, handle: DeviceHandle) -> Reading {
        match self.check(handle) {
            Ok(()) => Reading::Position(self.advance(axis)),
            Err(code) => Reading::Failed(code),
        }
    }

    fn single_write(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> ErrorCode {
        self.command(position_um, axis, handle)
    }

    fn monitor(&mut self, position_um: f64, axis: Axis, handle: DeviceHandle) -> Reading {
        match self.command(position_um, axis, handle) {
            ErrorCode::Success => Reading::Position(self.advance(axis)),
            code => Reading::Failed(code),
        }
    }

    fn print_device_info(&mut self, handle: DeviceHandle) {
        println!(
            "Simulated Nano-Drive (handle {handle}), travel {:?} µm",
            self.config.max_travel_um
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> SimulatedMadlib {
        SimulatedMadlib::new(SimulatorConfig {
            noise_um: 0.0,
            response: 1.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_single_device_handle() {
        let mut sim = quiet();
        let first = sim.init_handle();
        assert!(first.is_valid());
        assert_eq!(sim.init_handle(), DeviceHandle(0));
        assert_eq!(sim.init_handle_or_get_existing(), first);
        sim.release_handle(first);
        assert!(sim.init_handle().is_valid());
    }

    #[test]
    fn test_released_handle_is_rejected() {
        let mut sim = quiet();
        let handle = sim.init_handle();
        sim.release_handle(handle);
        assert_eq!(sim.calibration(Axis::X, handle), -8.0);
        assert_eq!(
            sim.single_read(Axis::X, handle),
            Reading::Failed(ErrorCode::InvalidHandle)
        );
        assert_eq!(
            sim.monitor(1.0, Axis::X, handle),
            Reading::Failed(ErrorCode::InvalidHandle)
        );
    }

    #[test]
    fn test_write_then_read_tracks_target() {
        let mut sim = quiet();
        let handle = sim.init_handle();
        assert_eq!(sim.single_write(25.0, Axis::Y, handle), ErrorCode::Success);
        assert_eq!(sim.single_read(Axis::Y, handle), Reading::Position(25.0));
        assert_eq!(sim.single_write(150.0, Axis::Y, handle), ErrorCode::Argument);
    }
}
