use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::calibration::{Calibration, CalibrationEntry};
use crate::config::{AppConfig, MAX_SETTLE_ATTEMPTS, MotionConfig, StageConfig};
use crate::error::StageError;
use crate::handle::{DeviceSession, HandleState};
use crate::madlib::MadlibInterface;
use crate::types::{Axis, DeviceHandle, PositionCache, ProductInfo};
use crate::utils::CancelToken;

pub mod motion;
pub mod position;

/// A stage shared between threads. The mutex serializes every call that
/// reaches the device handle.
pub type SharedNanoDrive<L> = Arc<Mutex<NanoDrive<L>>>;

/// Builder for constructing [`NanoDrive`] instances with flexible configuration.
///
/// # Examples
///
/// ```
/// use nanodrive::{AxisConfig, NanoDrive, SimulatedMadlib};
///
/// let stage = NanoDrive::builder(SimulatedMadlib::default())
///     .axis(nanodrive::Axis::X, AxisConfig { offset_um: 0.06, tolerance_um: 0.0125 })
///     .reuse_existing_handle(true)
///     .build()?;
/// # Ok::<(), nanodrive::StageError>(())
/// ```
pub struct NanoDriveBuilder<L: MadlibInterface> {
    lib: L,
    stage: StageConfig,
    motion: MotionConfig,
    cancel: Option<CancelToken>,
}

impl<L: MadlibInterface> NanoDriveBuilder<L> {
    /// Set the full stage configuration
    pub fn stage_config(mut self, stage: StageConfig) -> Self {
        self.stage = stage;
        self
    }

    /// Set the full motion configuration
    pub fn motion_config(mut self, motion: MotionConfig) -> Self {
        self.motion = motion;
        self
    }

    /// Set offset and tolerance for one axis
    pub fn axis(mut self, axis: Axis, config: crate::config::AxisConfig) -> Self {
        match axis {
            Axis::X => self.stage.axes.x = config,
            Axis::Y => self.stage.axes.y = config,
            Axis::Z => self.stage.axes.z = config,
        }
        self
    }

    /// Prefer the init-or-reuse handle call over strict init
    pub fn reuse_existing_handle(mut self, reuse: bool) -> Self {
        self.stage.reuse_existing_handle = reuse;
        self
    }

    /// Token that interrupts settle loops
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Acquire the device and read everything needed to command it.
    ///
    /// Any failure after the handle was acquired releases it before the
    /// error is returned.
    pub fn build(self) -> Result<NanoDrive<L>, StageError> {
        if self.motion.max_settle_attempts > MAX_SETTLE_ATTEMPTS {
            warn!(
                "max_settle_attempts = {} exceeds the limit, using {MAX_SETTLE_ATTEMPTS}",
                self.motion.max_settle_attempts
            );
        }

        let mut session = DeviceSession::open(self.lib, self.stage.reuse_existing_handle)?;

        let (lib, handle) = session.parts()?;
        let product_info = match lib.product_info(handle) {
            Ok(info) => info,
            Err(e) => {
                error!("Nano-Drive could not get product information: {e}");
                return Err(e);
            }
        };
        log_product_info(&product_info);

        let calibration = Calibration::load(lib, handle, &self.stage.axes)?;

        let mut stage = NanoDrive {
            session,
            calibration,
            product_info,
            positions: PositionCache::default(),
            motion: self.motion,
            cancel: self.cancel,
        };

        for axis in Axis::ALL {
            stage.get_position(axis, 1)?;
        }
        info!(
            "Initial position: X={:?} Y={:?} Z={:?}",
            stage.positions.get(Axis::X),
            stage.positions.get(Axis::Y),
            stage.positions.get(Axis::Z)
        );

        Ok(stage)
    }
}

fn log_product_info(info: &ProductInfo) {
    info!("Information about the Nano-Drive:");
    info!("Axis bitmap: {:#05b}", info.axis_bitmap);
    info!("ADC resolution: {}", info.adc_resolution);
    info!("DAC resolution: {}", info.dac_resolution);
    info!("Product ID: {:#06x}", info.product_id);
    info!("Firmware version: {}", info.firmware_version);
    info!("Firmware profile: {}", info.firmware_profile);
}

/// Closed-loop driver for a three-axis Mad City Labs Nano-Drive stage.
///
/// Owns the one device handle for the stage; all three axes go through it.
/// Calls take `&mut self`, so one instance never issues overlapping
/// library calls. Use [`into_shared`](Self::into_shared) to hand the stage
/// to several threads.
///
/// # Examples
///
/// ```
/// use nanodrive::{Axis, NanoDrive, SimulatedMadlib};
///
/// let mut stage = NanoDrive::builder(SimulatedMadlib::default()).build()?;
/// stage.set_position(Axis::X, 25.0)?;
/// let settle = stage.set_verify_position(Axis::Y, 40.0, 1)?;
/// println!("Y at {:.3} µm after {} retries", settle.position_um, settle.attempts);
/// stage.disconnect();
/// # Ok::<(), nanodrive::StageError>(())
/// ```
pub struct NanoDrive<L: MadlibInterface> {
    session: DeviceSession<L>,
    calibration: Calibration,
    product_info: ProductInfo,
    positions: PositionCache,
    motion: MotionConfig,
    cancel: Option<CancelToken>,
}

impl<L: MadlibInterface> NanoDrive<L> {
    /// Create a builder for flexible configuration.
    pub fn builder(lib: L) -> NanoDriveBuilder<L> {
        NanoDriveBuilder {
            lib,
            stage: StageConfig::default(),
            motion: MotionConfig::default(),
            cancel: None,
        }
    }

    /// Open the stage with an application configuration.
    pub fn new(lib: L, config: &AppConfig) -> Result<Self, StageError> {
        Self::builder(lib)
            .stage_config(config.stage.clone())
            .motion_config(config.motion.clone())
            .build()
    }

    /// Release the device handle. Further hardware calls fail with
    /// [`StageError::Disconnected`]; calling this twice is harmless.
    pub fn disconnect(&mut self) {
        self.session.close();
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.session.state(), HandleState::Acquired(_))
    }

    pub fn handle(&self) -> Result<DeviceHandle, StageError> {
        self.session.handle()
    }

    pub fn product_info(&self) -> &ProductInfo {
        &self.product_info
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn calibration_entry(&self, axis: Axis) -> &CalibrationEntry {
        self.calibration.entry(axis)
    }

    pub fn motion_config(&self) -> &MotionConfig {
        &self.motion
    }

    /// Install or replace the token checked by settle loops.
    ///
    /// A settle that stops on the token clears it before returning, so one
    /// cancellation ends exactly one move.
    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Have the library print its device summary.
    pub fn print_device_info(&mut self) -> Result<(), StageError> {
        let (lib, handle) = self.session.parts()?;
        lib.print_device_info(handle);
        Ok(())
    }

    pub fn into_shared(self) -> SharedNanoDrive<L> {
        Arc::new(Mutex::new(self))
    }
}
