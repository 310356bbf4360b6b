use log::{error, info};
use serde::Serialize;

use crate::config::AxesConfig;
use crate::error::StageError;
use crate::madlib::MadlibInterface;
use crate::status::ErrorCode;
use crate::types::{Axis, DeviceHandle};

/// Physical constants for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationEntry {
    /// Upper bound of the valid commanded range; the lower bound is 0.
    pub max_travel_um: f64,
    pub offset_um: f64,
    pub tolerance_um: f64,
}

impl CalibrationEntry {
    /// Apply the offset and check the result against `[0, max_travel_um]`.
    pub fn adjusted_target(&self, axis: Axis, requested_um: f64) -> Result<f64, StageError> {
        let adjusted_um = requested_um + self.offset_um;
        if (0.0..=self.max_travel_um).contains(&adjusted_um) {
            Ok(adjusted_um)
        } else {
            Err(StageError::OutOfRange {
                axis,
                requested_um,
                adjusted_um,
                offset_um: self.offset_um,
                max_travel_um: self.max_travel_um,
            })
        }
    }

    pub fn within_tolerance(&self, target_um: f64, measured_um: f64) -> bool {
        (target_um - measured_um).abs() <= self.tolerance_um
    }
}

/// Per-axis calibration, read once when the stage is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    entries: [CalibrationEntry; 3],
}

impl Calibration {
    pub fn new(x: CalibrationEntry, y: CalibrationEntry, z: CalibrationEntry) -> Self {
        Self {
            entries: [x, y, z],
        }
    }

    /// Query max travel for every axis and merge it with the configured
    /// offset and tolerance.
    ///
    /// The library reports errors from this call as negative numbers, and a
    /// zero range leaves nothing to command, so anything not strictly
    /// positive aborts the load.
    pub fn load<L: MadlibInterface>(
        lib: &mut L,
        handle: DeviceHandle,
        axes: &AxesConfig,
    ) -> Result<Self, StageError> {
        let mut entries = [CalibrationEntry {
            max_travel_um: 0.0,
            offset_um: 0.0,
            tolerance_um: 0.0,
        }; 3];

        for axis in Axis::ALL {
            let max_travel_um = lib.calibration(axis, handle);
            if max_travel_um < 0.0 {
                let code = ErrorCode::from_f64(max_travel_um);
                error!("Calibration query for axis {axis} failed: {code}");
                return Err(StageError::device("MCL_GetCalibration", code));
            }
            if !max_travel_um.is_finite() || max_travel_um == 0.0 {
                error!("Axis {axis} reports no travel range ({max_travel_um} µm)");
                return Err(StageError::InvalidCalibration {
                    axis,
                    value: max_travel_um,
                });
            }

            let configured = axes.get(axis);
            info!(
                "Calibration on axis {axis}: {max_travel_um} µm range, offset {} µm, tolerance {} µm",
                configured.offset_um, configured.tolerance_um
            );
            entries[axis.index()] = CalibrationEntry {
                max_travel_um,
                offset_um: configured.offset_um,
                tolerance_um: configured.tolerance_um,
            };
        }

        Ok(Self { entries })
    }

    pub fn entry(&self, axis: Axis) -> &CalibrationEntry {
        &self.entries[axis.index()]
    }
}
