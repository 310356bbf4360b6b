use log::{debug, warn};

use super::NanoDrive;
use crate::error::StageError;
use crate::madlib::MadlibInterface;
use crate::types::{Axis, PositionCache};

impl<L: MadlibInterface> NanoDrive<L> {
    /// Read the position of one axis, averaged over `samples` raw readings.
    ///
    /// Raw readings carry noise comparable to the settle tolerance. With
    /// more than one sample the reads are spaced by the configured sample
    /// interval and the arithmetic mean is returned. The result is stored in
    /// the position cache.
    ///
    /// # Errors
    /// [`StageError::InvalidSampleCount`] for `samples == 0`, before any
    /// hardware call; [`StageError::Device`] as soon as one sample comes
    /// back as a status code, leaving the cache untouched;
    /// [`StageError::Disconnected`] after [`disconnect`](Self::disconnect).
    pub fn get_position(&mut self, axis: Axis, samples: u32) -> Result<f64, StageError> {
        if samples == 0 {
            return Err(StageError::InvalidSampleCount);
        }

        let interval = self.motion.sample_interval();
        let (lib, handle) = self.session.parts()?;

        let mut sum = 0.0;
        for i in 0..samples {
            if i > 0 {
                std::thread::sleep(interval);
            }
            match lib.single_read(axis, handle).into_result("MCL_SingleReadN") {
                Ok(value) => sum += value,
                Err(e) => {
                    warn!("Axis {axis}: read {} of {samples} failed: {e}", i + 1);
                    return Err(e);
                }
            }
        }

        let position = sum / samples as f64;
        debug!("Axis {axis}: {position} µm (mean of {samples})");
        self.positions.update(axis, position);
        Ok(position)
    }

    /// Last known position of an axis without touching the hardware.
    pub fn cached_position(&self, axis: Axis) -> Option<f64> {
        self.positions.get(axis)
    }

    pub fn positions(&self) -> &PositionCache {
        &self.positions
    }
}
