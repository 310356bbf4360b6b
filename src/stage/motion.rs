use log::{debug, info, warn};

use super::NanoDrive;
use crate::error::StageError;
use crate::madlib::MadlibInterface;
use crate::types::{Axis, Settle};
use crate::utils::{PollError, PollOutcome, poll_attempts};

impl<L: MadlibInterface> NanoDrive<L> {
    /// Command a new position without waiting for the actuator.
    ///
    /// The configured offset is added to `position_um` and the result must
    /// lie within `[0, max_travel]`; otherwise the call fails with
    /// [`StageError::OutOfRange`] and nothing is sent to the device.
    ///
    /// # Errors
    /// A non-success status from the library is logged and returned as
    /// [`StageError::Device`]; whether that is fatal is up to the caller.
    pub fn set_position(&mut self, axis: Axis, position_um: f64) -> Result<(), StageError> {
        let target = self.calibration.entry(axis).adjusted_target(axis, position_um)?;
        self.write(axis, target)
    }

    /// Command a new position, then poll reads until the axis settles.
    ///
    /// Each poll averages `samples` readings. Gives up after the configured
    /// number of attempts with a warning and the last reading
    /// (`settled == false`).
    pub fn set_position_and_wait(
        &mut self,
        axis: Axis,
        position_um: f64,
        samples: u32,
    ) -> Result<Settle, StageError> {
        if samples == 0 {
            return Err(StageError::InvalidSampleCount);
        }
        let entry = *self.calibration.entry(axis);
        let target = entry.adjusted_target(axis, position_um)?;
        self.write(axis, target)?;

        let max_attempts = self.motion.settle_attempts();
        let interval = self.motion.retry_interval();
        let cancel = self.cancel.clone();

        let first = self.get_position(axis, samples)?;
        let outcome = poll_attempts(
            first,
            |measured: &f64| entry.within_tolerance(target, *measured),
            || self.get_position(axis, samples),
            max_attempts,
            interval,
            cancel.as_ref(),
        );

        self.finish_settle(axis, target, outcome)
    }

    /// Command a new position with the combined write-and-read call and
    /// retry until the measurement is within tolerance.
    ///
    /// The first reading comes straight from the write. With `samples > 1`
    /// it is blended with an averaged read as
    /// `((n - 1) * averaged + immediate) / n`. After that, every retry waits
    /// the configured interval and reissues the write-and-read call, up to
    /// the configured attempt budget.
    ///
    /// # Returns
    /// The last measurement. If the budget runs out a warning is logged and
    /// the result has `settled == false`; this is not an error.
    ///
    /// # Errors
    /// - [`StageError::OutOfRange`] before any hardware call
    /// - [`StageError::Device`] as soon as the library reports an error,
    ///   including in the middle of the retry loop
    /// - [`StageError::Cancelled`] when the cancel token fires; the token is
    ///   cleared again so the next move runs normally
    pub fn set_verify_position(
        &mut self,
        axis: Axis,
        position_um: f64,
        samples: u32,
    ) -> Result<Settle, StageError> {
        if samples == 0 {
            return Err(StageError::InvalidSampleCount);
        }
        let entry = *self.calibration.entry(axis);
        let target = entry.adjusted_target(axis, position_um)?;

        let immediate = self.monitor(axis, target)?;
        let first = if samples > 1 {
            let averaged = self.get_position(axis, samples)?;
            let n = samples as f64;
            ((n - 1.0) * averaged + immediate) / n
        } else {
            immediate
        };
        self.positions.update(axis, first);

        let max_attempts = self.motion.settle_attempts();
        let interval = self.motion.retry_interval();
        let cancel = self.cancel.clone();

        let outcome = poll_attempts(
            first,
            |measured: &f64| entry.within_tolerance(target, *measured),
            || self.monitor(axis, target),
            max_attempts,
            interval,
            cancel.as_ref(),
        );

        self.finish_settle(axis, target, outcome)
    }

    fn write(&mut self, axis: Axis, target_um: f64) -> Result<(), StageError> {
        let (lib, handle) = self.session.parts()?;
        let status = lib.single_write(target_um, axis, handle);
        if status.is_success() {
            debug!("Axis {axis}: commanded {target_um} µm");
            Ok(())
        } else {
            warn!("Axis {axis}: write of {target_um} µm failed: {status}");
            Err(StageError::device("MCL_SingleWriteN", status))
        }
    }

    fn monitor(&mut self, axis: Axis, target_um: f64) -> Result<f64, StageError> {
        let (lib, handle) = self.session.parts()?;
        match lib.monitor(target_um, axis, handle).into_result("MCL_MonitorN") {
            Ok(position) => {
                debug!("Axis {axis}: commanded {target_um} µm, read {position} µm");
                self.positions.update(axis, position);
                Ok(position)
            }
            Err(e) => {
                warn!("Axis {axis}: write-and-read of {target_um} µm failed: {e}");
                Err(e)
            }
        }
    }

    fn finish_settle(
        &self,
        axis: Axis,
        target_um: f64,
        outcome: Result<PollOutcome<f64>, PollError<StageError>>,
    ) -> Result<Settle, StageError> {
        match outcome {
            Ok(PollOutcome {
                value,
                attempts,
                done,
            }) => {
                if done {
                    info!("Axis {axis}: settled at {value} µm after {attempts} retries");
                } else {
                    warn!(
                        "Axis {axis}: could not achieve target {target_um} µm after {attempts} attempts \
                         (last reading {value} µm)"
                    );
                }
                Ok(Settle {
                    axis,
                    target_um,
                    position_um: value,
                    attempts,
                    settled: done,
                })
            }
            Err(PollError::ConditionError(e)) => Err(e),
            Err(PollError::Cancelled) => {
                // A cancellation stops one settle, not every later move.
                if let Some(token) = &self.cancel {
                    token.reset();
                }
                let last_position_um = self.positions.get(axis).unwrap_or(f64::NAN);
                info!("Axis {axis}: settle cancelled at {last_position_um} µm");
                Err(StageError::Cancelled {
                    axis,
                    last_position_um,
                })
            }
        }
    }
}
