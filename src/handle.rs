use log::{debug, info, warn};

use crate::error::StageError;
use crate::madlib::MadlibInterface;
use crate::types::DeviceHandle;

/// Lifecycle of the one device handle a stage owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Acquired and not yet released.
    Acquired(DeviceHandle),
    /// Released through [`DeviceSession::close`] or drop.
    Released,
}

/// Owns the library binding together with the handle it handed out.
///
/// A session only exists once a valid handle was acquired, so "never
/// acquired" needs no release and "acquired" is released exactly once: by
/// [`close`](Self::close) or, failing that, on drop. Any early return during
/// stage initialization therefore cannot leak the handle.
pub struct DeviceSession<L: MadlibInterface> {
    lib: L,
    state: HandleState,
}

impl<L: MadlibInterface> DeviceSession<L> {
    /// Acquire the device handle.
    ///
    /// With `reuse_existing` the library's init-or-reuse call is used, which
    /// avoids stranding a handle left over from an earlier run of this
    /// process. An invalid handle fails with
    /// [`StageError::HandleUnavailable`] and no release is attempted.
    pub fn open(mut lib: L, reuse_existing: bool) -> Result<Self, StageError> {
        let handle = if reuse_existing {
            lib.init_handle_or_get_existing()
        } else {
            lib.init_handle()
        };

        if !handle.is_valid() {
            warn!("Madlib returned invalid handle {handle}; device not acquired");
            return Err(StageError::HandleUnavailable);
        }

        info!("Madlib handle initialized: handle = {handle}");
        Ok(Self {
            lib,
            state: HandleState::Acquired(handle),
        })
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    pub fn handle(&self) -> Result<DeviceHandle, StageError> {
        match self.state {
            HandleState::Acquired(handle) => Ok(handle),
            HandleState::Released => Err(StageError::Disconnected),
        }
    }

    /// Library binding plus the live handle, for issuing one call.
    pub fn parts(&mut self) -> Result<(&mut L, DeviceHandle), StageError> {
        let handle = self.handle()?;
        Ok((&mut self.lib, handle))
    }

    /// Release the handle. Later calls are no-ops.
    pub fn close(&mut self) {
        if let HandleState::Acquired(handle) = self.state {
            self.lib.release_handle(handle);
            self.state = HandleState::Released;
            info!("Madlib handle {handle} released");
        } else {
            debug!("Madlib handle already released");
        }
    }
}

impl<L: MadlibInterface> Drop for DeviceSession<L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::madlib::mock::{Call, ScriptedMadlib};

    fn releases(lib: &ScriptedMadlib) -> usize {
        lib.count(|c| matches!(c, Call::Release(_)))
    }

    #[test]
    fn test_prefers_init_or_reuse() {
        let lib = ScriptedMadlib::new();
        let session = DeviceSession::open(lib.clone(), true).unwrap();
        assert_eq!(session.state(), HandleState::Acquired(DeviceHandle(7)));
        assert_eq!(lib.calls(), vec![Call::InitHandleOrGetExisting]);
    }

    #[test]
    fn test_strict_init_when_reuse_disabled() {
        let lib = ScriptedMadlib::new();
        let _session = DeviceSession::open(lib.clone(), false).unwrap();
        assert_eq!(lib.calls(), vec![Call::InitHandle]);
    }

    #[test]
    fn test_invalid_handle_is_never_released() {
        let lib = ScriptedMadlib::new();
        lib.state().handle = DeviceHandle(0);
        let result = DeviceSession::open(lib.clone(), true);
        assert!(matches!(result, Err(StageError::HandleUnavailable)));
        assert_eq!(releases(&lib), 0);
    }

    #[test]
    fn test_close_then_drop_releases_once() {
        let lib = ScriptedMadlib::new();
        let mut session = DeviceSession::open(lib.clone(), true).unwrap();
        session.close();
        session.close();
        assert!(matches!(session.handle(), Err(StageError::Disconnected)));
        drop(session);
        assert_eq!(lib.calls().last(), Some(&Call::Release(DeviceHandle(7))));
        assert_eq!(releases(&lib), 1);
    }

    #[test]
    fn test_drop_releases() {
        let lib = ScriptedMadlib::new();
        drop(DeviceSession::open(lib.clone(), true).unwrap());
        assert_eq!(releases(&lib), 1);
    }
}
