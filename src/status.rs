use serde::Serialize;
use std::fmt;

/// Status codes returned by the Madlib library.
///
/// Every foreign call that reports success or failure does so with one of
/// these integers. Codes outside the documented table map to
/// [`ErrorCode::Unknown`] instead of faulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    Success,
    General,
    Device,
    NotAttached,
    Usage,
    NotReady,
    Argument,
    InvalidAxis,
    InvalidHandle,
    Unknown(i32),
}

static KNOWN: [(i32, ErrorCode, &str, &str); 9] = [
    (0, ErrorCode::Success, "MCL_SUCCESS", "Task has been completed successfully"),
    (
        -1,
        ErrorCode::General,
        "MCL_GENERAL_ERROR",
        "Errors generated by the Windows API or the device driver",
    ),
    (
        -2,
        ErrorCode::Device,
        "MCL_DEV_ERROR",
        "Problem communicating with the device over the transport",
    ),
    (
        -3,
        ErrorCode::NotAttached,
        "MCL_DEV_NOT_ATTACHED",
        "Device is no longer attached or responding",
    ),
    (
        -4,
        ErrorCode::Usage,
        "MCL_USAGE_ERROR",
        "Operation is not supported by this device or was used incorrectly",
    ),
    (
        -5,
        ErrorCode::NotReady,
        "MCL_DEV_NOT_READY",
        "Device is busy completing another task",
    ),
    (
        -6,
        ErrorCode::Argument,
        "MCL_ARGUMENT_ERROR",
        "An argument is out of range or a required pointer is null",
    ),
    (
        -7,
        ErrorCode::InvalidAxis,
        "MCL_INVALID_AXIS",
        "Operation requested an axis that does not exist on the device",
    ),
    (
        -8,
        ErrorCode::InvalidHandle,
        "MCL_INVALID_HANDLE",
        "Handle is not valid or has already been released",
    ),
];

impl ErrorCode {
    pub fn from_raw(code: i32) -> Self {
        KNOWN
            .iter()
            .find(|(raw, ..)| *raw == code)
            .map(|(_, variant, ..)| *variant)
            .unwrap_or(ErrorCode::Unknown(code))
    }

    /// Interpret a negative floating-point return as a status code.
    ///
    /// Calls such as `MCL_MonitorN` return either a position or a negated
    /// code in the same `f64`.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value >= i32::MIN as f64 {
            Self::from_raw(value as i32)
        } else {
            ErrorCode::Unknown(i32::MIN)
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            ErrorCode::Unknown(code) => *code,
            known => KNOWN
                .iter()
                .find(|(_, variant, ..)| variant == known)
                .map(|(raw, ..)| *raw)
                .unwrap_or(i32::MIN),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    pub fn name(&self) -> &'static str {
        self.entry().map(|entry| entry.2).unwrap_or("MCL_UNKNOWN_ERROR")
    }

    pub fn description(&self) -> &'static str {
        self.entry()
            .map(|entry| entry.3)
            .unwrap_or("Unrecognized status code returned by the library")
    }

    fn entry(&self) -> Option<&'static (i32, ErrorCode, &'static str, &'static str)> {
        match self {
            ErrorCode::Unknown(_) => None,
            known => KNOWN.iter().find(|(_, variant, ..)| variant == known),
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        ErrorCode::from_raw(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.raw(), self.description())
    }
}

/// Look up the name and description for a raw status code.
pub fn translate(code: i32) -> (&'static str, &'static str) {
    let code = ErrorCode::from_raw(code);
    (code.name(), code.description())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_code() {
        let (name, _) = translate(0);
        assert_eq!(name, "MCL_SUCCESS");
        assert!(ErrorCode::from_raw(0).is_success());
    }

    #[test]
    fn test_invalid_axis_code() {
        assert_eq!(ErrorCode::from_raw(-7), ErrorCode::InvalidAxis);
        assert_eq!(translate(-7).0, "MCL_INVALID_AXIS");
    }

    #[test]
    fn test_every_known_code_roundtrips_to_raw() {
        for code in (-8..=0).rev() {
            let parsed = ErrorCode::from_raw(code);
            assert!(!matches!(parsed, ErrorCode::Unknown(_)));
            assert_eq!(parsed.raw(), code);
        }
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        for code in [1, -9, 42, i32::MIN, i32::MAX] {
            let parsed = ErrorCode::from_raw(code);
            assert_eq!(parsed, ErrorCode::Unknown(code));
            assert_eq!(parsed.name(), "MCL_UNKNOWN_ERROR");
            assert_eq!(parsed.raw(), code);
        }
    }

    #[test]
    fn test_negative_float_codes() {
        assert_eq!(ErrorCode::from_f64(-5.0), ErrorCode::NotReady);
        assert_eq!(ErrorCode::from_f64(-3.0), ErrorCode::NotAttached);
        assert!(matches!(ErrorCode::from_f64(-0.25), ErrorCode::Unknown(_)));
        assert!(matches!(ErrorCode::from_f64(f64::NAN), ErrorCode::Unknown(_)));
    }

    #[test]
    fn test_display_includes_name_and_code() {
        let text = ErrorCode::InvalidHandle.to_string();
        assert!(text.contains("MCL_INVALID_HANDLE"));
        assert!(text.contains("-8"));
    }
}
