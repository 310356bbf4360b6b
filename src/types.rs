use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::error::StageError;
use crate::status::ErrorCode;

/// Opaque session token handed out by the library. Zero is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceHandle(pub i32);

impl DeviceHandle {
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three linear actuators of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X = 1,
    Y = 2,
    Z = 3,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Axis number as understood by the library.
    pub fn id(self) -> u32 {
        self as u32
    }

    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Axis::X),
            2 => Some(Axis::Y),
            3 => Some(Axis::Z),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" | "1" => Ok(Axis::X),
            "y" | "2" => Ok(Axis::Y),
            "z" | "3" => Ok(Axis::Z),
            other => Err(format!("unknown axis '{other}' (expected x, y or z)")),
        }
    }
}

/// Size of the packed product information record written by the library.
pub const PRODUCT_INFO_LEN: usize = 11;

/// Device description reported by `MCL_GetProductInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProductInfo {
    pub axis_bitmap: u8,
    pub adc_resolution: i16,
    pub dac_resolution: i16,
    pub product_id: i16,
    pub firmware_version: i16,
    pub firmware_profile: i16,
}

impl ProductInfo {
    /// Decode the 1-byte-packed record: one `u8` followed by five `i16`.
    pub fn parse(bytes: &[u8; PRODUCT_INFO_LEN]) -> Result<Self, StageError> {
        let mut cursor = Cursor::new(&bytes[..]);
        Ok(Self {
            axis_bitmap: cursor.read_u8()?,
            adc_resolution: cursor.read_i16::<LittleEndian>()?,
            dac_resolution: cursor.read_i16::<LittleEndian>()?,
            product_id: cursor.read_i16::<LittleEndian>()?,
            firmware_version: cursor.read_i16::<LittleEndian>()?,
            firmware_profile: cursor.read_i16::<LittleEndian>()?,
        })
    }

    /// Whether the bitmap reports the given axis as present.
    pub fn has_axis(&self, axis: Axis) -> bool {
        self.axis_bitmap & (1u8 << axis.index()) != 0
    }
}

/// A position-returning library call, resolved at the binding layer.
///
/// Reads and combined write-and-read calls share one `f64` return for
/// positions and status codes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Position(f64),
    Failed(ErrorCode),
}

impl Reading {
    /// Negative values are status codes, never positions.
    pub fn from_raw(value: f64) -> Self {
        if value < 0.0 {
            Reading::Failed(ErrorCode::from_f64(value))
        } else {
            Reading::Position(value)
        }
    }

    pub fn into_result(self, operation: &'static str) -> Result<f64, StageError> {
        match self {
            Reading::Position(value) => Ok(value),
            Reading::Failed(code) => Err(StageError::device(operation, code)),
        }
    }
}

/// Last measured position per axis, in micrometers.
///
/// Entries are only as fresh as the last read or settle iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PositionCache {
    positions: [Option<f64>; 3],
}

impl PositionCache {
    pub fn get(&self, axis: Axis) -> Option<f64> {
        self.positions[axis.index()]
    }

    pub fn update(&mut self, axis: Axis, position_um: f64) {
        self.positions[axis.index()] = Some(position_um);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL
            .into_iter()
            .filter_map(|axis| self.get(axis).map(|p| (axis, p)))
    }
}

/// Outcome of a move that waits for the stage to settle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Settle {
    pub axis: Axis,
    /// Offset-adjusted target that was transmitted.
    pub target_um: f64,
    /// Last measured position.
    pub position_um: f64,
    /// Retries spent after the initial command.
    pub attempts: u32,
    /// False when the retry budget ran out before reaching tolerance.
    pub settled: bool,
}

impl Settle {
    pub fn deviation_um(&self) -> f64 {
        (self.target_um - self.position_um).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_ids_and_names() {
        assert_eq!(Axis::X.id(), 1);
        assert_eq!(Axis::Z.id(), 3);
        assert_eq!(Axis::from_id(2), Some(Axis::Y));
        assert_eq!(Axis::from_id(0), None);
        assert_eq!("z".parse::<Axis>(), Ok(Axis::Z));
        assert!("w".parse::<Axis>().is_err());
    }

    #[test]
    fn test_product_info_packed_layout() {
        let bytes: [u8; PRODUCT_INFO_LEN] = [
            0b0000_0111, // axis bitmap
            0x14, 0x00, // ADC 20 bit
            0x14, 0x00, // DAC 20 bit
            0x03, 0x20, // product id 0x2003
            0x02, 0x00, // firmware version
            0xFF, 0xFF, // firmware profile -1
        ];
        let info = ProductInfo::parse(&bytes).unwrap();
        assert_eq!(info.axis_bitmap, 7);
        assert_eq!(info.adc_resolution, 20);
        assert_eq!(info.dac_resolution, 20);
        assert_eq!(info.product_id, 0x2003);
        assert_eq!(info.firmware_version, 2);
        assert_eq!(info.firmware_profile, -1);
        assert!(Axis::ALL.iter().all(|a| info.has_axis(*a)));
    }

    #[test]
    fn test_monitor_reading_sign_split() {
        assert_eq!(Reading::from_raw(12.5), Reading::Position(12.5));
        assert_eq!(Reading::from_raw(0.0), Reading::Position(0.0));
        assert_eq!(
            Reading::from_raw(-7.0),
            Reading::Failed(ErrorCode::InvalidAxis)
        );
    }

    #[test]
    fn test_position_cache() {
        let mut cache = PositionCache::default();
        assert_eq!(cache.get(Axis::Y), None);
        cache.update(Axis::Y, 4.2);
        assert_eq!(cache.get(Axis::Y), Some(4.2));
        assert_eq!(cache.iter().collect::<Vec<_>>(), vec![(Axis::Y, 4.2)]);
    }
}
