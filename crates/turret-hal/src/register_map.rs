//! Fixed bus addresses and encoder register layouts.
//!
//! | Device | Address | Notes |
//! |---|---|---|
//! | Multiplexer | `0x70` | Control byte = channel index; `0` is written back after every read sequence. |
//! | Angle encoder | `0x36` | Every encoder answers on the same address; the multiplexer picks one. |
//!
//! Two register layouts are in circulation for the encoder and neither is
//! inferred at runtime; the deployment picks one through
//! [`RegisterMapKind`]:
//!
//! | Kind | High / low register | Mask | Degrees per count |
//! |---|---|---|---|
//! | [`RegisterMapKind::RawAngle`] (default) | `0x0C` / `0x0D` | `0x0FFF` | `360 / 4096` |
//! | [`RegisterMapKind::AngleUnscaled`] | `0x0E` / `0x0F` | `0xFFFF` | `1.0` |

use serde::{Deserialize, Serialize};

/// Bus address of the encoder multiplexer.
pub const MUX_ADDRESS: u8 = 0x70;

/// Bus address shared by every angle encoder.
pub const ENCODER_ADDRESS: u8 = 0x36;

/// Control byte written to the multiplexer when no read is in progress.
pub const MUX_IDLE: u8 = 0;

/// Deployment-selected encoder register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegisterMapKind {
    /// 12-bit raw angle at `0x0C`/`0x0D`, scaled to degrees.
    #[default]
    RawAngle,
    /// Angle register pair at `0x0E`/`0x0F`, used as degrees directly.
    AngleUnscaled,
}

/// Where the angle lives on the encoder and how counts become degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterMap {
    pub high_register: u8,
    pub low_register: u8,
    pub mask: u16,
    pub degrees_per_count: f32,
}

impl RegisterMap {
    pub const RAW_ANGLE: RegisterMap = RegisterMap {
        high_register: 0x0C,
        low_register: 0x0D,
        mask: 0x0FFF,
        degrees_per_count: 360.0 / 4096.0,
    };

    pub const ANGLE_UNSCALED: RegisterMap = RegisterMap {
        high_register: 0x0E,
        low_register: 0x0F,
        mask: 0xFFFF,
        degrees_per_count: 1.0,
    };

    /// Combine the two register bytes into a masked count.
    pub fn combine(&self, high: u8, low: u8) -> u16 {
        u16::from_be_bytes([high, low]) & self.mask
    }

    /// Convert a masked count into (un-normalized) degrees.
    pub fn to_degrees(&self, counts: u16) -> f32 {
        f32::from(counts & self.mask) * self.degrees_per_count
    }

    /// Nearest count for `degrees` in `[0, 360)`; the inverse of
    /// [`to_degrees`][Self::to_degrees], used by simulated encoders.
    pub fn to_counts(&self, degrees: f32) -> u16 {
        let counts = (degrees / self.degrees_per_count).round();
        let max = f32::from(self.mask);
        if counts > max {
            // 360° wraps to zero on a full-resolution encoder.
            0
        } else {
            counts.max(0.0) as u16
        }
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        RegisterMap::RAW_ANGLE
    }
}

impl From<RegisterMapKind> for RegisterMap {
    fn from(kind: RegisterMapKind) -> Self {
        match kind {
            RegisterMapKind::RawAngle => RegisterMap::RAW_ANGLE,
            RegisterMapKind::AngleUnscaled => RegisterMap::ANGLE_UNSCALED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_angle_half_turn() {
        let map = RegisterMap::RAW_ANGLE;
        let counts = map.combine(0x08, 0x00);
        assert_eq!(counts, 2048);
        assert!((map.to_degrees(counts) - 180.0).abs() < f32::EPSILON);
    }

    #[test]
    fn raw_angle_masks_reserved_high_bits() {
        let map = RegisterMap::RAW_ANGLE;
        assert_eq!(map.combine(0xF8, 0x00), 2048);
    }

    #[test]
    fn unscaled_map_reads_degrees_directly() {
        let map = RegisterMap::ANGLE_UNSCALED;
        let counts = map.combine(0x01, 0x2C);
        assert_eq!(counts, 300);
        assert!((map.to_degrees(counts) - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn to_counts_inverts_to_degrees() {
        let map = RegisterMap::RAW_ANGLE;
        assert_eq!(map.to_counts(180.0), 2048);
        assert_eq!(map.to_counts(0.0), 0);
        assert_eq!(map.to_counts(359.99), 0);
        assert_eq!(RegisterMap::ANGLE_UNSCALED.to_counts(42.4), 42);
    }

    #[test]
    fn kind_selects_the_documented_registers() {
        let raw: RegisterMap = RegisterMapKind::RawAngle.into();
        assert_eq!((raw.high_register, raw.low_register), (0x0C, 0x0D));
        let unscaled: RegisterMap = RegisterMapKind::AngleUnscaled.into();
        assert_eq!((unscaled.high_register, unscaled.low_register), (0x0E, 0x0F));
        assert_eq!(RegisterMapKind::default(), RegisterMapKind::RawAngle);
    }
}
