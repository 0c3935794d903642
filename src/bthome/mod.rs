//! BTHome v2 wire format.
//!
//! Service data layout (little-endian throughout):
//!
//! ```text
//! plaintext:  ┌──────────┬─────────────┬─────────────────────────────┐
//!             │ UUID (2B)│ dev info(1B)│ {object id (1B) │ value}*   │
//!             └──────────┴─────────────┴─────────────────────────────┘
//! encrypted:  ┌──────────┬─────────────┬────────────┬────────┬───────┐
//!             │ UUID (2B)│ dev info(1B)│ ciphertext │ ctr 4B │ MIC 4B│
//!             └──────────┴─────────────┴────────────┴────────┴───────┘
//! ```
//!
//! See <https://bthome.io/format/>.

pub mod cipher;
pub mod payload;
pub mod replay;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Service constants ─────────────────────────────────────────

/// 16-bit service UUID assigned to BTHome.
pub const SERVICE_UUID: u16 = 0xFCD2;

/// Device-info bit 0: payload is AES-CCM encrypted.
pub const DEVICE_INFO_ENCRYPTED: u8 = 0x01;
/// Device-info bit 2: irregular, trigger-based advertising interval.
pub const DEVICE_INFO_TRIGGER_BASED: u8 = 0x04;
/// Device-info bits 5-7: format version 2.
pub const DEVICE_INFO_VERSION_2: u8 = 0x40;
const DEVICE_INFO_VERSION_MASK: u8 = 0xE0;

/// UUID (2) + device info (1).
pub const HEADER_LEN: usize = 3;
/// Replay counter appended to encrypted frames.
pub const COUNTER_LEN: usize = 4;
/// AES-CCM message integrity check length.
pub const MIC_LEN: usize = 4;

/// Service-data budget left after the flags record and the service-data
/// record header inside a 31-byte legacy advertisement.
pub const ADV_PAYLOAD_BUDGET: usize = 26;

/// Device-info byte for this beacon: always v2, always trigger based.
pub const fn device_info(encrypted: bool) -> u8 {
    let base = DEVICE_INFO_VERSION_2 | DEVICE_INFO_TRIGGER_BASED;
    if encrypted { base | DEVICE_INFO_ENCRYPTED } else { base }
}

/// Extract the format version from a device-info byte.
pub const fn device_info_version(info: u8) -> u8 {
    (info & DEVICE_INFO_VERSION_MASK) >> 5
}

// ── Object ids ────────────────────────────────────────────────

/// The subset of BTHome object ids this beacon reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectId {
    PacketId = 0x00,
    Battery = 0x01,
    /// Voltage, uint16, factor 0.001 V.
    VoltageThousandth = 0x0C,
    /// Voltage, uint16, factor 0.1 V.
    VoltageTenth = 0x4A,
    Button = 0x3A,
}

impl ObjectId {
    /// Size of the object's value in bytes (excluding the id byte).
    pub const fn value_len(self) -> usize {
        match self {
            Self::PacketId | Self::Battery | Self::Button => 1,
            Self::VoltageThousandth | Self::VoltageTenth => 2,
        }
    }
}

impl TryFrom<u8> for ObjectId {
    type Error = u8;

    fn try_from(raw: u8) -> Result<Self, u8> {
        match raw {
            0x00 => Ok(Self::PacketId),
            0x01 => Ok(Self::Battery),
            0x0C => Ok(Self::VoltageThousandth),
            0x4A => Ok(Self::VoltageTenth),
            0x3A => Ok(Self::Button),
            other => Err(other),
        }
    }
}

// ── Voltage resolution ────────────────────────────────────────

/// Which voltage object the beacon reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoltageResolution {
    /// Object 0x0C, millivolts.
    Thousandth,
    /// Object 0x4A, tenths of a volt.
    Tenth,
}

impl VoltageResolution {
    pub const fn object_id(self) -> ObjectId {
        match self {
            Self::Thousandth => ObjectId::VoltageThousandth,
            Self::Tenth => ObjectId::VoltageTenth,
        }
    }

    /// Convert a millivolt reading into the wire value for this object.
    pub const fn encode_mv(self, mv: u16) -> u16 {
        match self {
            Self::Thousandth => mv,
            Self::Tenth => mv / 100,
        }
    }

    /// Convert a wire value back into millivolts (saturating).
    pub const fn decode_mv(self, raw: u16) -> u16 {
        match self {
            Self::Thousandth => raw,
            Self::Tenth => raw.saturating_mul(100),
        }
    }
}

// ── Button codes ──────────────────────────────────────────────

/// BTHome button event values (object 0x3A).
///
/// `None` doubles as "no button changed": battery-only updates are queued
/// with it, and it is valid regardless of the configured button count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ButtonCode {
    #[default]
    None = 0x00,
    Press = 0x01,
    DoublePress = 0x02,
    TriplePress = 0x03,
    LongPress = 0x04,
    LongDoublePress = 0x05,
    LongTriplePress = 0x06,
    HoldPress = 0x80,
}

impl ButtonCode {
    pub const ALL: [Self; 8] = [
        Self::None,
        Self::Press,
        Self::DoublePress,
        Self::TriplePress,
        Self::LongPress,
        Self::LongDoublePress,
        Self::LongTriplePress,
        Self::HoldPress,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn is_none(self) -> bool {
        matches!(self, Self::None)
    }
}

impl TryFrom<u8> for ButtonCode {
    type Error = Error;

    fn try_from(raw: u8) -> Result<Self, Error> {
        match raw {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::Press),
            0x02 => Ok(Self::DoublePress),
            0x03 => Ok(Self::TriplePress),
            0x04 => Ok(Self::LongPress),
            0x05 => Ok(Self::LongDoublePress),
            0x06 => Ok(Self::LongTriplePress),
            0x80 => Ok(Self::HoldPress),
            _ => Err(Error::InvalidArgument("unrecognised button code")),
        }
    }
}

impl fmt::Display for ButtonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Press => "press",
            Self::DoublePress => "double_press",
            Self::TriplePress => "triple_press",
            Self::LongPress => "long_press",
            Self::LongDoublePress => "long_double_press",
            Self::LongTriplePress => "long_triple_press",
            Self::HoldPress => "hold_press",
        };
        f.write_str(name)
    }
}
