// crates/canopen-rs/src/sdo.rs

use alloc::vec::Vec;
use core::fmt;

/// SDO abort codes (CiA 301, Table 22).
///
/// This is the closed set of failure causes surfaced by object dictionary
/// accesses and PDO (re)configuration. The numeric values are the exact
/// 32-bit codes that appear on the wire in an SDO abort transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SdoAbortCode {
    /// SDO protocol timed out.
    Timeout = 0x0504_0000,
    /// Out of memory.
    NoMem = 0x0504_0005,
    /// Unsupported access to an object.
    NoAccess = 0x0601_0000,
    /// Attempt to read a write only object.
    NoRead = 0x0601_0001,
    /// Attempt to write a read only object.
    NoWrite = 0x0601_0002,
    /// Object does not exist in the object dictionary.
    NoObj = 0x0602_0000,
    /// Object cannot be mapped to the PDO.
    NoPdo = 0x0604_0041,
    /// The number and length of the objects to be mapped would exceed the PDO length.
    PdoLen = 0x0604_0042,
    /// General parameter incompatibility reason.
    Param = 0x0604_0043,
    /// General internal incompatibility in the device.
    Compat = 0x0604_0047,
    /// Access failed due to a hardware error.
    Hardware = 0x0606_0000,
    /// Data type does not match, length of service parameter does not match.
    TypeLen = 0x0607_0010,
    /// Data type does not match, length of service parameter too high.
    TypeLenHi = 0x0607_0012,
    /// Data type does not match, length of service parameter too low.
    TypeLenLo = 0x0607_0013,
    /// Sub-index does not exist.
    NoSub = 0x0609_0011,
    /// Invalid value for parameter (download only).
    ParamVal = 0x0609_0030,
    /// Value of parameter written too high (download only).
    ParamHi = 0x0609_0031,
    /// Value of parameter written too low (download only).
    ParamLo = 0x0609_0032,
    /// Maximum value is less than minimum value.
    ParamRange = 0x0609_0036,
    /// General error.
    Error = 0x0800_0000,
    /// Data cannot be transferred or stored to the application.
    NoData = 0x0800_0020,
    /// No data available.
    NoVal = 0x0800_0024,
}

impl SdoAbortCode {
    /// The 32-bit abort code as transmitted on the wire.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for SdoAbortCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let desc = match self {
            Self::Timeout => "SDO protocol timed out",
            Self::NoMem => "Out of memory",
            Self::NoAccess => "Unsupported access to an object",
            Self::NoRead => "Attempt to read a write only object",
            Self::NoWrite => "Attempt to write a read only object",
            Self::NoObj => "Object does not exist in the object dictionary",
            Self::NoPdo => "Object cannot be mapped to the PDO",
            Self::PdoLen => "The number and length of the objects to be mapped would exceed the PDO length",
            Self::Param => "General parameter incompatibility reason",
            Self::Compat => "General internal incompatibility in the device",
            Self::Hardware => "Access failed due to a hardware error",
            Self::TypeLen => "Data type does not match, length of service parameter does not match",
            Self::TypeLenHi => "Data type does not match, length of service parameter too high",
            Self::TypeLenLo => "Data type does not match, length of service parameter too low",
            Self::NoSub => "Sub-index does not exist",
            Self::ParamVal => "Invalid value for parameter",
            Self::ParamHi => "Value of parameter written too high",
            Self::ParamLo => "Value of parameter written too low",
            Self::ParamRange => "Maximum value is less than minimum value",
            Self::Error => "General error",
            Self::NoData => "Data cannot be transferred or stored to the application",
            Self::NoVal => "No data available",
        };
        write!(f, "{} ({:#010X})", desc, self.code())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SdoAbortCode {}

/// A single SDO transfer segment.
///
/// The PDO machinery reuses the SDO upload/download indication interface of
/// the object dictionary, so mapped values travel through this scratch
/// buffer. A PDO permits no partial transfers: a request consumed or
/// produced by the mapping codec must be exactly one segment (first and
/// last at once).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdoRequest {
    /// Total size of the value being transferred, in bytes.
    pub size: usize,
    /// Offset of this segment within the transfer.
    pub offset: usize,
    /// The bytes of this segment.
    pub buf: Vec<u8>,
}

impl SdoRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the request to a complete single-segment transfer of `data`.
    pub fn set(&mut self, data: &[u8]) {
        self.size = data.len();
        self.offset = 0;
        self.buf.clear();
        self.buf.extend_from_slice(data);
    }

    pub fn clear(&mut self) {
        self.size = 0;
        self.offset = 0;
        self.buf.clear();
    }

    /// True if this segment is the first of the transfer.
    pub fn is_first(&self) -> bool {
        self.offset == 0
    }

    /// True if this segment completes the transfer.
    pub fn is_last(&self) -> bool {
        self.offset + self.buf.len() >= self.size
    }
}
