// crates/canopen-rs/src/od/value.rs

use crate::sdo::SdoAbortCode;
use crate::types::{
    BOOLEAN, INTEGER8, INTEGER16, INTEGER32, INTEGER64, REAL32, REAL64, UNSIGNED8, UNSIGNED16,
    UNSIGNED32, UNSIGNED64,
};
use alloc::{string::String, vec::Vec};

/// Static data type codes of the object dictionary (CiA 301, Table 44).
///
/// The numeric value doubles as the object dictionary index of the type
/// description object, which is what a dummy mapping entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DataType {
    Boolean = 0x0001,
    Integer8 = 0x0002,
    Integer16 = 0x0003,
    Integer32 = 0x0004,
    Unsigned8 = 0x0005,
    Unsigned16 = 0x0006,
    Unsigned32 = 0x0007,
    Real32 = 0x0008,
    VisibleString = 0x0009,
    OctetString = 0x000A,
    UnicodeString = 0x000B,
    TimeOfDay = 0x000C,
    TimeDifference = 0x000D,
    Domain = 0x000F,
    Integer24 = 0x0010,
    Real64 = 0x0011,
    Integer40 = 0x0012,
    Integer48 = 0x0013,
    Integer56 = 0x0014,
    Integer64 = 0x0015,
    Unsigned24 = 0x0016,
    Unsigned40 = 0x0018,
    Unsigned48 = 0x0019,
    Unsigned56 = 0x001A,
    Unsigned64 = 0x001B,
}

impl DataType {
    /// Resolves an object dictionary index to a static data type code.
    pub fn from_index(index: u16) -> Option<DataType> {
        Some(match index {
            0x0001 => Self::Boolean,
            0x0002 => Self::Integer8,
            0x0003 => Self::Integer16,
            0x0004 => Self::Integer32,
            0x0005 => Self::Unsigned8,
            0x0006 => Self::Unsigned16,
            0x0007 => Self::Unsigned32,
            0x0008 => Self::Real32,
            0x0009 => Self::VisibleString,
            0x000A => Self::OctetString,
            0x000B => Self::UnicodeString,
            0x000C => Self::TimeOfDay,
            0x000D => Self::TimeDifference,
            0x000F => Self::Domain,
            0x0010 => Self::Integer24,
            0x0011 => Self::Real64,
            0x0012 => Self::Integer40,
            0x0013 => Self::Integer48,
            0x0014 => Self::Integer56,
            0x0015 => Self::Integer64,
            0x0016 => Self::Unsigned24,
            0x0018 => Self::Unsigned40,
            0x0019 => Self::Unsigned48,
            0x001A => Self::Unsigned56,
            0x001B => Self::Unsigned64,
            _ => return None,
        })
    }

    /// The type code (and type description object index).
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// True for the basic (numeric) types that may serve as dummy mapping
    /// targets on the receive side.
    pub const fn is_basic(self) -> bool {
        !matches!(
            self,
            Self::VisibleString
                | Self::OctetString
                | Self::UnicodeString
                | Self::TimeOfDay
                | Self::TimeDifference
                | Self::Domain
        )
    }

    /// Size of a value of this type in bits, or `None` for types of
    /// variable length (strings, domains).
    pub const fn size_bits(self) -> Option<usize> {
        Some(match self {
            Self::Boolean => 1,
            Self::Integer8 | Self::Unsigned8 => 8,
            Self::Integer16 | Self::Unsigned16 => 16,
            Self::Integer24 | Self::Unsigned24 => 24,
            Self::Integer32 | Self::Unsigned32 | Self::Real32 => 32,
            Self::Integer40 | Self::Unsigned40 => 40,
            Self::Integer48 | Self::Unsigned48 | Self::TimeOfDay | Self::TimeDifference => 48,
            Self::Integer56 | Self::Unsigned56 => 56,
            Self::Integer64 | Self::Unsigned64 | Self::Real64 => 64,
            Self::VisibleString | Self::OctetString | Self::UnicodeString | Self::Domain => {
                return None;
            }
        })
    }

    /// Size of a value of this type in bytes (bits rounded up), or `None`
    /// for types of variable length.
    pub const fn size_bytes(self) -> Option<usize> {
        match self.size_bits() {
            Some(bits) => Some(bits.div_ceil(8)),
            None => None,
        }
    }
}

/// Represents any value that can be stored in an object dictionary entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Boolean(BOOLEAN),
    Integer8(INTEGER8),
    Integer16(INTEGER16),
    Integer32(INTEGER32),
    Integer64(INTEGER64),
    Unsigned8(UNSIGNED8),
    Unsigned16(UNSIGNED16),
    Unsigned32(UNSIGNED32),
    Unsigned64(UNSIGNED64),
    Real32(REAL32),
    Real64(REAL64),
    VisibleString(String),
    OctetString(Vec<u8>),
    Domain(Vec<u8>),
}

impl ObjectValue {
    /// The data type this value belongs to.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::Integer8(_) => DataType::Integer8,
            Self::Integer16(_) => DataType::Integer16,
            Self::Integer32(_) => DataType::Integer32,
            Self::Integer64(_) => DataType::Integer64,
            Self::Unsigned8(_) => DataType::Unsigned8,
            Self::Unsigned16(_) => DataType::Unsigned16,
            Self::Unsigned32(_) => DataType::Unsigned32,
            Self::Unsigned64(_) => DataType::Unsigned64,
            Self::Real32(_) => DataType::Real32,
            Self::Real64(_) => DataType::Real64,
            Self::VisibleString(_) => DataType::VisibleString,
            Self::OctetString(_) => DataType::OctetString,
            Self::Domain(_) => DataType::Domain,
        }
    }

    /// The zero/empty value of a data type. Returns `None` for types the
    /// value cell cannot represent.
    pub fn zero(data_type: DataType) -> Option<ObjectValue> {
        Some(match data_type {
            DataType::Boolean => Self::Boolean(false),
            DataType::Integer8 => Self::Integer8(0),
            DataType::Integer16 => Self::Integer16(0),
            DataType::Integer32 => Self::Integer32(0),
            DataType::Integer64 => Self::Integer64(0),
            DataType::Unsigned8 => Self::Unsigned8(0),
            DataType::Unsigned16 => Self::Unsigned16(0),
            DataType::Unsigned32 => Self::Unsigned32(0),
            DataType::Unsigned64 => Self::Unsigned64(0),
            DataType::Real32 => Self::Real32(0.0),
            DataType::Real64 => Self::Real64(0.0),
            DataType::VisibleString => Self::VisibleString(String::new()),
            DataType::OctetString => Self::OctetString(Vec::new()),
            DataType::Domain => Self::Domain(Vec::new()),
            _ => return None,
        })
    }

    /// Serializes the inner value into a little-endian byte vector.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Self::Boolean(v) => [u8::from(*v)].to_vec(),
            Self::Integer8(v) => v.to_le_bytes().to_vec(),
            Self::Integer16(v) => v.to_le_bytes().to_vec(),
            Self::Integer32(v) => v.to_le_bytes().to_vec(),
            Self::Integer64(v) => v.to_le_bytes().to_vec(),
            Self::Unsigned8(v) => v.to_le_bytes().to_vec(),
            Self::Unsigned16(v) => v.to_le_bytes().to_vec(),
            Self::Unsigned32(v) => v.to_le_bytes().to_vec(),
            Self::Unsigned64(v) => v.to_le_bytes().to_vec(),
            Self::Real32(v) => v.to_le_bytes().to_vec(),
            Self::Real64(v) => v.to_le_bytes().to_vec(),
            Self::VisibleString(v) => v.as_bytes().to_vec(),
            Self::OctetString(v) | Self::Domain(v) => v.clone(),
        }
    }

    /// Deserializes a little-endian byte slice into a value of `data_type`.
    ///
    /// The byte count must match the type size exactly for fixed-size
    /// types; too many bytes abort with [`SdoAbortCode::TypeLenHi`], too
    /// few with [`SdoAbortCode::TypeLenLo`]. Variable-length types accept
    /// any byte count.
    pub fn deserialize(data: &[u8], data_type: DataType) -> Result<ObjectValue, SdoAbortCode> {
        if let Some(size) = data_type.size_bytes() {
            if data.len() > size {
                return Err(SdoAbortCode::TypeLenHi);
            }
            if data.len() < size {
                return Err(SdoAbortCode::TypeLenLo);
            }
        }

        // Helper macro to handle fixed-size deserialization
        macro_rules! deserialize_fixed {
            ($data:expr, $variant:path, $type:ty) => {
                $data
                    .try_into()
                    .map(|bytes| $variant(<$type>::from_le_bytes(bytes)))
                    .map_err(|_| SdoAbortCode::TypeLen)
            };
        }

        match data_type {
            DataType::Boolean => Ok(Self::Boolean(data[0] & 1 != 0)),
            DataType::Integer8 => deserialize_fixed!(data, Self::Integer8, i8),
            DataType::Integer16 => deserialize_fixed!(data, Self::Integer16, i16),
            DataType::Integer32 => deserialize_fixed!(data, Self::Integer32, i32),
            DataType::Integer64 => deserialize_fixed!(data, Self::Integer64, i64),
            DataType::Unsigned8 => deserialize_fixed!(data, Self::Unsigned8, u8),
            DataType::Unsigned16 => deserialize_fixed!(data, Self::Unsigned16, u16),
            DataType::Unsigned32 => deserialize_fixed!(data, Self::Unsigned32, u32),
            DataType::Unsigned64 => deserialize_fixed!(data, Self::Unsigned64, u64),
            DataType::Real32 => deserialize_fixed!(data, Self::Real32, f32),
            DataType::Real64 => deserialize_fixed!(data, Self::Real64, f64),
            DataType::VisibleString => Ok(Self::VisibleString(
                String::from_utf8(data.to_vec()).map_err(|_| SdoAbortCode::Param)?,
            )),
            DataType::OctetString => Ok(Self::OctetString(data.to_vec())),
            DataType::Domain => Ok(Self::Domain(data.to_vec())),
            // The remaining (odd-width integer) types have no value cell
            // representation; nothing in this stack stores them directly.
            _ => Err(SdoAbortCode::TypeLen),
        }
    }

    // --- Start of Type-Safe Accessors ---
    pub fn as_u8(&self) -> Option<u8> {
        if let Self::Unsigned8(v) = self { Some(*v) } else { None }
    }

    pub fn as_u16(&self) -> Option<u16> {
        if let Self::Unsigned16(v) = self { Some(*v) } else { None }
    }

    pub fn as_u32(&self) -> Option<u32> {
        if let Self::Unsigned32(v) = self { Some(*v) } else { None }
    }

    pub fn as_u64(&self) -> Option<u64> {
        if let Self::Unsigned64(v) = self { Some(*v) } else { None }
    }
    // --- End of Type-Safe Accessors ---
}
