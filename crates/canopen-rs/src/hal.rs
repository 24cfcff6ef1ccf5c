// crates/canopen-rs/src/hal.rs

use crate::can::CanFrame;
use crate::sdo::SdoAbortCode;
use crate::types::PdoNumError;
use core::fmt;

/// Defines a portable, descriptive Error type for the CANopen stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanopenError {
    /// A PDO number is outside the valid range (1..=512).
    InvalidPdoNum(u16),
    /// A required object is missing from the object dictionary.
    MissingObject(u16),
    /// A SYNC counter value exceeds the maximum of 240.
    InvalidSyncCounter(u8),
    /// An allocation failed.
    NoMem,
    /// An object dictionary access was aborted.
    SdoAbort(SdoAbortCode),
    /// An underlying I/O error occurred.
    IoError,
}

impl fmt::Display for CanopenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPdoNum(n) => write!(f, "Invalid PDO number: {}", n),
            Self::MissingObject(idx) => {
                write!(f, "Object {:#06X} not found in the object dictionary", idx)
            }
            Self::InvalidSyncCounter(cnt) => write!(f, "Invalid SYNC counter value: {}", cnt),
            Self::NoMem => write!(f, "Out of memory"),
            Self::SdoAbort(ac) => write!(f, "SDO abort: {}", ac),
            Self::IoError => write!(f, "Underlying I/O error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CanopenError {}

// --- From Implementations for Error Conversion ---

impl From<SdoAbortCode> for CanopenError {
    fn from(ac: SdoAbortCode) -> Self {
        match ac {
            SdoAbortCode::NoMem => CanopenError::NoMem,
            _ => CanopenError::SdoAbort(ac),
        }
    }
}

impl From<PdoNumError> for CanopenError {
    fn from(err: PdoNumError) -> Self {
        match err {
            PdoNumError::InvalidRange(val) => CanopenError::InvalidPdoNum(val),
        }
    }
}

/// Hardware Abstraction Layer (HAL) for the CAN bus.
///
/// This trait abstracts the physical transmission of CAN frames, enabling
/// the core CANopen protocol logic to remain platform-agnostic (no_std).
/// Frame *reception* is push-based: the platform driver delivers every
/// received frame to the interested services (e.g. [`crate::pdo::Rpdo::recv`]),
/// which perform their own identifier filtering.
pub trait CanBus {
    /// Sends a single CAN frame over the bus.
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanopenError>;
}
