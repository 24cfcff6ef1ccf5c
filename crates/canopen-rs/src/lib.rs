#![cfg_attr(not(feature = "std"), no_std)]

//! Platform-agnostic core of a CANopen (CiA 301) protocol stack: the object
//! dictionary, the PDO mapping machinery and the Receive-PDO service.
//!
//! All platform I/O is reached through the traits in [`hal`]; the services
//! are driven explicitly with caller-supplied microsecond timestamps and
//! are meant to run on a single executor.

// 'alloc' is used for dynamic allocation (e.g., the object dictionary)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod can;
pub mod hal;

// --- Higher Layers ---
pub mod device;
pub mod od;
pub mod pdo;
pub mod sdo;

// --- Top-level Exports ---
pub use can::{CanFlags, CanFrame};
pub use device::Device;
pub use hal::{CanBus, CanopenError};
pub use pdo::{Rpdo, RpdoErr, RpdoInd};
pub use sdo::SdoAbortCode;
pub use types::PdoNum;
