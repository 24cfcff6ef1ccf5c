// crates/canopen-rs/src/pdo/validator.rs

//! Legality rules for SDO downloads to the RPDO parameter objects
//! (0x1400..0x15FF and 0x1600..0x17FF).
//!
//! The rules are pure: they judge an *uncommitted* new value against the
//! currently committed record snapshots and the object dictionary. Both the
//! live service download path and the bulk configuration path apply them,
//! so a COB-ID change on a valid PDO is rejected everywhere. Only the
//! COB-ID sub-object accepts a rewrite of its current value as a special
//! case (which falls out of the rules below); every other field is judged
//! the same whether the value changes or not.

use super::{is_reserved_transmission, PdoCommPar, PdoMapPar, PdoMapping};
use crate::device::Device;
use crate::od::ObjectValue;
use crate::sdo::SdoAbortCode;
use crate::types::{CAN_MASK_BID, CAN_MASK_EID, CAN_MAX_LEN, CO_PDO_COBID_FRAME, CO_PDO_NUM_MAPS};
use log::{error, trace};

/// Validates a download of `value` to sub-index `sub_index` of an RPDO
/// communication parameter object whose committed state is `comm`.
pub(crate) fn chk_comm(
    comm: &PdoCommPar,
    sub_index: u8,
    value: &ObjectValue,
) -> Result<(), SdoAbortCode> {
    match sub_index {
        // highest sub-index supported
        0x00 => Err(SdoAbortCode::NoWrite),
        // COB-ID used by RPDO
        0x01 => {
            let cobid = value.as_u32().ok_or(SdoAbortCode::TypeLen)?;
            chk_cobid(comm, cobid)
        }
        // transmission type
        0x02 => {
            let trans = value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
            if is_reserved_transmission(trans) {
                trace!("rejecting reserved transmission type {:#04X}", trans);
                return Err(SdoAbortCode::ParamVal);
            }
            Ok(())
        }
        // inhibit time, only writable while the PDO is invalid
        0x03 => {
            value.as_u16().ok_or(SdoAbortCode::TypeLen)?;
            if comm.is_valid() {
                return Err(SdoAbortCode::ParamVal);
            }
            Ok(())
        }
        // compatibility entry, reserved
        0x04 => Err(SdoAbortCode::NoSub),
        // event timer
        0x05 => {
            value.as_u16().ok_or(SdoAbortCode::TypeLen)?;
            Ok(())
        }
        // SYNC start value (stored, ignored by the receive path)
        0x06 => {
            value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
            Ok(())
        }
        _ => Err(SdoAbortCode::NoSub),
    }
}

fn chk_cobid(comm: &PdoCommPar, cobid: u32) -> Result<(), SdoAbortCode> {
    let cobid_old = comm.cobid;

    // the CAN-ID cannot change while the PDO remains valid
    let valid = cobid & crate::types::CO_PDO_COBID_VALID == 0;
    let valid_old = cobid_old & crate::types::CO_PDO_COBID_VALID == 0;
    let canid = cobid & CAN_MASK_EID;
    let canid_old = cobid_old & CAN_MASK_EID;
    if valid && valid_old && canid != canid_old {
        trace!(
            "rejecting CAN-ID change {:#010X} -> {:#010X} on a valid RPDO",
            canid_old,
            canid
        );
        return Err(SdoAbortCode::ParamVal);
    }

    // a 29-bit CAN-ID is only allowed with the FRAME bit set
    if cobid & CO_PDO_COBID_FRAME == 0 && canid & !CAN_MASK_BID != 0 {
        return Err(SdoAbortCode::ParamVal);
    }

    Ok(())
}

/// Validates a download of `value` to sub-index `sub_index` of an RPDO
/// mapping parameter object whose committed state is `map` (with the
/// associated communication record `comm`).
pub(crate) fn chk_map(
    dev: &Device,
    comm: &PdoCommPar,
    map: &PdoMapPar,
    sub_index: u8,
    value: &ObjectValue,
) -> Result<(), SdoAbortCode> {
    match sub_index {
        // number of mapped application objects
        0x00 => {
            let n = value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
            if usize::from(n) > CO_PDO_NUM_MAPS {
                return Err(SdoAbortCode::ParamVal);
            }
            if comm.is_valid() {
                return Err(SdoAbortCode::ParamVal);
            }
            // activating the record re-validates every descriptor it
            // covers; the bit budget outranks the target check
            let mut bits = 0;
            for i in 1..=n {
                let mapping = map.mapping(i);
                if mapping.is_empty() {
                    continue;
                }
                bits += mapping.len_bits();
                if bits > CAN_MAX_LEN * 8 {
                    error!(
                        "RPDO mapping validation failed: {} mapped bits exceed the PDO size",
                        bits
                    );
                    return Err(SdoAbortCode::PdoLen);
                }
                dev.chk_rpdo(mapping.index(), mapping.sub_index())?;
            }
            Ok(())
        }
        // a mapping descriptor; only writable while the record is disabled
        // and the PDO is invalid
        0x01..=0x40 => {
            let raw = value.as_u32().ok_or(SdoAbortCode::TypeLen)?;
            if map.n != 0 || comm.is_valid() {
                return Err(SdoAbortCode::ParamVal);
            }
            let mapping = PdoMapping(raw);
            if !mapping.is_empty() {
                dev.chk_rpdo(mapping.index(), mapping.sub_index())?;
            }
            Ok(())
        }
        _ => Err(SdoAbortCode::NoSub),
    }
}
