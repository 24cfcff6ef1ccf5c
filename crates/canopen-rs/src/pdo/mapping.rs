// crates/canopen-rs/src/pdo/mapping.rs

//! Bit-granular (de)serialization between a flat PDO payload and the mapped
//! object dictionary values.
//!
//! A PDO payload is treated as a bit string: bit `k` is bit `k % 8` of byte
//! `k / 8`, values are written least-significant-bit first (little endian
//! across bytes). All accesses are bounds-checked against the payload; the
//! total mapped width of a PDO never exceeds `CAN_MAX_LEN * 8` bits.

use super::{PdoMapPar, PdoMapping};
use crate::device::Device;
use crate::od::DataType;
use crate::sdo::{SdoAbortCode, SdoRequest};
use crate::types::{CAN_MAX_LEN, CO_PDO_NUM_MAPS, UNSIGNED64};
use alloc::vec::Vec;

/// Writes the `width_bits` low bits of `value` into `dst` starting at
/// `offset_bits`, LSB first.
pub fn write_bits(
    dst: &mut [u8],
    offset_bits: usize,
    width_bits: usize,
    value: UNSIGNED64,
) -> Result<(), SdoAbortCode> {
    if width_bits > 64 || offset_bits + width_bits > dst.len() * 8 {
        return Err(SdoAbortCode::PdoLen);
    }
    for i in 0..width_bits {
        let pos = offset_bits + i;
        let mask = 1u8 << (pos % 8);
        if (value >> i) & 1 != 0 {
            dst[pos / 8] |= mask;
        } else {
            dst[pos / 8] &= !mask;
        }
    }
    Ok(())
}

/// Reads `width_bits` bits from `src` starting at `offset_bits`, LSB first.
pub fn read_bits(
    src: &[u8],
    offset_bits: usize,
    width_bits: usize,
) -> Result<UNSIGNED64, SdoAbortCode> {
    if width_bits > 64 || offset_bits + width_bits > src.len() * 8 {
        return Err(SdoAbortCode::PdoLen);
    }
    let mut value = 0;
    for i in 0..width_bits {
        let pos = offset_bits + i;
        if (src[pos / 8] >> (pos % 8)) & 1 != 0 {
            value |= 1 << i;
        }
    }
    Ok(value)
}

/// Sum of the mapped bit widths of `par`, or `PdoLen` for an oversized
/// mapping record.
pub(crate) fn total_bits(par: &PdoMapPar) -> Result<usize, SdoAbortCode> {
    if usize::from(par.n) > CO_PDO_NUM_MAPS {
        return Err(SdoAbortCode::PdoLen);
    }
    let mut bits = 0;
    for i in 1..=par.n {
        bits += par.mapping(i).len_bits();
    }
    Ok(bits)
}

/// Packs `values` into a PDO payload according to the mapping record.
///
/// `values[i]` is the (widened) value of descriptor `i + 1`; empty
/// descriptors advance by zero bits. Returns the number of payload bytes
/// written. Fails with `PdoLen` if the record is oversized, if the value
/// count does not match the record, or if the running bit offset would
/// exceed the PDO size; in the latter case the values already committed
/// remain written.
pub fn map(
    par: &PdoMapPar,
    values: &[UNSIGNED64],
    buf: &mut [u8; CAN_MAX_LEN],
) -> Result<usize, SdoAbortCode> {
    if usize::from(par.n) > CO_PDO_NUM_MAPS || values.len() != usize::from(par.n) {
        return Err(SdoAbortCode::PdoLen);
    }

    let mut offset = 0;
    for (i, value) in values.iter().enumerate() {
        let len = PdoMapping(par.map[i]).len_bits();
        write_bits(buf, offset, len, *value)?;
        offset += len;
    }
    Ok(offset.div_ceil(8))
}

/// Unpacks a PDO payload into one (widened) value per descriptor.
///
/// Empty descriptors produce a zero value. Fails with `PdoLen` if the
/// record is oversized or a descriptor would read past the payload.
pub fn unmap(par: &PdoMapPar, buf: &[u8]) -> Result<Vec<UNSIGNED64>, SdoAbortCode> {
    if usize::from(par.n) > CO_PDO_NUM_MAPS {
        return Err(SdoAbortCode::PdoLen);
    }

    let mut values = Vec::with_capacity(usize::from(par.n));
    let mut offset = 0;
    for i in 1..=par.n {
        let len = par.mapping(i).len_bits();
        values.push(read_bits(buf, offset, len)?);
        offset += len;
    }
    Ok(values)
}

/// Writes a received PDO payload into the object dictionary.
///
/// The payload must not be longer than a PDO (`CAN_MAX_LEN` bytes) and must
/// cover the total mapped width; otherwise the walk fails with `PdoLen`
/// before any download takes place. Every non-empty descriptor is
/// re-checked for RPDO legality; dummy targets swallow their slice, all
/// others receive it through their download indication. The first non-zero
/// abort code stops the walk.
pub fn dn(
    par: &PdoMapPar,
    dev: &mut Device,
    req: &mut SdoRequest,
    buf: &[u8],
) -> Result<(), SdoAbortCode> {
    if buf.len() > CAN_MAX_LEN {
        return Err(SdoAbortCode::PdoLen);
    }
    if total_bits(par)? > buf.len() * 8 {
        return Err(SdoAbortCode::PdoLen);
    }

    let mut offset = 0;
    for i in 1..=par.n {
        let mapping = par.mapping(i);
        if mapping.is_empty() {
            continue;
        }
        let len = mapping.len_bits();

        dev.chk_rpdo(mapping.index(), mapping.sub_index())?;

        // dummy mappings discard their payload slice
        if DataType::from_index(mapping.index()).is_some_and(DataType::is_basic) {
            offset += len;
            continue;
        }

        let value = read_bits(buf, offset, len)?;
        req.set(&value.to_le_bytes()[..len.div_ceil(8)]);
        dev.od.dn_ind(mapping.index(), mapping.sub_index(), req)?;
        offset += len;
    }
    Ok(())
}

/// Reads the mapped object dictionary values into a PDO payload (transmit
/// direction).
///
/// Each non-empty descriptor is checked for TPDO legality and read through
/// its upload indication. A PDO permits no partial transfers: an indication
/// that does not produce a complete single segment, or produces fewer bits
/// than mapped, fails the walk with `PdoLen`. Returns the number of payload
/// bytes produced.
pub fn up(
    par: &PdoMapPar,
    dev: &mut Device,
    req: &mut SdoRequest,
    buf: &mut [u8; CAN_MAX_LEN],
) -> Result<usize, SdoAbortCode> {
    if usize::from(par.n) > CO_PDO_NUM_MAPS {
        return Err(SdoAbortCode::PdoLen);
    }

    let mut offset = 0;
    for i in 1..=par.n {
        let mapping = par.mapping(i);
        if mapping.is_empty() {
            continue;
        }
        let len = mapping.len_bits();

        dev.chk_tpdo(mapping.index(), mapping.sub_index())?;

        req.clear();
        dev.od.up_ind(mapping.index(), mapping.sub_index(), req)?;
        if !req.is_first() || !req.is_last() {
            return Err(SdoAbortCode::PdoLen);
        }
        if req.buf.len() * 8 < len {
            return Err(SdoAbortCode::PdoLen);
        }

        let mut bytes = [0u8; 8];
        let n = req.buf.len().min(8);
        bytes[..n].copy_from_slice(&req.buf[..n]);
        write_bits(buf, offset, len, UNSIGNED64::from_le_bytes(bytes))?;
        offset += len;
    }
    Ok(offset.div_ceil(8))
}
