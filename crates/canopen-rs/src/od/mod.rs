// crates/canopen-rs/src/od/mod.rs

mod entry;
mod value;

pub use entry::{AccessType, DnInd, Object, SubObject, UpInd};
pub use value::{DataType, ObjectValue};

use crate::sdo::{SdoAbortCode, SdoRequest};
use alloc::collections::BTreeMap;
use log::trace;

/// The main object dictionary structure.
///
/// Entries are keyed by their 16-bit index; each entry holds its
/// sub-objects keyed by the 8-bit sub-index. Sub-index 0x00 is an ordinary
/// sub-object here — record objects store their "highest sub-index
/// supported" entry there explicitly.
#[derive(Debug, Default)]
pub struct ObjectDictionary {
    entries: BTreeMap<u16, Object>,
}

impl ObjectDictionary {
    /// Creates a new, empty object dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new object entry into the dictionary at a given index.
    pub fn insert(&mut self, index: u16, object: Object) {
        self.entries.insert(index, object);
    }

    pub fn find_obj(&self, index: u16) -> Option<&Object> {
        self.entries.get(&index)
    }

    pub fn find_obj_mut(&mut self, index: u16) -> Option<&mut Object> {
        self.entries.get_mut(&index)
    }

    pub fn find_sub(&self, index: u16, sub_index: u8) -> Option<&SubObject> {
        self.entries
            .get(&index)
            .and_then(|obj| obj.find_sub(sub_index))
    }

    pub fn find_sub_mut(&mut self, index: u16, sub_index: u8) -> Option<&mut SubObject> {
        self.entries
            .get_mut(&index)
            .and_then(|obj| obj.find_sub_mut(sub_index))
    }

    /// Reads a value from the object dictionary by index and sub-index.
    pub fn read(&self, index: u16, sub_index: u8) -> Option<&ObjectValue> {
        self.find_sub(index, sub_index).map(|sub| &sub.value)
    }

    // --- Start of Type-Safe Accessors ---
    pub fn read_u8(&self, index: u16, sub_index: u8) -> Option<u8> {
        self.read(index, sub_index).and_then(ObjectValue::as_u8)
    }

    pub fn read_u16(&self, index: u16, sub_index: u8) -> Option<u16> {
        self.read(index, sub_index).and_then(ObjectValue::as_u16)
    }

    pub fn read_u32(&self, index: u16, sub_index: u8) -> Option<u32> {
        self.read(index, sub_index).and_then(ObjectValue::as_u32)
    }

    pub fn read_u64(&self, index: u16, sub_index: u8) -> Option<u64> {
        self.read(index, sub_index).and_then(ObjectValue::as_u64)
    }
    // --- End of Type-Safe Accessors ---

    /// Overwrites the value cell of a sub-object, bypassing access rights
    /// and indications. Intended for service-internal commits after
    /// validation.
    pub fn write_internal(
        &mut self,
        index: u16,
        sub_index: u8,
        value: ObjectValue,
    ) -> Result<(), SdoAbortCode> {
        let sub = self
            .find_sub_mut(index, sub_index)
            .ok_or(SdoAbortCode::NoSub)?;
        sub.value = value;
        Ok(())
    }

    /// Public download entry point, as driven by an SDO server: resolves
    /// the target, checks access rights, and runs the download indication
    /// (or the default type-checked store).
    pub fn download(
        &mut self,
        index: u16,
        sub_index: u8,
        req: &SdoRequest,
    ) -> Result<(), SdoAbortCode> {
        let obj = self.entries.get_mut(&index).ok_or(SdoAbortCode::NoObj)?;
        let sub = obj.find_sub_mut(sub_index).ok_or(SdoAbortCode::NoSub)?;
        if !sub.access.can_write() {
            return Err(SdoAbortCode::NoWrite);
        }
        trace!("download of {} bytes to {:#06X}/{:#04X}", req.buf.len(), index, sub_index);
        sub.dn_ind(req)
    }

    /// Download entry point for the PDO machinery: the target has already
    /// been vetted by the PDO-legality check, so only the indication runs.
    pub(crate) fn dn_ind(
        &mut self,
        index: u16,
        sub_index: u8,
        req: &SdoRequest,
    ) -> Result<(), SdoAbortCode> {
        let sub = self
            .find_sub_mut(index, sub_index)
            .ok_or(SdoAbortCode::NoObj)?;
        sub.dn_ind(req)
    }

    /// Public upload entry point: resolves the target, checks access
    /// rights, and runs the upload indication (or the default load).
    pub fn upload(
        &mut self,
        index: u16,
        sub_index: u8,
        req: &mut SdoRequest,
    ) -> Result<(), SdoAbortCode> {
        let obj = self.entries.get_mut(&index).ok_or(SdoAbortCode::NoObj)?;
        let sub = obj.find_sub_mut(sub_index).ok_or(SdoAbortCode::NoSub)?;
        if !sub.access.can_read() {
            return Err(SdoAbortCode::NoRead);
        }
        sub.up_ind(req)
    }

    /// Upload entry point for the PDO machinery (target already vetted).
    pub(crate) fn up_ind(
        &mut self,
        index: u16,
        sub_index: u8,
        req: &mut SdoRequest,
    ) -> Result<(), SdoAbortCode> {
        let sub = self
            .find_sub_mut(index, sub_index)
            .ok_or(SdoAbortCode::NoObj)?;
        sub.up_ind(req)
    }
}
