// crates/canopen-rs/src/od/entry.rs

use super::value::{DataType, ObjectValue};
use crate::sdo::{SdoAbortCode, SdoRequest};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use core::fmt;

/// Defines the access rights for an object dictionary sub-object.
/// (CiA 301, Table 43)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    /// read only access, value is constant
    Const,
    /// read only access
    ReadOnly,
    /// write only access
    WriteOnly,
    /// read and write access
    ReadWrite,
    /// read and write access on process input (TPDO direction only)
    ReadWriteRead,
    /// read and write access on process output (RPDO direction only)
    ReadWriteWrite,
}

impl AccessType {
    pub const fn can_read(self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    pub const fn can_write(self) -> bool {
        !matches!(self, Self::Const | Self::ReadOnly)
    }
}

/// A download indication: invoked instead of the default store when a value
/// is written into the sub-object. The indication is responsible for
/// validating the request and committing the value.
pub type DnInd = Box<dyn FnMut(&mut SubObject, &SdoRequest) -> Result<(), SdoAbortCode>>;

/// An upload indication: invoked instead of the default load when the value
/// of the sub-object is read. The indication fills the request with the
/// value bytes (and may produce a partial segment).
pub type UpInd = Box<dyn FnMut(&SubObject, &mut SdoRequest) -> Result<(), SdoAbortCode>>;

/// A single sub-object of an object dictionary entry: data type, access
/// rights, PDO mapping permission, the value cell and the optional
/// download/upload indications.
pub struct SubObject {
    pub data_type: DataType,
    pub access: AccessType,
    /// Whether this sub-object may be mapped into a PDO.
    pub pdo_mapping: bool,
    pub value: ObjectValue,
    dn_ind: Option<DnInd>,
    up_ind: Option<UpInd>,
}

impl fmt::Debug for SubObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubObject")
            .field("data_type", &self.data_type)
            .field("access", &self.access)
            .field("pdo_mapping", &self.pdo_mapping)
            .field("value", &self.value)
            .field("dn_ind", &self.dn_ind.as_ref().map(|_| "<fn>"))
            .field("up_ind", &self.up_ind.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl SubObject {
    /// Creates a read/write sub-object holding `value`, with PDO mapping
    /// disallowed.
    pub fn new(value: ObjectValue) -> Self {
        SubObject {
            data_type: value.data_type(),
            access: AccessType::ReadWrite,
            pdo_mapping: false,
            value,
            dn_ind: None,
            up_ind: None,
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_pdo_mapping(mut self, allowed: bool) -> Self {
        self.pdo_mapping = allowed;
        self
    }

    /// Installs a download indication, replacing the default store.
    pub fn set_dn_ind(&mut self, ind: Option<DnInd>) {
        self.dn_ind = ind;
    }

    /// Installs an upload indication, replacing the default load.
    pub fn set_up_ind(&mut self, ind: Option<UpInd>) {
        self.up_ind = ind;
    }

    /// Runs the download indication for this sub-object.
    ///
    /// Access rights are the caller's concern; this entry point only
    /// enforces the value contract (type length for the default store, or
    /// whatever the installed indication decides).
    pub fn dn_ind(&mut self, req: &SdoRequest) -> Result<(), SdoAbortCode> {
        if let Some(mut ind) = self.dn_ind.take() {
            let res = ind(self, req);
            self.dn_ind = Some(ind);
            return res;
        }
        self.dn(req)
    }

    /// The default download behavior: decode the request against the
    /// declared data type and store the value.
    pub fn dn(&mut self, req: &SdoRequest) -> Result<(), SdoAbortCode> {
        let value = ObjectValue::deserialize(&req.buf, self.data_type)?;
        self.value = value;
        Ok(())
    }

    /// Runs the upload indication for this sub-object, filling `req`.
    pub fn up_ind(&mut self, req: &mut SdoRequest) -> Result<(), SdoAbortCode> {
        if let Some(mut ind) = self.up_ind.take() {
            let res = ind(self, req);
            self.up_ind = Some(ind);
            return res;
        }
        self.up(req)
    }

    /// The default upload behavior: serialize the stored value into `req`
    /// as a single segment.
    pub fn up(&self, req: &mut SdoRequest) -> Result<(), SdoAbortCode> {
        req.set(&self.value.serialize());
        Ok(())
    }
}

/// A single entry of the object dictionary: an index worth of sub-objects.
#[derive(Debug, Default)]
pub struct Object {
    subs: BTreeMap<u8, SubObject>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record-style construction: inserts a sub-object at `sub_index`.
    #[must_use]
    pub fn with_sub(mut self, sub_index: u8, sub: SubObject) -> Self {
        self.subs.insert(sub_index, sub);
        self
    }

    pub fn insert_sub(&mut self, sub_index: u8, sub: SubObject) {
        self.subs.insert(sub_index, sub);
    }

    pub fn find_sub(&self, sub_index: u8) -> Option<&SubObject> {
        self.subs.get(&sub_index)
    }

    pub fn find_sub_mut(&mut self, sub_index: u8) -> Option<&mut SubObject> {
        self.subs.get_mut(&sub_index)
    }

    pub fn sub_indices(&self) -> impl Iterator<Item = u8> + '_ {
        self.subs.keys().copied()
    }
}
