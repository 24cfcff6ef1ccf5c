// crates/canopen-rs/src/device.rs

use crate::od::{AccessType, DataType, Object, ObjectDictionary, ObjectValue, SubObject};
use crate::pdo::{validator, PdoCommPar, PdoMapPar};
use crate::sdo::SdoAbortCode;
use crate::types::{PdoNum, CO_PDO_COBID_VALID, CO_PDO_NUM_MAPS};
use log::trace;

/// A CANopen device: the object dictionary plus the device-wide dummy-entry
/// mask.
///
/// The dummy mask has one bit per static data type code; a set bit `k`
/// makes type code `k` a legal, storageless RPDO mapping target (the mapped
/// payload bits are discarded on reception). The mask is expected to be
/// configured once at startup.
#[derive(Debug, Default)]
pub struct Device {
    pub od: ObjectDictionary,
    dummy: u32,
}

impl Device {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the dummy-entry mask.
    pub fn set_dummy(&mut self, mask: u32) {
        self.dummy = mask;
    }

    pub fn dummy(&self) -> u32 {
        self.dummy
    }

    fn dummy_enabled(&self, data_type: DataType) -> bool {
        self.dummy & (1u32 << data_type.code()) != 0
    }

    /// Checks whether `(index, sub_index)` is a legal RPDO mapping target:
    /// either an enabled dummy entry, or an existing sub-object that is
    /// write-accessible and PDO-mappable in the receive direction.
    pub fn chk_rpdo(&self, index: u16, sub_index: u8) -> Result<(), SdoAbortCode> {
        if let Some(data_type) = DataType::from_index(index) {
            if data_type.is_basic() {
                return if sub_index == 0 && self.dummy_enabled(data_type) {
                    Ok(())
                } else {
                    Err(SdoAbortCode::NoObj)
                };
            }
        }
        let obj = self.od.find_obj(index).ok_or(SdoAbortCode::NoObj)?;
        let sub = obj.find_sub(sub_index).ok_or(SdoAbortCode::NoSub)?;
        if !sub.access.can_write() {
            return Err(SdoAbortCode::NoWrite);
        }
        // RWR sub-objects belong to the process-input (transmit) direction
        if !sub.pdo_mapping || sub.access == AccessType::ReadWriteRead {
            return Err(SdoAbortCode::NoPdo);
        }
        Ok(())
    }

    /// Checks whether `(index, sub_index)` is a legal TPDO mapping target.
    /// Dummy entries carry no data and are never legal on the transmit side.
    pub fn chk_tpdo(&self, index: u16, sub_index: u8) -> Result<(), SdoAbortCode> {
        if DataType::from_index(index).is_some_and(DataType::is_basic) {
            return Err(SdoAbortCode::NoObj);
        }
        let obj = self.od.find_obj(index).ok_or(SdoAbortCode::NoObj)?;
        let sub = obj.find_sub(sub_index).ok_or(SdoAbortCode::NoSub)?;
        if !sub.access.can_read() {
            return Err(SdoAbortCode::NoRead);
        }
        // RWW sub-objects belong to the process-output (receive) direction
        if !sub.pdo_mapping || sub.access == AccessType::ReadWriteWrite {
            return Err(SdoAbortCode::NoPdo);
        }
        Ok(())
    }

    /// Configures RPDO number `num` from complete parameter records, the
    /// way a configuration file is applied: the PDO is deactivated first,
    /// both records are written through the same validation the SDO path
    /// uses, and the PDO is re-enabled only if the supplied COB-ID is
    /// valid.
    pub fn cfg_rpdo(
        &mut self,
        num: u16,
        comm: &PdoCommPar,
        map: &PdoMapPar,
    ) -> Result<(), SdoAbortCode> {
        let pdo = PdoNum::try_from(num).map_err(|_| SdoAbortCode::NoObj)?;

        // deactivate while reconfiguring
        let mut disabled = *comm;
        disabled.cobid |= CO_PDO_COBID_VALID;
        if disabled.n == 0 {
            disabled.n = 1;
        }
        self.cfg_pdo_comm(pdo.comm_index(), &disabled)?;
        self.cfg_pdo_map(pdo.map_index(), pdo.comm_index(), map)?;

        if comm.cobid & CO_PDO_COBID_VALID == 0 {
            self.cfg_comm_sub(pdo.comm_index(), 0x01, comm)?;
        }
        trace!("configured RPDO {}", num);
        Ok(())
    }

    /// Writes the RPDO communication parameter record of PDO `num`,
    /// validating every field like an SDO download would.
    pub fn cfg_rpdo_comm(&mut self, num: u16, par: &PdoCommPar) -> Result<(), SdoAbortCode> {
        let pdo = PdoNum::try_from(num).map_err(|_| SdoAbortCode::NoObj)?;
        self.cfg_pdo_comm(pdo.comm_index(), par)
    }

    /// Writes the RPDO mapping parameter record of PDO `num`, validating
    /// every descriptor like an SDO download would.
    pub fn cfg_rpdo_map(&mut self, num: u16, par: &PdoMapPar) -> Result<(), SdoAbortCode> {
        let pdo = PdoNum::try_from(num).map_err(|_| SdoAbortCode::NoObj)?;
        self.cfg_pdo_map(pdo.map_index(), pdo.comm_index(), par)
    }

    fn cfg_pdo_comm(&mut self, index: u16, par: &PdoCommPar) -> Result<(), SdoAbortCode> {
        let obj = self.od.find_obj(index).ok_or(SdoAbortCode::NoObj)?;
        obj.find_sub(0x00).ok_or(SdoAbortCode::NoSub)?;

        // Write the COB-ID first when the target state is disabled and last
        // when it is enabled, so the other fields always land on an invalid
        // PDO.
        let disable = par.cobid & CO_PDO_COBID_VALID != 0;
        if disable && par.n >= 1 {
            self.cfg_comm_sub(index, 0x01, par)?;
        }
        for sub_index in 2..=par.n.min(6) {
            // the compatibility entry (0x04) is skipped, it must not be written
            if sub_index == 4 {
                continue;
            }
            self.cfg_comm_sub(index, sub_index, par)?;
        }
        if !disable && par.n >= 1 {
            self.cfg_comm_sub(index, 0x01, par)?;
        }
        Ok(())
    }

    fn cfg_comm_sub(
        &mut self,
        index: u16,
        sub_index: u8,
        par: &PdoCommPar,
    ) -> Result<(), SdoAbortCode> {
        let value = match sub_index {
            0x01 => ObjectValue::Unsigned32(par.cobid),
            0x02 => ObjectValue::Unsigned8(par.trans),
            0x03 => ObjectValue::Unsigned16(par.inhibit),
            0x05 => ObjectValue::Unsigned16(par.event),
            0x06 => ObjectValue::Unsigned8(par.sync),
            _ => return Err(SdoAbortCode::NoSub),
        };

        let comm = PdoCommPar::load(&self.od, index);
        let sub = self.od.find_sub(index, sub_index).ok_or(SdoAbortCode::NoSub)?;
        if sub.data_type != value.data_type() {
            return Err(SdoAbortCode::TypeLen);
        }
        validator::chk_comm(&comm, sub_index, &value)?;
        self.od.write_internal(index, sub_index, value)
    }

    fn cfg_pdo_map(
        &mut self,
        index: u16,
        comm_index: u16,
        par: &PdoMapPar,
    ) -> Result<(), SdoAbortCode> {
        if usize::from(par.n) > CO_PDO_NUM_MAPS {
            return Err(SdoAbortCode::ParamVal);
        }
        self.od.find_obj(index).ok_or(SdoAbortCode::NoObj)?;
        self.od.find_sub(index, 0x00).ok_or(SdoAbortCode::NoSub)?;

        // the mapping count has to be zero while the descriptors change
        self.cfg_map_sub(index, comm_index, 0x00, ObjectValue::Unsigned8(0))?;
        for i in 1..=par.n {
            let descriptor = ObjectValue::Unsigned32(par.map[usize::from(i) - 1]);
            self.cfg_map_sub(index, comm_index, i, descriptor)?;
        }
        if par.n > 0 {
            self.cfg_map_sub(index, comm_index, 0x00, ObjectValue::Unsigned8(par.n))?;
        }
        Ok(())
    }

    fn cfg_map_sub(
        &mut self,
        index: u16,
        comm_index: u16,
        sub_index: u8,
        value: ObjectValue,
    ) -> Result<(), SdoAbortCode> {
        let comm = PdoCommPar::load(&self.od, comm_index);
        let map = PdoMapPar::load(&self.od, index);
        let sub = self.od.find_sub(index, sub_index).ok_or(SdoAbortCode::NoSub)?;
        if sub.data_type != value.data_type() {
            return Err(SdoAbortCode::TypeLen);
        }
        validator::chk_map(self, &comm, &map, sub_index, &value)?;
        self.od.write_internal(index, sub_index, value)
    }

    /// Inserts an RPDO communication parameter object (0x1400 + num - 1)
    /// holding `par`, with sub-objects 0x00..=`par.n`.
    pub fn insert_rpdo_comm_object(&mut self, num: PdoNum, par: &PdoCommPar) {
        let mut obj = Object::new().with_sub(
            0x00,
            SubObject::new(ObjectValue::Unsigned8(par.n)).with_access(AccessType::ReadOnly),
        );
        if par.n >= 1 {
            obj.insert_sub(0x01, SubObject::new(ObjectValue::Unsigned32(par.cobid)));
        }
        if par.n >= 2 {
            obj.insert_sub(0x02, SubObject::new(ObjectValue::Unsigned8(par.trans)));
        }
        if par.n >= 3 {
            obj.insert_sub(0x03, SubObject::new(ObjectValue::Unsigned16(par.inhibit)));
        }
        if par.n >= 4 {
            obj.insert_sub(0x04, SubObject::new(ObjectValue::Unsigned8(par.reserved)));
        }
        if par.n >= 5 {
            obj.insert_sub(0x05, SubObject::new(ObjectValue::Unsigned16(par.event)));
        }
        if par.n >= 6 {
            obj.insert_sub(0x06, SubObject::new(ObjectValue::Unsigned8(par.sync)));
        }
        self.od.insert(num.comm_index(), obj);
    }

    /// Inserts an RPDO mapping parameter object (0x1600 + num - 1) holding
    /// `par`, with all 64 descriptor sub-objects present.
    pub fn insert_rpdo_map_object(&mut self, num: PdoNum, par: &PdoMapPar) {
        let mut obj =
            Object::new().with_sub(0x00, SubObject::new(ObjectValue::Unsigned8(par.n)));
        for i in 1..=CO_PDO_NUM_MAPS {
            obj.insert_sub(
                i as u8,
                SubObject::new(ObjectValue::Unsigned32(par.map[i - 1])),
            );
        }
        self.od.insert(num.map_index(), obj);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdo::PdoMapping;

    fn mappable_sub(access: AccessType, pdo_mapping: bool) -> SubObject {
        SubObject::new(ObjectValue::Unsigned32(0xdeadbeef))
            .with_access(access)
            .with_pdo_mapping(pdo_mapping)
    }

    #[test]
    fn test_chk_rpdo_dummy_entries() {
        let mut dev = Device::new();
        dev.set_dummy(1 << DataType::Unsigned16.code());

        assert_eq!(dev.chk_rpdo(DataType::Unsigned16.code(), 0x00), Ok(()));
        // disabled dummy type
        assert_eq!(
            dev.chk_rpdo(DataType::Unsigned32.code(), 0x00),
            Err(SdoAbortCode::NoObj)
        );
        // dummy entries only exist at sub-index 0
        assert_eq!(
            dev.chk_rpdo(DataType::Unsigned16.code(), 0x01),
            Err(SdoAbortCode::NoObj)
        );
    }

    #[test]
    fn test_chk_rpdo_decision_tree() {
        let mut dev = Device::new();
        dev.od.insert(
            0x2020,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWrite, true)),
        );
        dev.od.insert(
            0x2021,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadOnly, true)),
        );
        dev.od.insert(
            0x2022,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWrite, false)),
        );
        dev.od.insert(
            0x2023,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWriteRead, true)),
        );

        assert_eq!(dev.chk_rpdo(0x2020, 0x00), Ok(()));
        assert_eq!(dev.chk_rpdo(0xFFFF, 0x00), Err(SdoAbortCode::NoObj));
        assert_eq!(dev.chk_rpdo(0x2020, 0x01), Err(SdoAbortCode::NoSub));
        assert_eq!(dev.chk_rpdo(0x2021, 0x00), Err(SdoAbortCode::NoWrite));
        assert_eq!(dev.chk_rpdo(0x2022, 0x00), Err(SdoAbortCode::NoPdo));
        assert_eq!(dev.chk_rpdo(0x2023, 0x00), Err(SdoAbortCode::NoPdo));
    }

    #[test]
    fn test_chk_tpdo_decision_tree() {
        let mut dev = Device::new();
        dev.set_dummy(u32::MAX);
        dev.od.insert(
            0x2020,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWrite, true)),
        );
        dev.od.insert(
            0x2021,
            Object::new().with_sub(0x00, mappable_sub(AccessType::WriteOnly, true)),
        );
        dev.od.insert(
            0x2022,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWriteWrite, true)),
        );

        // dummy entries are illegal on the transmit side, enabled or not
        assert_eq!(
            dev.chk_tpdo(DataType::Unsigned16.code(), 0x00),
            Err(SdoAbortCode::NoObj)
        );
        assert_eq!(dev.chk_tpdo(0x2020, 0x00), Ok(()));
        assert_eq!(dev.chk_tpdo(0x2021, 0x00), Err(SdoAbortCode::NoRead));
        assert_eq!(dev.chk_tpdo(0x2022, 0x00), Err(SdoAbortCode::NoPdo));
    }

    fn device_with_rpdo_params(num: u16, comm: &PdoCommPar) -> Device {
        let mut dev = Device::new();
        let pdo = PdoNum::try_from(num).unwrap();
        dev.insert_rpdo_comm_object(pdo, comm);
        dev.insert_rpdo_map_object(pdo, &PdoMapPar::default());
        dev.od.insert(
            0x2020,
            Object::new().with_sub(0x00, mappable_sub(AccessType::ReadWrite, true)),
        );
        dev
    }

    #[test]
    fn test_cfg_rpdo_invalid_num() {
        let mut dev = Device::new();
        let comm = PdoCommPar::default();
        let map = PdoMapPar::default();
        assert_eq!(dev.cfg_rpdo(0, &comm, &map), Err(SdoAbortCode::NoObj));
        assert_eq!(dev.cfg_rpdo(513, &comm, &map), Err(SdoAbortCode::NoObj));
    }

    #[test]
    fn test_cfg_rpdo_missing_objects() {
        let mut dev = Device::new();
        let comm = PdoCommPar::default();
        let map = PdoMapPar::default();
        // neither parameter object exists
        assert_eq!(dev.cfg_rpdo(1, &comm, &map), Err(SdoAbortCode::NoObj));
    }

    #[test]
    fn test_cfg_rpdo_nominal() {
        let comm = PdoCommPar {
            n: 2,
            cobid: 0x201,
            trans: 0xFE,
            ..PdoCommPar::default()
        };
        let mut dev = device_with_rpdo_params(1, &PdoCommPar {
            n: 2,
            cobid: CO_PDO_COBID_VALID,
            ..PdoCommPar::default()
        });

        let mut map = PdoMapPar::default();
        map.n = 1;
        map.map[0] = PdoMapping::new(0x2020, 0x00, 32).0;

        dev.cfg_rpdo(1, &comm, &map).unwrap();

        assert_eq!(dev.od.read_u32(0x1400, 0x01), Some(0x201));
        assert_eq!(dev.od.read_u8(0x1400, 0x02), Some(0xFE));
        assert_eq!(dev.od.read_u8(0x1600, 0x00), Some(1));
        assert_eq!(dev.od.read_u32(0x1600, 0x01), Some(0x2020_0020));
    }

    #[test]
    fn test_cfg_rpdo_leaves_pdo_disabled() {
        let comm = PdoCommPar {
            n: 2,
            cobid: CO_PDO_COBID_VALID | 0x201,
            trans: 0xFF,
            ..PdoCommPar::default()
        };
        let mut dev = device_with_rpdo_params(1, &PdoCommPar {
            n: 2,
            cobid: CO_PDO_COBID_VALID,
            ..PdoCommPar::default()
        });

        dev.cfg_rpdo(1, &comm, &PdoMapPar::default()).unwrap();
        assert_eq!(
            dev.od.read_u32(0x1400, 0x01),
            Some(CO_PDO_COBID_VALID | 0x201)
        );
    }

    #[test]
    fn test_cfg_rpdo_map_rejects_unmappable_target() {
        let mut dev = device_with_rpdo_params(1, &PdoCommPar {
            n: 2,
            cobid: CO_PDO_COBID_VALID,
            ..PdoCommPar::default()
        });

        let mut map = PdoMapPar::default();
        map.n = 1;
        map.map[0] = PdoMapping::new(0xFFFF, 0x00, 32).0;

        assert_eq!(
            dev.cfg_rpdo_map(1, &map),
            Err(SdoAbortCode::NoObj)
        );
    }

    #[test]
    fn test_cfg_comm_wrong_declared_type() {
        let mut dev = Device::new();
        let pdo = PdoNum::try_from(1).unwrap();
        // COB-ID sub-object declared with the wrong data type
        let obj = Object::new()
            .with_sub(0x00, SubObject::new(ObjectValue::Unsigned8(1)))
            .with_sub(0x01, SubObject::new(ObjectValue::Unsigned16(0)));
        dev.od.insert(pdo.comm_index(), obj);

        let par = PdoCommPar {
            n: 1,
            cobid: CO_PDO_COBID_VALID | 0x201,
            ..PdoCommPar::default()
        };
        assert_eq!(dev.cfg_rpdo_comm(1, &par), Err(SdoAbortCode::TypeLen));
    }
}
