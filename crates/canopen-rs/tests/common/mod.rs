// crates/canopen-rs/tests/common/mod.rs

//! Shared fixtures for the RPDO integration tests: a recording CAN bus and
//! callback recorders backed by shared cells, plus a device pre-populated
//! with one RPDO and a mappable application object.

use canopen_rs::od::{Object, ObjectValue, SubObject};
use canopen_rs::pdo::{PdoCommPar, PdoMapPar, PdoMapping};
use canopen_rs::{CanBus, CanFrame, CanopenError, Device, PdoNum, Rpdo, RpdoErr, RpdoInd, SdoAbortCode};
use std::cell::RefCell;
use std::rc::Rc;

/// CAN identifier used by the test RPDO.
pub const DEV_ID: u32 = 0x01;
/// The application object every test maps into the PDO.
pub const MAPPED_IDX: u16 = 0x2020;
pub const MAPPED_SUBIDX: u8 = 0x00;

/// A CAN bus that records every transmitted frame.
#[derive(Default)]
pub struct RecordingBus {
    pub sent: Vec<CanFrame>,
}

impl CanBus for RecordingBus {
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), CanopenError> {
        self.sent.push(*frame);
        Ok(())
    }
}

pub type IndCalls = Rc<RefCell<Vec<(u16, Result<(), SdoAbortCode>, Vec<u8>)>>>;
pub type ErrCalls = Rc<RefCell<Vec<(u16, u16, u8)>>>;

pub fn ind_recorder() -> (IndCalls, RpdoInd) {
    let calls: IndCalls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let ind: RpdoInd = Box::new(move |num, res, buf| {
        sink.borrow_mut().push((num, res, buf.to_vec()));
    });
    (calls, ind)
}

pub fn err_recorder() -> (ErrCalls, RpdoErr) {
    let calls: ErrCalls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    let err: RpdoErr = Box::new(move |num, eec, er| {
        sink.borrow_mut().push((num, eec, er));
    });
    (calls, err)
}

/// Builds a device holding RPDO 1 parameter objects (`cobid`, `trans`, one
/// 64-bit mapping of [`MAPPED_IDX`]) and the mapped `u64` application
/// object.
pub fn setup_device(cobid: u32, trans: u8) -> Device {
    let mut dev = Device::new();
    let num = PdoNum::try_from(1).unwrap();

    let comm = PdoCommPar {
        n: 6,
        cobid,
        trans,
        ..PdoCommPar::default()
    };
    dev.insert_rpdo_comm_object(num, &comm);

    let mut map = PdoMapPar::default();
    map.n = 1;
    map.map[0] = PdoMapping::new(MAPPED_IDX, MAPPED_SUBIDX, 0x40).0;
    dev.insert_rpdo_map_object(num, &map);

    dev.od.insert(
        MAPPED_IDX,
        Object::new().with_sub(
            MAPPED_SUBIDX,
            SubObject::new(ObjectValue::Unsigned64(0)).with_pdo_mapping(true),
        ),
    );
    dev
}

/// A started RPDO 1 on `dev`, with recording callbacks installed.
pub fn start_rpdo(dev: &Device, now_us: u64) -> (Rpdo, IndCalls, ErrCalls) {
    let mut rpdo = Rpdo::create(dev, 1).unwrap();
    let (ind_calls, ind) = ind_recorder();
    let (err_calls, err) = err_recorder();
    rpdo.set_ind(Some(ind));
    rpdo.set_err(Some(err));

    assert!(rpdo.is_stopped());
    rpdo.start(dev, now_us).unwrap();
    assert!(!rpdo.is_stopped());

    (rpdo, ind_calls, err_calls)
}

/// A data frame carrying a little-endian `u64`, addressed to the test RPDO.
pub fn pdo_frame_u64(value: u64) -> CanFrame {
    CanFrame::new(DEV_ID, false, &value.to_le_bytes())
}
