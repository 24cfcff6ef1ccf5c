// crates/canopen-rs/src/pdo/rpdo.rs

//! The Receive-PDO service.
//!
//! One service instance is bound to one RPDO number and its two parameter
//! objects. The instance is driven from the outside, on a single executor:
//! the CAN driver feeds received frames into [`Rpdo::recv`], the SYNC
//! consumer calls [`Rpdo::sync`], and the application pumps the clock
//! through [`Rpdo::tick`] (using [`Rpdo::next_timeout_us`] to sleep
//! precisely). SDO downloads addressed to the parameter objects are routed
//! to [`Rpdo::download`], which validates and re-arms atomically.

use super::{is_event_transmission, is_reserved_transmission, is_sync_transmission};
use super::{mapping, validator, PdoCommPar, PdoMapPar};
use crate::can::CanFrame;
use crate::device::Device;
use crate::hal::{CanBus, CanopenError};
use crate::od::ObjectValue;
use crate::sdo::{SdoAbortCode, SdoRequest};
use crate::types::{
    PdoNum, CAN_MAX_LEN, CO_EMCY_PDO_LEN, CO_EMCY_PDO_LEN_EXCEEDED, CO_EMCY_RPDO_TIMEOUT,
    CO_ERRREG_COM, CO_SYNC_WINDOW_IDX,
};
use alloc::boxed::Box;
use core::fmt;
use log::{trace, warn};

/// Maximum SYNC counter value.
const MAX_SYNC_COUNTER: u8 = 240;

/// The RPDO indication: called once for every processed frame, after the
/// object dictionary has been updated, with the PDO number, the processing
/// result and the raw payload. Must not block.
pub type RpdoInd = Box<dyn FnMut(u16, Result<(), SdoAbortCode>, &[u8])>;

/// The RPDO error handler: called with the PDO number, an emergency error
/// code and the error register byte on runtime anomalies. Must not block.
pub type RpdoErr = Box<dyn FnMut(u16, u16, u8)>;

/// A frame staged for processing on the next SYNC.
#[derive(Clone, Copy)]
struct StagedFrame {
    len: usize,
    data: [u8; CAN_MAX_LEN],
}

/// A CANopen Receive-PDO service.
pub struct Rpdo {
    num: PdoNum,
    stopped: bool,
    comm: PdoCommPar,
    map: PdoMapPar,
    /// Scratch transfer buffer for the mapping codec.
    req: SdoRequest,
    ind: Option<RpdoInd>,
    err: Option<RpdoErr>,
    staged: Option<StagedFrame>,
    /// Deadline-monitoring (event timer) expiry, absolute microseconds.
    event_deadline_us: Option<u64>,
    /// Synchronous window expiry, absolute microseconds.
    swnd_deadline_us: Option<u64>,
}

impl fmt::Debug for Rpdo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rpdo")
            .field("num", &self.num.get())
            .field("stopped", &self.stopped)
            .field("comm", &self.comm)
            .field("map", &self.map)
            .field("staged", &self.staged.as_ref().map(|s| s.len))
            .field("event_deadline_us", &self.event_deadline_us)
            .field("swnd_deadline_us", &self.swnd_deadline_us)
            .finish()
    }
}

impl Rpdo {
    /// Creates the service for RPDO number `num` (1..=512).
    ///
    /// Both parameter objects (0x1400 + num - 1 and 0x1600 + num - 1) must
    /// already exist in the dictionary. The service starts out stopped.
    pub fn create(dev: &Device, num: u16) -> Result<Rpdo, CanopenError> {
        let num = PdoNum::try_from(num)?;
        if dev.od.find_obj(num.comm_index()).is_none() {
            return Err(CanopenError::MissingObject(num.comm_index()));
        }
        if dev.od.find_obj(num.map_index()).is_none() {
            return Err(CanopenError::MissingObject(num.map_index()));
        }
        Ok(Rpdo {
            num,
            stopped: true,
            comm: PdoCommPar::default(),
            map: PdoMapPar::default(),
            req: SdoRequest::new(),
            ind: None,
            err: None,
            staged: None,
            event_deadline_us: None,
            swnd_deadline_us: None,
        })
    }

    pub fn num(&self) -> u16 {
        self.num.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The current communication parameter snapshot.
    pub fn comm_par(&self) -> &PdoCommPar {
        &self.comm
    }

    /// The current mapping parameter snapshot.
    pub fn map_par(&self) -> &PdoMapPar {
        &self.map
    }

    /// Installs (or clears) the indication callback.
    pub fn set_ind(&mut self, ind: Option<RpdoInd>) {
        self.ind = ind;
    }

    /// Installs (or clears) the error handler.
    pub fn set_err(&mut self, err: Option<RpdoErr>) {
        self.err = err;
    }

    /// Starts the service: snapshots both parameter records and, if the
    /// PDO is valid, begins accepting frames and monitoring the deadline.
    /// Starting a started service is a no-op.
    pub fn start(&mut self, dev: &Device, now_us: u64) -> Result<(), CanopenError> {
        if !self.stopped {
            return Ok(());
        }
        self.comm = PdoCommPar::load(&dev.od, self.num.comm_index());
        self.map = PdoMapPar::load(&dev.od, self.num.map_index());
        self.staged = None;
        self.swnd_deadline_us = None;
        self.stopped = false;
        self.restart_event_timer(now_us);
        trace!(
            "RPDO {} started (COB-ID {:#010X}, transmission {:#04X})",
            self.num.get(),
            self.comm.cobid,
            self.comm.trans
        );
        Ok(())
    }

    /// Stops the service: cancels both timers and discards any staged
    /// frame. No callback is invoked after this returns, until the next
    /// [`Rpdo::start`]. The service may be restarted.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.staged = None;
        self.event_deadline_us = None;
        self.swnd_deadline_us = None;
    }

    fn valid(&self) -> bool {
        self.comm.is_valid()
    }

    /// Re-initializes deadline monitoring: armed whenever the service runs
    /// with a valid PDO and a non-zero event time.
    fn restart_event_timer(&mut self, now_us: u64) {
        self.event_deadline_us = if !self.stopped && self.valid() && self.comm.event > 0 {
            Some(now_us + u64::from(self.comm.event) * 1000)
        } else {
            None
        };
    }

    fn emit_err(&mut self, eec: u16, er: u8) {
        if let Some(err) = self.err.as_mut() {
            err(self.num.get(), eec, er);
        }
    }

    /// Processes a payload: maps it into the dictionary, raises the
    /// indication and translates length mismatches into emergencies.
    fn read_frame(&mut self, dev: &mut Device, buf: &[u8]) -> Result<(), SdoAbortCode> {
        let res = mapping::dn(&self.map, dev, &mut self.req, buf);
        if let Some(ind) = self.ind.as_mut() {
            ind(self.num.get(), res, buf);
        }
        match res {
            Err(SdoAbortCode::PdoLen) => {
                // the frame was too short for the mapping
                warn!(
                    "RPDO {}: PDO not processed due to length error",
                    self.num.get()
                );
                self.emit_err(CO_EMCY_PDO_LEN, CO_ERRREG_COM);
            }
            Ok(()) => {
                let mapped = mapping::total_bits(&self.map).unwrap_or(0);
                if buf.len() * 8 > mapped {
                    warn!("RPDO {}: PDO length exceeded", self.num.get());
                    self.emit_err(CO_EMCY_PDO_LEN_EXCEEDED, CO_ERRREG_COM);
                }
            }
            Err(_) => {}
        }
        res
    }

    /// Delivers a received CAN frame to the service.
    ///
    /// Frames are ignored while the service is stopped or the PDO is
    /// invalid, and when the identifier, frame format or RTR flag does not
    /// match the configured COB-ID. Event-driven PDOs process the frame
    /// immediately; synchronous PDOs stage it for the next SYNC.
    pub fn recv(&mut self, dev: &mut Device, frame: &CanFrame, now_us: u64) {
        if self.stopped || !self.valid() {
            return;
        }
        if frame.is_rtr() {
            return;
        }
        if frame.is_ext() != self.comm.is_ext() || frame.id != self.comm.canid() {
            return;
        }

        let trans = self.comm.trans;
        if is_reserved_transmission(trans) {
            trace!(
                "RPDO {}: dropping frame under reserved transmission type {:#04X}",
                self.num.get(),
                trans
            );
            return;
        }

        // every accepted frame restarts deadline monitoring
        self.restart_event_timer(now_us);

        let len = (frame.len as usize).min(CAN_MAX_LEN);
        let mut data = [0u8; CAN_MAX_LEN];
        data[..len].copy_from_slice(&frame.data[..len]);

        if is_event_transmission(trans) {
            let _ = self.read_frame(dev, &data[..len]);
        } else {
            // synchronous: stage the frame and (re)open the reception window
            self.swnd_deadline_us = None;
            self.staged = Some(StagedFrame { len, data });
            let window = dev.od.read_u32(CO_SYNC_WINDOW_IDX, 0x00).unwrap_or(0);
            if window > 0 {
                self.swnd_deadline_us = Some(now_us + u64::from(window));
            }
        }
    }

    /// Delivers a SYNC event to the service.
    ///
    /// Processes the staged frame, if any. `counter` is the SYNC counter
    /// value as received (0 if the SYNC producer does not send one).
    pub fn sync(&mut self, dev: &mut Device, counter: u8) -> Result<(), CanopenError> {
        if counter > MAX_SYNC_COUNTER {
            return Err(CanopenError::InvalidSyncCounter(counter));
        }
        if self.stopped || !self.valid() || !is_sync_transmission(self.comm.trans) {
            return Ok(());
        }

        self.swnd_deadline_us = None;
        let Some(staged) = self.staged.take() else {
            return Ok(());
        };

        let data = staged.data;
        match self.read_frame(dev, &data[..staged.len]) {
            Ok(()) => Ok(()),
            Err(ac) => Err(ac.into()),
        }
    }

    /// Fires any expired deadline. `now_us` must be monotonic with respect
    /// to the timestamps previously passed to this service.
    pub fn tick(&mut self, now_us: u64) {
        if self.stopped {
            return;
        }
        if self.event_deadline_us.is_some_and(|deadline| now_us >= deadline) {
            self.event_deadline_us = None;
            warn!("RPDO {}: deadline monitoring timeout", self.num.get());
            self.emit_err(CO_EMCY_RPDO_TIMEOUT, CO_ERRREG_COM);
        }
        if self.swnd_deadline_us.is_some_and(|deadline| now_us >= deadline) {
            self.swnd_deadline_us = None;
            // the frame missed its synchronous window
            self.staged = None;
            trace!("RPDO {}: synchronous window expired", self.num.get());
        }
    }

    /// The earliest pending deadline, if any. Lets the application sleep
    /// until the next [`Rpdo::tick`] is due.
    pub fn next_timeout_us(&self) -> Option<u64> {
        match (self.event_deadline_us, self.swnd_deadline_us) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Requests a producer update by transmitting an RTR frame with the
    /// configured identifier. A no-op when the PDO is invalid.
    pub fn rtr(&self, bus: &mut dyn CanBus) -> Result<(), CanopenError> {
        if !self.valid() {
            return Ok(());
        }
        let frame = CanFrame::new_rtr(self.comm.canid(), self.comm.is_ext());
        bus.send_frame(&frame)
    }

    /// The download indication for the two parameter objects of this RPDO.
    ///
    /// The application's SDO server routes every download addressed to
    /// 0x1400 + num - 1 or 0x1600 + num - 1 here while the service is
    /// started. Writes are validated against the committed state; accepted
    /// values are stored in the dictionary and the snapshot, and any
    /// receiver/timer re-arming happens before this returns.
    pub fn download(
        &mut self,
        dev: &mut Device,
        index: u16,
        sub_index: u8,
        data: &[u8],
        now_us: u64,
    ) -> Result<(), SdoAbortCode> {
        if self.stopped {
            // no interceptor installed: plain dictionary semantics
            self.req.set(data);
            return dev.od.download(index, sub_index, &self.req);
        }
        if index == self.num.comm_index() {
            self.dn_comm(dev, sub_index, data, now_us)
        } else if index == self.num.map_index() {
            self.dn_map(dev, sub_index, data)
        } else {
            Err(SdoAbortCode::NoObj)
        }
    }

    fn dn_comm(
        &mut self,
        dev: &mut Device,
        sub_index: u8,
        data: &[u8],
        now_us: u64,
    ) -> Result<(), SdoAbortCode> {
        let index = self.num.comm_index();
        let sub = dev
            .od
            .find_sub(index, sub_index)
            .ok_or(SdoAbortCode::NoSub)?;
        let value = ObjectValue::deserialize(data, sub.data_type)?;
        // only the COB-ID accepts a rewrite of its current value (no
        // re-arm); every other sub-index is validated regardless
        if sub_index == 0x01 && value == sub.value {
            return Ok(());
        }
        validator::chk_comm(&self.comm, sub_index, &value)?;

        match sub_index {
            0x01 => {
                let cobid = value.as_u32().ok_or(SdoAbortCode::TypeLen)?;
                dev.od.write_internal(index, sub_index, value)?;
                self.comm.cobid = cobid;
                if !self.valid() {
                    // receiver disabled: a staged frame is stale now
                    self.staged = None;
                    self.swnd_deadline_us = None;
                }
                self.restart_event_timer(now_us);
            }
            0x02 => {
                let trans = value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
                dev.od.write_internal(index, sub_index, value)?;
                self.comm.trans = trans;
            }
            0x03 => {
                let inhibit = value.as_u16().ok_or(SdoAbortCode::TypeLen)?;
                dev.od.write_internal(index, sub_index, value)?;
                self.comm.inhibit = inhibit;
            }
            0x05 => {
                let event = value.as_u16().ok_or(SdoAbortCode::TypeLen)?;
                dev.od.write_internal(index, sub_index, value)?;
                self.comm.event = event;
                self.restart_event_timer(now_us);
            }
            0x06 => {
                let sync = value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
                dev.od.write_internal(index, sub_index, value)?;
                self.comm.sync = sync;
            }
            // the validator rejected everything else
            _ => return Err(SdoAbortCode::NoSub),
        }
        Ok(())
    }

    fn dn_map(
        &mut self,
        dev: &mut Device,
        sub_index: u8,
        data: &[u8],
    ) -> Result<(), SdoAbortCode> {
        let index = self.num.map_index();
        let sub = dev
            .od
            .find_sub(index, sub_index)
            .ok_or(SdoAbortCode::NoSub)?;
        let value = ObjectValue::deserialize(data, sub.data_type)?;
        validator::chk_map(dev, &self.comm, &self.map, sub_index, &value)?;

        if sub_index == 0x00 {
            let n = value.as_u8().ok_or(SdoAbortCode::TypeLen)?;
            dev.od.write_internal(index, sub_index, value)?;
            self.map.n = n;
        } else {
            let raw = value.as_u32().ok_or(SdoAbortCode::TypeLen)?;
            dev.od.write_internal(index, sub_index, value)?;
            self.map.map[usize::from(sub_index) - 1] = raw;
        }
        Ok(())
    }
}
