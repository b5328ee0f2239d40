use bitfield::bitfield;

use crate::dp::{Abort, DpRegister, RdBuff, TargetSel};
use crate::host::Host;
use crate::link::SwdLink;
use crate::{Error, ErrorKind};

/// Which port a packet addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    DebugPort,
    AccessPort,
}

bitfield! {
    /// The 8 bit request header that starts every SWD packet.
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct PacketHeader(u8);
    impl Debug;
    pub start, set_start: 0;
    pub ap_n_dp, set_ap_n_dp: 1;
    pub r_n_w, set_r_n_w: 2;
    pub a2, set_a2: 3;
    pub a3, set_a3: 4;
    pub parity, set_parity: 5;
    pub stop, set_stop: 6;
    pub park, set_park: 7;
}

impl PacketHeader {
    /// Build the header for a register at byte offset `address`.
    /// Only bits 3:2 of `address` end up on the wire.
    pub fn new(port: PortType, read: bool, address: u8) -> Self {
        let ap = port == PortType::AccessPort;
        let a2 = address & 0x4 != 0;
        let a3 = address & 0x8 != 0;

        let mut header = PacketHeader(0);
        header.set_start(true);
        header.set_ap_n_dp(ap);
        header.set_r_n_w(read);
        header.set_a2(a2);
        header.set_a3(a3);
        header.set_parity(ap ^ read ^ a2 ^ a3);
        header.set_stop(false);
        header.set_park(true);
        header
    }

    /// Check framing and parity, as a target does when receiving the header.
    pub fn is_valid(&self) -> bool {
        self.start()
            && !self.stop()
            && self.park()
            && self.parity() == (self.ap_n_dp() ^ self.r_n_w() ^ self.a2() ^ self.a3())
    }

    pub fn port(&self) -> PortType {
        if self.ap_n_dp() {
            PortType::AccessPort
        } else {
            PortType::DebugPort
        }
    }

    /// The register byte offset encoded by A[3:2].
    pub fn address(&self) -> u8 {
        (self.a2() as u8) << 2 | (self.a3() as u8) << 3
    }

    fn is_target_select(&self) -> bool {
        self.port() == PortType::DebugPort && !self.r_n_w() && self.address() == TargetSel::ADDRESS
    }
}

/// The parity bit sent after a data word: set when `data` has an odd
/// number of ones.
pub fn parity(data: u32) -> bool {
    data.count_ones() & 1 == 1
}

fn parse_swd_ack(ack: u64) -> Result<(), Error> {
    // These are the little-endian interpretations of bits,
    // so appear backwards relative to the wire order.
    match ack {
        0b001 => Ok(()),
        0b010 => Err(Error::new(ErrorKind::Wait)),
        0b100 => Err(Error::new(ErrorKind::Fault)),
        0b111 => Err(Error::new(ErrorKind::Protocol).with_context("no acknowledge")),
        other => Err(Error::new(ErrorKind::Protocol)
            .with_context(format!("invalid acknowledge {other:#05b}"))),
    }
}

impl<H: Host> SwdLink<H> {
    fn count_ack(&mut self, result: &Result<(), Error>) {
        match result.as_ref().map_err(Error::kind) {
            Ok(()) => {}
            Err(ErrorKind::Wait) => self.statistics.wait_responses += 1,
            Err(ErrorKind::Fault) => self.statistics.fault_responses += 1,
            Err(_) => self.statistics.protocol_errors += 1,
        }
    }

    /// Write the DP ABORT register to clear all sticky error flags.
    fn clear_sticky_errors(&mut self) {
        tracing::debug!("Clearing sticky errors after FAULT response");
        let abort = Abort::clear_all().into();
        if let Err(e) = self.raw_write(PortType::DebugPort, Abort::ADDRESS, abort, false) {
            tracing::warn!("Failed to write ABORT after FAULT: {}", e);
        }
    }

    fn raw_write(
        &mut self,
        port: PortType,
        address: u8,
        data: u32,
        ignore_ack: bool,
    ) -> Result<(), Error> {
        self.statistics.transfers += 1;

        let header = PacketHeader::new(port, false, address);
        tracing::trace!("SWD write {:?} {:#x} = {:#010x}", port, address, data);
        self.write_bits(header.0 as u64, 8)?;

        if header.is_target_select() {
            // The addressed device has not been selected yet, so nobody
            // acknowledges the request. Data follows the header directly.
            return self.write_data(data);
        }

        self.release_swdio()?;
        self.turnaround()?;
        let ack = self.read_bits(3)?;
        self.turnaround()?;
        self.drive_swdio()?;

        let result = parse_swd_ack(ack);
        self.count_ack(&result);
        match result {
            Ok(()) => {}
            Err(e) if ignore_ack => {
                tracing::trace!("Ignoring acknowledge: {}", e);
            }
            Err(e) => return Err(e),
        }

        self.write_data(data)
    }

    fn write_data(&mut self, data: u32) -> Result<(), Error> {
        self.write_bits(data as u64, 32)?;
        self.write_bits(parity(data) as u64, 1)
    }

    fn raw_read(&mut self, port: PortType, address: u8) -> Result<u32, Error> {
        self.statistics.transfers += 1;

        let header = PacketHeader::new(port, true, address);
        self.write_bits(header.0 as u64, 8)?;

        self.release_swdio()?;
        self.turnaround()?;
        let ack = self.read_bits(3)?;

        let result = parse_swd_ack(ack);
        self.count_ack(&result);
        if let Err(e) = result {
            if e.kind() == ErrorKind::Fault {
                // Keep the line state machine in step with the target.
                self.read_bits(33)?;
            }
            self.turnaround()?;
            self.drive_swdio()?;
            return Err(e);
        }

        let data = self.read_bits(32)? as u32;
        let parity_bit = self.read_bits(1)? == 1;
        self.turnaround()?;
        self.drive_swdio()?;

        tracing::trace!("SWD read {:?} {:#x} = {:#010x}", port, address, data);

        if parity_bit != parity(data) {
            self.statistics.parity_errors += 1;
            return Err(Error::new(ErrorKind::Parity)
                .with_context(format!("read {data:#010x} from {port:?} {address:#x}")));
        }

        Ok(data)
    }

    /// Issue a write packet.
    ///
    /// A FAULT response is followed by a write to ABORT before the error is
    /// returned. With `ignore_ack` the data phase is sent regardless of the
    /// acknowledge.
    pub fn write_packet(
        &mut self,
        port: PortType,
        address: u8,
        data: u32,
        ignore_ack: bool,
    ) -> Result<(), Error> {
        let result = self.raw_write(port, address, data, ignore_ack);
        if matches!(&result, Err(e) if e.kind() == ErrorKind::Fault) {
            self.clear_sticky_errors();
        }
        result
    }

    /// Issue a read packet. Reads of an access port are posted: the value
    /// returned belongs to the previous access port read.
    pub fn read_packet(&mut self, port: PortType, address: u8) -> Result<u32, Error> {
        let result = self.raw_read(port, address);
        if matches!(&result, Err(e) if e.kind() == ErrorKind::Fault) {
            self.clear_sticky_errors();
        }
        result
    }

    /// Fetch the result of the last posted access port read.
    pub fn read_rdbuff(&mut self) -> Result<u32, Error> {
        self.read_packet(PortType::DebugPort, RdBuff::ADDRESS)
    }
}
