//! Register and memory access over an established SWD link.

use crate::ap::{ApRegister, ApSelect, Drw, Tar};
use crate::dp::{DpRegister, RdBuff};
use crate::host::{Clock, Host};
use crate::link::SwdLink;
use crate::swd::PortType;
use crate::{Error, ErrorKind};

/// Access to debug port registers, access port registers and target memory.
///
/// This is what the core backends are written against, so they work on any
/// link implementation, including the simulated target used in tests.
pub trait DebugInterface: Clock {
    /// Read the debug port register at byte offset `address`.
    fn read_dp(&mut self, address: u8) -> Result<u32, Error>;

    /// Write the debug port register at byte offset `address`.
    fn write_dp(&mut self, address: u8, value: u32) -> Result<(), Error>;

    /// Read an access port register. SELECT is written before every access.
    fn read_ap(&mut self, ap: ApSelect, address: u8) -> Result<u32, Error>;

    /// Write an access port register. SELECT is written before every access.
    fn write_ap(&mut self, ap: ApSelect, address: u8, value: u32) -> Result<(), Error>;

    /// Read a word of target memory through the memory access port.
    fn read_word_32(&mut self, address: u32) -> Result<u32, Error>;

    /// Write a word of target memory through the memory access port.
    fn write_word_32(&mut self, address: u32, value: u32) -> Result<(), Error>;
}

/// Typed register helpers for any [`DebugInterface`].
pub trait DebugInterfaceExt: DebugInterface {
    fn read_dp_register<R: DpRegister>(&mut self) -> Result<R, Error> {
        let value = self.read_dp(R::ADDRESS)?;
        tracing::trace!("Read {} = {:#010x}", R::NAME, value);
        Ok(R::from(value))
    }

    fn write_dp_register<R: DpRegister>(&mut self, register: R) -> Result<(), Error> {
        let value: u32 = register.into();
        tracing::trace!("Write {} = {:#010x}", R::NAME, value);
        self.write_dp(R::ADDRESS, value)
    }

    fn read_ap_register<R: ApRegister>(&mut self, ap: ApSelect) -> Result<R, Error> {
        self.read_ap(ap, R::ADDRESS).map(R::from)
    }

    fn write_ap_register<R: ApRegister>(&mut self, ap: ApSelect, register: R) -> Result<(), Error> {
        self.write_ap(ap, R::ADDRESS, register.into())
    }
}

impl<T: DebugInterface + ?Sized> DebugInterfaceExt for T {}

fn check_alignment(address: u32) -> Result<(), Error> {
    if address % 4 != 0 {
        return Err(Error::new(ErrorKind::Alignment)
            .with_context(format!("address {address:#010x}")));
    }
    Ok(())
}

/// [`DebugInterface`] implementation on top of a bit-banged link.
pub struct SwdInterface<H> {
    link: SwdLink<H>,
    mem_ap: ApSelect,
}

impl<H: Host> SwdInterface<H> {
    pub fn new(link: SwdLink<H>, mem_ap: ApSelect) -> Self {
        Self { link, mem_ap }
    }

    pub fn link(&self) -> &SwdLink<H> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut SwdLink<H> {
        &mut self.link
    }

    pub fn into_link(self) -> SwdLink<H> {
        self.link
    }
}

impl<H: Host> Clock for SwdInterface<H> {
    fn delay_us(&mut self, us: u32) {
        self.link.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.link.delay_ms(ms);
    }

    fn yield_now(&mut self) {
        self.link.yield_now();
    }
}

impl<H: Host> DebugInterface for SwdInterface<H> {
    fn read_dp(&mut self, address: u8) -> Result<u32, Error> {
        self.link.read_packet(PortType::DebugPort, address)
    }

    fn write_dp(&mut self, address: u8, value: u32) -> Result<(), Error> {
        self.link.write_packet(PortType::DebugPort, address, value, false)
    }

    fn read_ap(&mut self, ap: ApSelect, address: u8) -> Result<u32, Error> {
        self.write_dp_register(ap.select(address))?;
        self.link.read_packet(PortType::AccessPort, address & 0xC)?;

        // AP reads are posted, the value arrives with the next read.
        let value = self.link.read_packet(PortType::DebugPort, RdBuff::ADDRESS)?;
        tracing::trace!("Read AP {:#x}:{:#04x} = {:#010x}", ap.index, address, value);
        Ok(value)
    }

    fn write_ap(&mut self, ap: ApSelect, address: u8, value: u32) -> Result<(), Error> {
        tracing::trace!("Write AP {:#x}:{:#04x} = {:#010x}", ap.index, address, value);
        self.write_dp_register(ap.select(address))?;
        self.link.write_packet(PortType::AccessPort, address & 0xC, value, false)
    }

    fn read_word_32(&mut self, address: u32) -> Result<u32, Error> {
        check_alignment(address)?;
        let ap = self.mem_ap;
        self.write_ap(ap, Tar::ADDRESS, address)?;
        self.read_ap(ap, Drw::ADDRESS)
    }

    fn write_word_32(&mut self, address: u32, value: u32) -> Result<(), Error> {
        check_alignment(address)?;
        let ap = self.mem_ap;
        self.write_ap(ap, Tar::ADDRESS, address)?;
        self.write_ap(ap, Drw::ADDRESS, value)
    }
}
