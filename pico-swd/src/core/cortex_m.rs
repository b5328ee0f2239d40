use bitfield::bitfield;

use super::{CallingConvention, CoreControl, MemoryMappedRegister, RegisterId};
use crate::interface::DebugInterface;
use crate::retry::{is_wait, Retry};
use crate::target::CoreFamily;
use crate::{Error, ErrorKind};

macro_rules! memory_mapped_register {
    ($name:ident, $address:expr, $display:expr) => {
        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(raw: $name) -> Self {
                raw.0
            }
        }

        impl MemoryMappedRegister for $name {
            const ADDRESS: u32 = $address;
            const NAME: &'static str = $display;
        }
    };
}

bitfield! {
    /// Debug Halting Control and Status Register.
    #[derive(Copy, Clone)]
    pub struct Dhcsr(u32);
    impl Debug;
    pub s_reset_st, _: 25;
    pub s_retire_st, _: 24;
    pub s_lockup, _: 19;
    pub s_sleep, _: 18;
    pub s_halt, _: 17;
    pub s_regrdy, _: 16;
    pub c_maskints, set_c_maskints: 3;
    pub c_step, set_c_step: 2;
    pub c_halt, set_c_halt: 1;
    pub c_debugen, set_c_debugen: 0;
}

impl Dhcsr {
    /// Set the key that has to accompany every write to this register.
    pub fn enable_write(&mut self) {
        self.0 &= !(0xffff << 16);
        self.0 |= 0xa05f << 16;
    }

    /// Debug enabled, core halted.
    pub fn halt() -> Self {
        let mut dhcsr = Dhcsr(0);
        dhcsr.enable_write();
        dhcsr.set_c_debugen(true);
        dhcsr.set_c_halt(true);
        dhcsr
    }

    /// Debug enabled, core running.
    pub fn run() -> Self {
        let mut dhcsr = Dhcsr(0);
        dhcsr.enable_write();
        dhcsr.set_c_debugen(true);
        dhcsr
    }
}

memory_mapped_register!(Dhcsr, 0xE000_EDF0, "DHCSR");

bitfield! {
    /// Debug Core Register Selector Register.
    #[derive(Copy, Clone)]
    pub struct Dcrsr(u32);
    impl Debug;
    pub _, set_regwnr: 16;
    pub _, set_regsel: 6, 0;
}

memory_mapped_register!(Dcrsr, 0xE000_EDF4, "DCRSR");

bitfield! {
    /// Debug Core Register Data Register.
    #[derive(Copy, Clone)]
    pub struct Dcrdr(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}

memory_mapped_register!(Dcrdr, 0xE000_EDF8, "DCRDR");

bitfield! {
    /// Application Interrupt and Reset Control Register.
    #[derive(Copy, Clone)]
    pub struct Aircr(u32);
    impl Debug;
    pub u16, vectkey, set_vectkey: 31, 16;
    pub sysresetreq, set_sysresetreq: 2;
    pub vectclractive, set_vectclractive: 1;
}

impl Aircr {
    pub fn vectkey_and_reset() -> Self {
        let mut aircr = Aircr(0);
        aircr.set_vectkey(0x05FA);
        aircr.set_sysresetreq(true);
        aircr
    }
}

memory_mapped_register!(Aircr, 0xE000_ED0C, "AIRCR");

const XPSR: RegisterId = RegisterId(16);
const XPSR_THUMB: u32 = 1 << 24;

static CORTEX_M_CALLING_CONVENTION: CallingConvention = CallingConvention {
    arguments: [RegisterId(0), RegisterId(1), RegisterId(2), RegisterId(3)],
    program_counter: RegisterId(15),
    stack_pointer: RegisterId(13),
    return_address: RegisterId(14),
    thumb: true,
    // Two `bkpt #0` instructions.
    trap_instruction: 0xBE00_BE00,
};

const REGISTER_READY: Retry = Retry::new("core register transfer", 100)
    .with_interval_ms(1)
    .retry_on(is_wait);

const HALT: Retry = Retry::new("halting the core", 100)
    .with_interval_ms(1)
    .retry_on(is_wait);

fn read_register<R: MemoryMappedRegister>(iface: &mut dyn DebugInterface) -> Result<R, Error> {
    iface.read_word_32(R::ADDRESS).map(R::from)
}

fn write_register<R: MemoryMappedRegister>(
    iface: &mut dyn DebugInterface,
    register: R,
) -> Result<(), Error> {
    let value: u32 = register.into();
    tracing::trace!("Write {} = {:#010x}", R::NAME, value);
    iface.write_word_32(R::ADDRESS, value)
}

fn wait_for_core_register_transfer(iface: &mut dyn DebugInterface) -> Result<(), Error> {
    REGISTER_READY.run(iface, |iface, _| {
        let dhcsr: Dhcsr = read_register(iface)?;
        Ok(dhcsr.s_regrdy().then_some(()))
    })
}

/// Cortex-M core control through DHCSR, DCRSR and DCRDR.
#[derive(Debug, Default)]
pub struct CortexM;

impl CortexM {
    pub fn new() -> Self {
        Self
    }
}

impl CoreControl for CortexM {
    fn family(&self) -> CoreFamily {
        CoreFamily::CortexM
    }

    fn calling_convention(&self) -> &'static CallingConvention {
        &CORTEX_M_CALLING_CONVENTION
    }

    fn debug_core_start(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        let dhcsr: Dhcsr = read_register(iface)?;
        if dhcsr.s_lockup() {
            tracing::warn!("Core is locked up");
        }

        let mut enable = Dhcsr(0);
        enable.enable_write();
        enable.set_c_debugen(true);
        enable.set_c_halt(dhcsr.s_halt());
        write_register(iface, enable)
    }

    fn halt(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        write_register(iface, Dhcsr::halt())?;

        HALT.run(iface, |iface, _| {
            let dhcsr: Dhcsr = read_register(iface)?;
            Ok(dhcsr.s_halt().then_some(()))
        })
    }

    fn run(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        write_register(iface, Dhcsr::run())
    }

    fn is_halted(&mut self, iface: &mut dyn DebugInterface) -> Result<bool, Error> {
        let dhcsr: Dhcsr = read_register(iface)?;
        Ok(dhcsr.s_halt())
    }

    fn read_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
    ) -> Result<u32, Error> {
        if register.0 > 0x7F {
            return Err(Error::new(ErrorKind::InvalidParam)
                .with_context(format!("no core register {}", register.0)));
        }

        let mut dcrsr = Dcrsr(0);
        dcrsr.set_regwnr(false);
        dcrsr.set_regsel(register.0 as u32);
        write_register(iface, dcrsr)?;

        wait_for_core_register_transfer(iface)?;

        let value: Dcrdr = read_register(iface)?;
        Ok(value.data())
    }

    fn write_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
        value: u32,
    ) -> Result<(), Error> {
        if register.0 > 0x7F {
            return Err(Error::new(ErrorKind::InvalidParam)
                .with_context(format!("no core register {}", register.0)));
        }

        write_register(iface, Dcrdr(value))?;

        let mut dcrsr = Dcrsr(0);
        dcrsr.set_regwnr(true);
        dcrsr.set_regsel(register.0 as u32);
        write_register(iface, dcrsr)?;

        wait_for_core_register_transfer(iface)
    }

    fn reset_system(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        tracing::debug!("Requesting system reset through AIRCR");
        write_register(iface, Aircr::vectkey_and_reset())
    }

    fn prepare_call(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        self.write_core_reg(iface, XPSR, XPSR_THUMB)
    }
}
