//! RISC-V debug module (version 0.13) reached through a memory access port.

use bitfield::bitfield;

use super::{CallingConvention, CoreControl, RegisterId};
use crate::ap::{ApRegister, ApSelect, Csw, Drw, Tar};
use crate::interface::{DebugInterface, DebugInterfaceExt};
use crate::retry::{is_wait, Retry};
use crate::target::CoreFamily;
use crate::{Error, ErrorKind};

/// A debug module register with its address in the debug module bus.
pub trait DebugRegister: Clone + From<u32> + Into<u32> + Sized + std::fmt::Debug {
    const ADDRESS: u8;
    const NAME: &'static str;
}

macro_rules! debug_register {
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

        impl DebugRegister for $name {
            const ADDRESS: u8 = $address;
            const NAME: &'static str = $display;
        }
    };
}

bitfield! {
    /// Abstract data 0, argument and result of abstract commands.
    #[derive(Copy, Clone)]
    pub struct Data0(u32);
    impl Debug;
    pub u32, value, set_value: 31, 0;
}

debug_register!(Data0, 0x04, "data0");

bitfield! {
    #[derive(Copy, Clone)]
    pub struct Dmcontrol(u32);
    impl Debug;
    pub _, set_haltreq: 31;
    pub _, set_resumereq: 30;
    pub hartreset, set_hartreset: 29;
    pub _, set_ackhavereset: 28;
    pub hasel, set_hasel: 26;
    pub u16, hartsello, set_hartsello: 25, 16;
    pub ndmreset, set_ndmreset: 1;
    pub dmactive, set_dmactive: 0;
}

debug_register!(Dmcontrol, 0x10, "dmcontrol");

impl Dmcontrol {
    fn active() -> Self {
        let mut dmcontrol = Dmcontrol(0);
        dmcontrol.set_dmactive(true);
        dmcontrol
    }
}

bitfield! {
    /// Read-only debug module status.
    #[derive(Copy, Clone)]
    pub struct Dmstatus(u32);
    impl Debug;
    pub impebreak, _: 22;
    pub allhavereset, _: 19;
    pub anyhavereset, _: 18;
    pub allresumeack, _: 17;
    pub anyresumeack, _: 16;
    pub allnonexistent, _: 15;
    pub anynonexistent, _: 14;
    pub allunavail, _: 13;
    pub anyunavail, _: 12;
    pub allrunning, _: 11;
    pub anyrunning, _: 10;
    pub allhalted, _: 9;
    pub anyhalted, _: 8;
    pub authenticated, _: 7;
    pub authbusy, _: 6;
    pub hasresethaltreq, _: 5;
    pub confstrptrvalid, _: 4;
    pub u8, version, _: 3, 0;
}

debug_register!(Dmstatus, 0x11, "dmstatus");

bitfield! {
    /// Abstract command control and status.
    #[derive(Copy, Clone)]
    pub struct Abstractcs(u32);
    impl Debug;
    pub u8, progbufsize, _: 28, 24;
    pub busy, _: 12;
    pub u8, cmderr, set_cmderr: 10, 8;
    pub u8, datacount, _: 3, 0;
}

debug_register!(Abstractcs, 0x16, "abstractcs");

bitfield! {
    /// Access register abstract command.
    #[derive(Copy, Clone)]
    pub struct AccessRegisterCommand(u32);
    impl Debug;
    pub u8, cmd_type, set_cmd_type: 31, 24;
    pub u8, aarsize, set_aarsize: 22, 20;
    pub aarpostincrement, set_aarpostincrement: 19;
    pub postexec, set_postexec: 18;
    pub transfer, set_transfer: 17;
    pub write, set_write: 16;
    pub u16, regno, set_regno: 15, 0;
}

debug_register!(AccessRegisterCommand, 0x17, "command");

bitfield! {
    /// Debug control and status CSR of the hart.
    #[derive(Copy, Clone)]
    pub struct Dcsr(u32);
    impl Debug;
    pub u8, xdebugver, _: 31, 28;
    pub ebreakm, set_ebreakm: 15;
    pub ebreaks, set_ebreaks: 13;
    pub ebreaku, set_ebreaku: 12;
    pub u8, cause, _: 8, 6;
    pub step, set_step: 2;
    pub u8, prv, set_prv: 1, 0;
}

const DCSR: RegisterId = RegisterId(0x7b0);

/// Supported debug module version, 0.13.
const DM_VERSION_0_13: u8 = 2;

const AARSIZE_32: u8 = 2;

static RISCV_CALLING_CONVENTION: CallingConvention = CallingConvention {
    // a0 to a3
    arguments: [RegisterId(0x100a), RegisterId(0x100b), RegisterId(0x100c), RegisterId(0x100d)],
    // dpc, the pc the hart resumes at
    program_counter: RegisterId(0x7b1),
    stack_pointer: RegisterId(0x1002),
    return_address: RegisterId(0x1001),
    thumb: false,
    // ebreak
    trap_instruction: 0x0010_0073,
};

const ABSTRACT_COMMAND: Retry = Retry::new("abstract command", 100)
    .with_interval_ms(1)
    .retry_on(is_wait);

const HART_STATE: Retry = Retry::new("hart state change", 100)
    .with_interval_ms(1)
    .retry_on(is_wait);

const DM_ACTIVATION: Retry = Retry::new("debug module activation", 10)
    .with_interval_ms(1)
    .retry_on(is_wait);

/// Delay between the phases of the debug module reset handshake.
const DM_PHASE_DELAY_MS: u32 = 10;

fn cmderr_to_error(cmderr: u8) -> Error {
    match cmderr {
        1 => Error::new(ErrorKind::ResourceBusy)
            .with_context("abstract command issued while busy"),
        4 => Error::new(ErrorKind::NotHalted)
            .with_context("abstract command requires a halted hart"),
        2 => Error::new(ErrorKind::AbstractCommandFailed).with_context("command not supported"),
        3 => Error::new(ErrorKind::AbstractCommandFailed)
            .with_context("exception during command"),
        5 => Error::new(ErrorKind::AbstractCommandFailed).with_context("bus error"),
        other => {
            Error::new(ErrorKind::AbstractCommandFailed).with_context(format!("cmderr {other}"))
        }
    }
}

/// RISC-V hart control through the debug module's abstract commands.
#[derive(Debug)]
pub struct RiscV {
    dm_ap: ApSelect,
    active: bool,
}

impl RiscV {
    pub fn new(dm_ap: ApSelect) -> Self {
        Self { dm_ap, active: false }
    }

    fn read_dm_register<R: DebugRegister>(
        &self,
        iface: &mut dyn DebugInterface,
    ) -> Result<R, Error> {
        iface.write_ap(self.dm_ap, Tar::ADDRESS, R::ADDRESS as u32 * 4)?;
        let value = iface.read_ap(self.dm_ap, Drw::ADDRESS)?;
        tracing::trace!("Read DM {} = {:#010x}", R::NAME, value);
        Ok(R::from(value))
    }

    fn write_dm_register<R: DebugRegister>(
        &self,
        iface: &mut dyn DebugInterface,
        register: R,
    ) -> Result<(), Error> {
        let value: u32 = register.into();
        tracing::trace!("Write DM {} = {:#010x}", R::NAME, value);
        iface.write_ap(self.dm_ap, Tar::ADDRESS, R::ADDRESS as u32 * 4)?;
        iface.write_ap(self.dm_ap, Drw::ADDRESS, value)
    }

    fn ensure_active(&self) -> Result<(), Error> {
        if self.active {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotInitialized).with_context("debug module is not active"))
        }
    }

    fn execute_abstract_command(
        &self,
        iface: &mut dyn DebugInterface,
        command: AccessRegisterCommand,
    ) -> Result<(), Error> {
        self.write_dm_register(iface, command)?;

        let abstractcs = ABSTRACT_COMMAND.run(iface, |iface, _| {
            let abstractcs: Abstractcs = self.read_dm_register(iface)?;
            Ok((!abstractcs.busy()).then_some(abstractcs))
        })?;

        match abstractcs.cmderr() {
            0 => Ok(()),
            cmderr => {
                // cmderr is write-1-to-clear
                let mut clear = Abstractcs(0);
                clear.set_cmderr(0x7);
                self.write_dm_register(iface, clear)?;

                Err(cmderr_to_error(cmderr))
            }
        }
    }

    fn access_register_command(register: RegisterId, write: bool) -> AccessRegisterCommand {
        let mut command = AccessRegisterCommand(0);
        command.set_cmd_type(0);
        command.set_aarsize(AARSIZE_32);
        command.set_transfer(true);
        command.set_write(write);
        command.set_regno(register.0);
        command
    }

    fn wait_for_hart(
        &self,
        iface: &mut dyn DebugInterface,
        done: fn(&Dmstatus) -> bool,
    ) -> Result<(), Error> {
        HART_STATE.run(iface, |iface, _| {
            let dmstatus: Dmstatus = self.read_dm_register(iface)?;
            Ok(done(&dmstatus).then_some(()))
        })
    }
}

impl CoreControl for RiscV {
    fn family(&self) -> CoreFamily {
        CoreFamily::RiscV
    }

    fn calling_convention(&self) -> &'static CallingConvention {
        &RISCV_CALLING_CONVENTION
    }

    fn debug_core_start(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        iface.write_ap_register(self.dm_ap, Csw::word_access())?;

        // Reset, activate, then configure the debug module.
        self.write_dm_register(iface, Dmcontrol(0))?;
        iface.delay_ms(DM_PHASE_DELAY_MS);

        self.write_dm_register(iface, Dmcontrol::active())?;
        iface.delay_ms(DM_PHASE_DELAY_MS);

        DM_ACTIVATION.run(iface, |iface, _| {
            let dmcontrol: Dmcontrol = self.read_dm_register(iface)?;
            Ok(dmcontrol.dmactive().then_some(()))
        })?;

        let mut configure = Dmcontrol::active();
        configure.set_ackhavereset(true);
        self.write_dm_register(iface, configure)?;

        let dmstatus: Dmstatus = self.read_dm_register(iface)?;
        if dmstatus.version() != DM_VERSION_0_13 {
            tracing::warn!(
                "Unexpected debug module version {}, expected {}",
                dmstatus.version(),
                DM_VERSION_0_13
            );
        }
        if !dmstatus.authenticated() {
            tracing::warn!("Debug module reports it is not authenticated");
        }

        self.active = true;
        Ok(())
    }

    fn halt(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        self.ensure_active()?;

        let mut dmcontrol = Dmcontrol::active();
        dmcontrol.set_haltreq(true);
        self.write_dm_register(iface, dmcontrol)?;

        self.wait_for_hart(iface, Dmstatus::allhalted)?;

        self.write_dm_register(iface, Dmcontrol::active())
    }

    fn run(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        self.ensure_active()?;

        let mut dmcontrol = Dmcontrol::active();
        dmcontrol.set_resumereq(true);
        self.write_dm_register(iface, dmcontrol)?;

        self.wait_for_hart(iface, Dmstatus::allresumeack)?;

        self.write_dm_register(iface, Dmcontrol::active())
    }

    fn is_halted(&mut self, iface: &mut dyn DebugInterface) -> Result<bool, Error> {
        self.ensure_active()?;

        let dmstatus: Dmstatus = self.read_dm_register(iface)?;
        Ok(dmstatus.allhalted())
    }

    fn read_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
    ) -> Result<u32, Error> {
        self.ensure_active()?;

        self.execute_abstract_command(iface, Self::access_register_command(register, false))?;

        let data0: Data0 = self.read_dm_register(iface)?;
        Ok(data0.value())
    }

    fn write_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
        value: u32,
    ) -> Result<(), Error> {
        self.ensure_active()?;

        self.write_dm_register(iface, Data0(value))?;
        self.execute_abstract_command(iface, Self::access_register_command(register, true))
    }

    fn reset_system(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        self.ensure_active()?;
        tracing::debug!("Requesting system reset through ndmreset");

        let mut dmcontrol = Dmcontrol::active();
        dmcontrol.set_ndmreset(true);
        self.write_dm_register(iface, dmcontrol)?;

        self.write_dm_register(iface, Dmcontrol::active())
    }

    fn prepare_call(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error> {
        // ebreak in M-mode enters debug mode, so returning to the trap halts
        // the hart instead of raising an exception.
        let mut dcsr = Dcsr(self.read_core_reg(iface, DCSR)?);
        dcsr.set_ebreakm(true);
        self.write_core_reg(iface, DCSR, dcsr.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test]
    fn access_register_command_encoding() {
        let command = RiscV::access_register_command(RegisterId(0x100a), true);

        assert_eq!(command.0, 0x0023_100a);
    }

    #[test]
    fn read_of_dpc() {
        let command = RiscV::access_register_command(RegisterId(0x7b1), false);

        assert_eq!(command.0, 0x0022_07b1);
    }

    #[test_case(1 => ErrorKind::ResourceBusy)]
    #[test_case(2 => ErrorKind::AbstractCommandFailed)]
    #[test_case(4 => ErrorKind::NotHalted)]
    #[test_case(7 => ErrorKind::AbstractCommandFailed)]
    fn cmderr_mapping(cmderr: u8) -> ErrorKind {
        cmderr_to_error(cmderr).kind()
    }

    #[test]
    fn operations_require_active_module() {
        let riscv = RiscV::new(ApSelect::new(0xA, 0xD));

        assert_eq!(
            riscv.ensure_active().map_err(|e| e.kind()),
            Err(ErrorKind::NotInitialized)
        );
    }
}
