//! Halting, resuming and register access of the target core.
//!
//! The two supported families use entirely different mechanisms, so each
//! gets its own [`CoreControl`] implementation. The session picks one when
//! it is created and never branches on the family afterwards.

mod cortex_m;
mod riscv;

pub use cortex_m::CortexM;
pub use riscv::RiscV;

use crate::interface::DebugInterface;
use crate::target::{CoreFamily, Target};
use crate::Error;

/// Number of a core register as understood by the backend.
///
/// For Cortex-M this is the DCRSR register selector, for RISC-V the abstract
/// command register number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId(pub u16);

impl From<u16> for RegisterId {
    fn from(id: u16) -> Self {
        RegisterId(id)
    }
}

/// A register in the memory mapped debug register space.
pub trait MemoryMappedRegister: Clone + From<u32> + Into<u32> + Sized + std::fmt::Debug {
    const ADDRESS: u32;
    const NAME: &'static str;
}

/// How to call a function on the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallingConvention {
    pub arguments: [RegisterId; 4],
    pub program_counter: RegisterId,
    pub stack_pointer: RegisterId,
    pub return_address: RegisterId,
    /// Whether code addresses carry the Thumb bit.
    pub thumb: bool,
    /// Instruction word that halts the core when executed under debug.
    pub trap_instruction: u32,
}

impl CallingConvention {
    /// Register holding argument `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is larger than 3.
    pub fn argument_register(&self, n: usize) -> RegisterId {
        self.arguments[n]
    }
}

/// Control of one core through its debug interface.
pub trait CoreControl {
    fn family(&self) -> CoreFamily;

    /// Registers used for function calls.
    fn calling_convention(&self) -> &'static CallingConvention;

    /// Family specific bring-up, run once after the debug domain is powered.
    fn debug_core_start(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error>;

    /// Halt the core and wait until it reports halted.
    fn halt(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error>;

    /// Resume the core.
    fn run(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error>;

    fn is_halted(&mut self, iface: &mut dyn DebugInterface) -> Result<bool, Error>;

    fn read_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
    ) -> Result<u32, Error>;

    fn write_core_reg(
        &mut self,
        iface: &mut dyn DebugInterface,
        register: RegisterId,
        value: u32,
    ) -> Result<(), Error>;

    /// Request a reset of the whole system. The debug connection is lost.
    fn reset_system(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error>;

    /// Last preparation before resuming into a called function, after all
    /// argument registers are written.
    fn prepare_call(&mut self, iface: &mut dyn DebugInterface) -> Result<(), Error>;
}

/// Create the backend matching the target's core family.
pub fn backend_for(target: &Target) -> Box<dyn CoreControl> {
    match target.family {
        CoreFamily::CortexM => Box::new(CortexM::new()),
        CoreFamily::RiscV => Box::new(RiscV::new(target.dm_ap)),
    }
}
