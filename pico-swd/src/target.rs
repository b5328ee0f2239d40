//! Per-chip constants.

use crate::ap::ApSelect;

/// Which debug mechanism is used to control the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreFamily {
    /// Cortex-M debug registers in the system control space.
    CortexM,
    /// A RISC-V debug module driven through abstract commands.
    RiscV,
}

/// Layout of the boot ROM function table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomTableLayout {
    /// 16 bit code followed by a 16 bit address.
    Compact,
    /// 16 bit code padded to a word, followed by a 32 bit address.
    Wide,
}

/// Everything the debug link needs to know about one kind of target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: &'static str,
    /// Value written to TARGETSEL to address the debug port.
    pub targetsel: u32,
    /// Expected DPIDR. A different value is only reported.
    pub idcode: u32,
    pub family: CoreFamily,
    /// Access port used for memory and Cortex-M debug registers.
    pub mem_ap: ApSelect,
    /// Access port in front of the RISC-V debug module.
    pub dm_ap: ApSelect,
    /// Word holding the function table pointer in its lower half.
    pub rom_table_pointer: u32,
    pub rom_table_layout: RomTableLayout,
    /// RAM the flash programmer stages image chunks in.
    pub ram_buffer: u32,
    /// Initial stack pointer for ROM routines.
    pub stack_top: u32,
    /// RAM word used as return trap when the ROM has no debug trampoline.
    pub trap_address: u32,
}

impl Target {
    pub fn rp2040() -> Self {
        Self {
            name: "rp2040",
            targetsel: 0x0100_2927,
            idcode: 0x0BC1_2477,
            family: CoreFamily::CortexM,
            mem_ap: ApSelect::new(0, 0),
            dm_ap: ApSelect::new(0, 0),
            rom_table_pointer: 0x0000_0014,
            rom_table_layout: RomTableLayout::Compact,
            ram_buffer: 0x2000_0000,
            stack_top: 0x2004_2000,
            trap_address: 0x2004_0000,
        }
    }

    pub fn rp2350() -> Self {
        Self {
            name: "rp2350",
            targetsel: 0x0004_0927,
            idcode: 0x4C01_3477,
            family: CoreFamily::CortexM,
            mem_ap: ApSelect::new(0x2, 0xD),
            dm_ap: ApSelect::new(0xA, 0xD),
            rom_table_pointer: 0x0000_0014,
            rom_table_layout: RomTableLayout::Wide,
            ram_buffer: 0x2000_0000,
            stack_top: 0x2008_2000,
            trap_address: 0x2008_0000,
        }
    }

    pub fn rp2350_riscv() -> Self {
        Self {
            name: "rp2350-riscv",
            family: CoreFamily::RiscV,
            ..Self::rp2350()
        }
    }

    /// Look up a built-in profile by its name.
    pub fn by_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|target| target.name == name)
    }

    pub fn all() -> Vec<Self> {
        vec![Self::rp2040(), Self::rp2350(), Self::rp2350_riscv()]
    }
}
