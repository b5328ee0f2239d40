//! Boot ROM function lookup and invocation.
//!
//! The boot ROM publishes its routines in a table of two-character tags. A
//! routine is called by loading the argument registers, pointing the return
//! address at an instruction that halts the core, and resuming. Completion is
//! detected by polling for the halt.

use crate::core::CoreControl;
use crate::interface::DebugInterface;
use crate::retry::{is_wait, Retry};
use crate::target::{RomTableLayout, Target};
use crate::{Error, ErrorKind};

/// Build the tag the boot ROM uses to name a routine.
pub const fn rom_table_code(c1: u8, c2: u8) -> u16 {
    c1 as u16 | (c2 as u16) << 8
}

/// `connect_internal_flash()`
pub const CONNECT_INTERNAL_FLASH: u16 = rom_table_code(b'I', b'F');
/// `flash_exit_xip()`
pub const FLASH_EXIT_XIP: u16 = rom_table_code(b'E', b'X');
/// `flash_range_erase(offset, count, block_size, block_cmd)`
pub const FLASH_RANGE_ERASE: u16 = rom_table_code(b'R', b'E');
/// `flash_range_program(offset, data, count)`
pub const FLASH_RANGE_PROGRAM: u16 = rom_table_code(b'R', b'P');
/// `flash_flush_cache()`
pub const FLASH_FLUSH_CACHE: u16 = rom_table_code(b'F', b'C');
/// End of the debug trampoline, a breakpoint meant as return address.
pub const DEBUG_TRAMPOLINE_END: u16 = rom_table_code(b'D', b'E');

/// Upper bound of table entries inspected before giving up.
const MAX_ROM_TABLE_ENTRIES: u32 = 256;

const ROUTINE_COMPLETION: Retry = Retry::new("ROM routine completion", 1000)
    .with_interval_ms(10)
    .retry_on(is_wait);

/// Read the halfword at `address` through aligned word accesses.
fn read_half_word(iface: &mut dyn DebugInterface, address: u32) -> Result<u16, Error> {
    let word = iface.read_word_32(address & !0x3)?;
    let shift = (address & 0x2) * 8;
    Ok((word >> shift) as u16)
}

/// Address of the function table.
fn rom_table_base(iface: &mut dyn DebugInterface, target: &Target) -> Result<u32, Error> {
    read_half_word(iface, target.rom_table_pointer).map(u32::from)
}

fn read_entry(
    iface: &mut dyn DebugInterface,
    layout: RomTableLayout,
    base: u32,
    index: u32,
) -> Result<(u32, u32), Error> {
    match layout {
        RomTableLayout::Compact => {
            let entry = base + index * 4;
            let code = read_half_word(iface, entry)?;
            let address = read_half_word(iface, entry + 2)?;
            Ok((code as u32, address as u32))
        }
        RomTableLayout::Wide => {
            let entry = base + index * 8;
            let code = iface.read_word_32(entry)?;
            let address = iface.read_word_32(entry + 4)?;
            Ok((code, address))
        }
    }
}

/// Look up the routine tagged `code`.
///
/// Returns `Ok(None)` when the table ends without a match.
pub fn find_rom_func(
    iface: &mut dyn DebugInterface,
    target: &Target,
    code: u16,
) -> Result<Option<u32>, Error> {
    let base = rom_table_base(iface, target)?;
    tracing::trace!("ROM function table at {:#010x}", base);

    for index in 0..MAX_ROM_TABLE_ENTRIES {
        let (entry_code, address) = read_entry(iface, target.rom_table_layout, base, index)?;

        let end_of_table = match target.rom_table_layout {
            RomTableLayout::Compact => entry_code == 0 || entry_code == 0xFFFF,
            RomTableLayout::Wide => entry_code == 0 || entry_code == 0xFFFF_FFFF,
        };
        if end_of_table {
            break;
        }

        if entry_code & 0xFFFF == code as u32 {
            tracing::debug!(
                "Found ROM routine {} at {:#010x}",
                display_code(code),
                address
            );
            return Ok(Some(address));
        }
    }

    tracing::debug!("ROM routine {} not found", display_code(code));
    Ok(None)
}

/// The two characters of a tag, for log output.
pub fn display_code(code: u16) -> String {
    let [c1, c2] = code.to_le_bytes();
    format!("'{}{}'", c1 as char, c2 as char)
}

/// Where called routines return to.
///
/// The boot ROM's debug trampoline end when it exists. Otherwise the trap
/// instruction is written to the target's scratch word.
pub fn return_trap(
    iface: &mut dyn DebugInterface,
    core: &dyn CoreControl,
    target: &Target,
) -> Result<u32, Error> {
    if let Some(address) = find_rom_func(iface, target, DEBUG_TRAMPOLINE_END)? {
        return Ok(address);
    }

    let convention = core.calling_convention();
    tracing::debug!(
        "No debug trampoline, placing trap at {:#010x}",
        target.trap_address
    );
    iface.write_word_32(target.trap_address, convention.trap_instruction)?;
    Ok(target.trap_address)
}

/// Call the routine at `func` with up to four arguments and wait until it
/// returns to `trap`.
///
/// The core is halted on return, also when the routine never finishes.
pub fn call_rom_func(
    iface: &mut dyn DebugInterface,
    core: &mut dyn CoreControl,
    trap: u32,
    func: u32,
    args: [u32; 4],
) -> Result<(), Error> {
    if func == 0 {
        return Err(Error::new(ErrorKind::InvalidParam).with_context("routine address is zero"));
    }

    let convention = core.calling_convention();
    let (func, trap) = if convention.thumb {
        (func & !1, trap | 1)
    } else {
        (func, trap)
    };

    tracing::debug!("Calling {:#010x} with {:x?}", func, args);

    core.halt(iface)?;

    for (n, arg) in args.iter().enumerate() {
        core.write_core_reg(iface, convention.argument_register(n), *arg)?;
    }
    core.write_core_reg(iface, convention.return_address, trap)?;
    core.write_core_reg(iface, convention.program_counter, func)?;
    core.prepare_call(iface)?;

    core.run(iface)?;

    let result = ROUTINE_COMPLETION.run(iface, |iface, _| Ok(core.is_halted(iface)?.then_some(())));

    if let Err(e) = result {
        tracing::warn!("Routine at {:#010x} did not return: {}", func, e);
        if let Err(halt_error) = core.halt(iface) {
            tracing::warn!("Failed to halt the core after the routine: {}", halt_error);
        }
        return Err(e);
    }

    Ok(())
}
