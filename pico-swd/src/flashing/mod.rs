//! Writing an image into the target's flash through the boot ROM.
//!
//! The image is streamed chunk by chunk into a RAM staging buffer, and the
//! boot ROM's program routine copies each chunk into flash. The whole
//! affected range is erased once up front.

mod progress;

pub use progress::{FlashProgress, ProgressEvent};

use std::io::{Read, Seek, SeekFrom};
use std::time::Instant;

use crate::core::CoreControl;
use crate::interface::DebugInterface;
use crate::rom::{
    self, call_rom_func, find_rom_func, CONNECT_INTERNAL_FLASH, FLASH_EXIT_XIP, FLASH_FLUSH_CACHE,
    FLASH_RANGE_ERASE, FLASH_RANGE_PROGRAM,
};
use crate::target::Target;
use crate::{Error, ErrorKind};

/// Smallest unit the erase routine works on.
pub const SECTOR_SIZE: u32 = 4096;

/// Smallest unit the program routine works on.
pub const PAGE_SIZE: u32 = 256;

/// Command byte passed to the erase routine, 4 KiB sector erase.
const SECTOR_ERASE_COMMAND: u32 = 0x20;

/// Options for [`flash_firmware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashOptions {
    /// Bytes staged in RAM and programmed per routine call.
    pub chunk_size: u32,
    /// Read every staged word back before programming it.
    pub verify_staging: bool,
}

impl Default for FlashOptions {
    fn default() -> Self {
        Self {
            chunk_size: SECTOR_SIZE,
            verify_staging: false,
        }
    }
}

impl FlashOptions {
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_verify_staging(mut self, verify: bool) -> Self {
        self.verify_staging = verify;
        self
    }

    fn validate(&self, target: &Target) -> Result<(), Error> {
        if self.chunk_size == 0 || self.chunk_size % PAGE_SIZE != 0 {
            return Err(Error::new(ErrorKind::InvalidParam).with_context(format!(
                "chunk size {} is not a multiple of the {} byte page",
                self.chunk_size, PAGE_SIZE
            )));
        }

        let capacity = staging_capacity(target);
        if self.chunk_size > capacity {
            return Err(Error::new(ErrorKind::InvalidParam).with_context(format!(
                "chunk size {} does not fit the {} bytes of staging RAM",
                self.chunk_size, capacity
            )));
        }
        Ok(())
    }
}

/// The boot ROM routines used while flashing.
#[derive(Debug, Clone, Copy)]
struct FlashRoutines {
    erase: u32,
    program: u32,
    connect: Option<u32>,
    exit_xip: Option<u32>,
    flush_cache: Option<u32>,
}

impl FlashRoutines {
    fn find(iface: &mut dyn DebugInterface, target: &Target) -> Result<Self, Error> {
        let erase = find_rom_func(iface, target, FLASH_RANGE_ERASE)?;
        let program = find_rom_func(iface, target, FLASH_RANGE_PROGRAM)?;

        let (Some(erase), Some(program)) = (erase, program) else {
            return Err(Error::new(ErrorKind::InvalidState)
                .with_context("boot ROM does not provide the flash erase and program routines"));
        };

        Ok(Self {
            erase,
            program,
            connect: find_rom_func(iface, target, CONNECT_INTERNAL_FLASH)?,
            exit_xip: find_rom_func(iface, target, FLASH_EXIT_XIP)?,
            flush_cache: find_rom_func(iface, target, FLASH_FLUSH_CACHE)?,
        })
    }
}

/// RAM between the staging buffer and the return trap or stack, whichever
/// comes first.
fn staging_capacity(target: &Target) -> u32 {
    target
        .trap_address
        .min(target.stack_top)
        .saturating_sub(target.ram_buffer)
}

/// Round `value` up to a multiple of `unit`, `None` if that overflows.
fn round_up(value: u32, unit: u32) -> Option<u32> {
    value.div_ceil(unit).checked_mul(unit)
}

fn io_error(e: std::io::Error) -> Error {
    Error::new(ErrorKind::InvalidParam).with_context(format!("reading the image failed: {e}"))
}

/// Erase the flash and program `size` bytes of `image` into it, starting at
/// the beginning of flash.
///
/// The core is left halted. Every failure aborts the operation, nothing is
/// retried.
pub fn flash_firmware<R: Read + Seek>(
    iface: &mut dyn DebugInterface,
    core: &mut dyn CoreControl,
    target: &Target,
    image: &mut R,
    size: u32,
    options: &FlashOptions,
    progress: &FlashProgress,
) -> Result<(), Error> {
    options.validate(target)?;
    if size == 0 {
        return Err(Error::new(ErrorKind::InvalidParam).with_context("image is empty"));
    }
    let Some(erase_size) = round_up(size, SECTOR_SIZE) else {
        return Err(Error::new(ErrorKind::InvalidParam)
            .with_context(format!("image of {size} bytes exceeds the address space")));
    };

    image.seek(SeekFrom::Start(0)).map_err(io_error)?;

    let routines = FlashRoutines::find(iface, target)?;
    let trap = rom::return_trap(iface, core, target)?;

    core.halt(iface)?;
    let convention = core.calling_convention();
    core.write_core_reg(iface, convention.stack_pointer, target.stack_top)?;

    if let Some(connect) = routines.connect {
        call_rom_func(iface, core, trap, connect, [0; 4])?;
    }
    if let Some(exit_xip) = routines.exit_xip {
        call_rom_func(iface, core, trap, exit_xip, [0; 4])?;
    }

    tracing::info!("Erasing {} bytes of flash", erase_size);
    progress.started_erasing(erase_size);
    let start = Instant::now();
    if let Err(e) = call_rom_func(
        iface,
        core,
        trap,
        routines.erase,
        [0, erase_size, SECTOR_SIZE, SECTOR_ERASE_COMMAND],
    ) {
        progress.failed_erasing();
        return Err(e);
    }
    progress.finished_erasing(start.elapsed());

    progress.started_programming(size);
    let programmed = program_chunks(
        iface,
        core,
        target,
        trap,
        routines.program,
        image,
        size,
        options,
        progress,
    )
    .and_then(|()| match routines.flush_cache {
        Some(flush_cache) => call_rom_func(iface, core, trap, flush_cache, [0; 4]),
        None => Ok(()),
    });
    if let Err(e) = programmed {
        progress.failed_programming();
        return Err(e);
    }
    progress.finished_programming();

    tracing::info!("Programmed {} bytes", size);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn program_chunks<R: Read>(
    iface: &mut dyn DebugInterface,
    core: &mut dyn CoreControl,
    target: &Target,
    trap: u32,
    program: u32,
    image: &mut R,
    size: u32,
    options: &FlashOptions,
    progress: &FlashProgress,
) -> Result<(), Error> {
    let mut buffer = vec![0xFF; options.chunk_size as usize];
    let mut offset = 0;

    while offset < size {
        let start = Instant::now();
        let length = options.chunk_size.min(size - offset);

        let chunk = &mut buffer[..length as usize];
        image.read_exact(chunk).map_err(io_error)?;

        // The program routine only accepts whole pages. A chunk is a whole
        // number of pages, so padding never grows past it.
        let padded = round_up(length, PAGE_SIZE).unwrap_or(options.chunk_size);
        buffer[length as usize..padded as usize].fill(0xFF);

        stage(iface, target.ram_buffer, &buffer[..padded as usize], options.verify_staging)?;

        tracing::debug!("Programming {} bytes at offset {:#x}", padded, offset);
        call_rom_func(iface, core, trap, program, [offset, target.ram_buffer, padded, 0])?;

        progress.chunk_programmed(length, start.elapsed());
        iface.yield_now();

        offset += length;
    }

    Ok(())
}

/// Copy `data` word by word into target RAM at `address`.
fn stage(
    iface: &mut dyn DebugInterface,
    address: u32,
    data: &[u8],
    verify: bool,
) -> Result<(), Error> {
    for (i, word) in data.chunks_exact(4).enumerate() {
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        let word_address = address + i as u32 * 4;
        iface.write_word_32(word_address, value)?;

        if verify {
            let read_back = iface.read_word_32(word_address)?;
            if read_back != value {
                return Err(Error::new(ErrorKind::VerifyFailed).with_context(format!(
                    "staged {value:#010x} at {word_address:#010x}, read back {read_back:#010x}"
                )));
            }
        }
    }
    Ok(())
}
