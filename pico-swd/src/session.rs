//! The debug session, the only entry point most users need.

use std::io::{Read, Seek};

use crate::ap::{Csw, Idr};
use crate::core::{backend_for, CoreControl};
use crate::dp::{Abort, Ctrl, Dpidr, Select};
use crate::flashing::{self, FlashOptions, FlashProgress};
use crate::host::{Host, PinMode};
use crate::interface::{DebugInterface, DebugInterfaceExt, SwdInterface};
use crate::link::{LinkConfig, LinkStatistics, SwdLink};
use crate::retry::{any_error, is_wait, Retry};
use crate::rom;
use crate::target::Target;
use crate::{Error, ErrorKind};

const IDENTIFY: Retry = Retry::new("reading IDCODE", 3).retry_on(any_error);

const POWER_UP: Retry = Retry::new("debug power up", 10)
    .with_interval_ms(1)
    .retry_on(is_wait);

/// Time the target gets to process TARGETSEL.
const SELECTION_DELAY_MS: u32 = 1;

/// A debug connection to one target.
///
/// The session owns the host pins. It starts out disconnected; every register
/// and memory access fails with [`ErrorKind::NotConnected`] until
/// [`Session::begin`] succeeds, without touching the pins.
pub struct Session<H: Host> {
    iface: SwdInterface<H>,
    config: LinkConfig,
    target: Target,
    core: Box<dyn CoreControl>,
    connected: bool,
    idcode: Option<u32>,
    last_error: Option<Error>,
}

impl<H: Host> Session<H> {
    /// Create a disconnected session. No pin is touched.
    pub fn new(host: H, config: LinkConfig, target: Target) -> Result<Self, Error> {
        config.validate()?;

        let link = SwdLink::new(host, &config);
        Ok(Self {
            iface: SwdInterface::new(link, target.mem_ap),
            core: backend_for(&target),
            config,
            target,
            connected: false,
            idcode: None,
            last_error: None,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        self.iface.link().host()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.iface.link_mut().host_mut()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The error that ended the last failed operation.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// The DPIDR value read by the last successful [`Session::begin`].
    pub fn idcode(&self) -> Option<u32> {
        self.idcode
    }

    pub fn statistics(&self) -> &LinkStatistics {
        self.iface.link().statistics()
    }

    fn record<T>(&mut self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(e) = &result {
            self.last_error = Some(e.clone());
        }
        result
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::NotConnected))
        }
    }

    /// Wake, select and power up the target, then bring up the core's debug
    /// logic.
    ///
    /// On failure the pins are released and the session stays disconnected.
    pub fn begin(&mut self) -> Result<(), Error> {
        tracing::info!("Connecting to {}", self.target.name);
        self.connected = false;
        self.idcode = None;

        match self.connect() {
            Ok(idcode) => {
                tracing::info!("Connected, IDCODE {:#010x}", idcode);
                self.idcode = Some(idcode);
                self.connected = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Connecting to {} failed: {}", self.target.name, e);
                let released = self.iface.link_mut().release_pins(PinMode::InputPullUp);
                if let Err(release_error) = released {
                    tracing::warn!("Failed to release the debug pins: {}", release_error);
                }
                self.record(Err(e))
            }
        }
    }

    fn connect(&mut self) -> Result<u32, Error> {
        let targetsel = self.target.targetsel;

        let link = self.iface.link_mut();
        link.drive_pins()?;
        wake_and_select(link, targetsel)?;

        let idcode = IDENTIFY.run(&mut self.iface, |iface, attempt| {
            if attempt > 0 {
                tracing::debug!("Retrying identification, attempt {}", attempt + 1);
                wake_and_select(iface.link_mut(), targetsel)?;
            }

            iface.write_dp_register(Abort::clear_all())?;
            let dpidr: Dpidr = iface.read_dp_register()?;

            if !dpidr.is_plausible() {
                return Err(Error::new(ErrorKind::Protocol)
                    .with_context(format!("implausible IDCODE {:#010x}", dpidr.0)));
            }
            Ok(Some(dpidr.0))
        })?;

        if idcode != self.target.idcode {
            tracing::warn!(
                "IDCODE {:#010x} does not match the expected {:#010x} of {}",
                idcode,
                self.target.idcode,
                self.target.name
            );
        }

        self.power_up()?;
        self.init_mem_ap()?;

        self.core = backend_for(&self.target);
        self.core.debug_core_start(&mut self.iface)?;

        Ok(idcode)
    }

    fn power_up(&mut self) -> Result<(), Error> {
        self.iface.write_dp_register(Ctrl::power_up_request())?;

        POWER_UP.run(&mut self.iface, |iface, _| {
            let ctrl: Ctrl = iface.read_dp_register()?;
            Ok(ctrl.is_powered().then_some(()))
        })?;

        tracing::debug!("Debug and system domains powered");
        Ok(())
    }

    fn init_mem_ap(&mut self) -> Result<(), Error> {
        let mem_ap = self.target.mem_ap;
        self.iface.write_ap_register(mem_ap, Csw::word_access())?;

        let idr: Idr = self.iface.read_ap_register(mem_ap)?;
        if idr.0 == 0 || idr.0 == u32::MAX {
            tracing::warn!("Memory access port {:#x} reports IDR {:#010x}", mem_ap.index, idr.0);
        }
        Ok(())
    }

    /// Power down the debug domain and release the pins.
    ///
    /// Does nothing when not connected.
    pub fn end(&mut self) {
        if !self.connected {
            return;
        }
        tracing::info!("Disconnecting from {}", self.target.name);

        if let Err(e) = self.iface.write_dp_register(Select::default()) {
            tracing::warn!("Failed to reset SELECT: {}", e);
        }
        if let Err(e) = self.iface.write_dp_register(Ctrl::default()) {
            tracing::warn!("Failed to power down the debug domain: {}", e);
        }
        if let Err(e) = self.iface.link_mut().release_pins(PinMode::InputPullUp) {
            tracing::warn!("Failed to release the debug pins: {}", e);
        }

        self.connected = false;
    }

    /// Reset the target and let it boot.
    ///
    /// With a reset pin the reset is done in hardware, after every other pin
    /// connected to the target has been floated. Without one a connected
    /// session asks the core for a system reset. The session is disconnected
    /// afterwards in both cases.
    pub fn reset_target(&mut self) -> Result<(), Error> {
        let result = match self.config.reset {
            Some(_) => self.hardware_reset(),
            None => self.system_reset(),
        };
        self.record(result)
    }

    fn hardware_reset(&mut self) -> Result<(), Error> {
        let Some(reset) = self.config.reset else {
            return Err(Error::new(ErrorKind::InvalidConfig).with_context("no reset pin"));
        };
        tracing::info!("Resetting {} through GPIO{}", self.target.name, reset);

        self.connected = false;

        // A driven pin can back-power the target or hold it in a boot mode.
        let link = self.iface.link_mut();
        let host = link.host_mut();
        for pin in self.config.target_pins() {
            host.set_mode(pin, PinMode::Input)?;
        }

        host.set_level(reset, false)?;
        host.set_mode(reset, PinMode::Output)?;
        host.delay_ms(self.config.reset_hold_ms);

        host.set_mode(reset, PinMode::Input)?;
        host.delay_ms(self.config.boot_settle_ms);

        // Floating debug lines pick up noise while the target runs.
        link.release_pins(PinMode::InputPullUp)
    }

    fn system_reset(&mut self) -> Result<(), Error> {
        self.ensure_connected()?;
        tracing::info!("Resetting {} through the debug port", self.target.name);

        self.core.halt(&mut self.iface)?;
        if let Err(e) = self.core.reset_system(&mut self.iface) {
            // The reset can cut the acknowledge of the request itself.
            tracing::warn!("Reset request not acknowledged: {}", e);
        }

        self.connected = false;
        let link = self.iface.link_mut();
        link.release_pins(PinMode::InputPullUp)?;
        link.delay_ms(self.config.boot_settle_ms);

        Ok(())
    }

    /// Read a word of target memory.
    pub fn read_word(&mut self, address: u32) -> Result<u32, Error> {
        let result = self
            .ensure_connected()
            .and_then(|()| self.iface.read_word_32(address));
        self.record(result)
    }

    /// Write a word of target memory.
    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), Error> {
        let result = self
            .ensure_connected()
            .and_then(|()| self.iface.write_word_32(address, value));
        self.record(result)
    }

    /// Halt the core.
    pub fn halt(&mut self) -> Result<(), Error> {
        let result = self
            .ensure_connected()
            .and_then(|()| self.core.halt(&mut self.iface));
        self.record(result)
    }

    /// Look up a boot ROM routine by its two-character tag.
    pub fn find_rom_func(&mut self, code: u16) -> Result<Option<u32>, Error> {
        let result = self
            .ensure_connected()
            .and_then(|()| rom::find_rom_func(&mut self.iface, &self.target, code));
        self.record(result)
    }

    /// Call the routine at `func` and wait for it to return.
    pub fn call_rom_func(&mut self, func: u32, args: [u32; 4]) -> Result<(), Error> {
        let result = self.ensure_connected().and_then(|()| {
            let trap = rom::return_trap(&mut self.iface, self.core.as_ref(), &self.target)?;
            rom::call_rom_func(&mut self.iface, self.core.as_mut(), trap, func, args)
        });
        self.record(result)
    }

    /// Erase the flash and program `size` bytes of `image`.
    pub fn flash_firmware<R: Read + Seek>(
        &mut self,
        image: &mut R,
        size: u32,
    ) -> Result<(), Error> {
        let options = FlashOptions::default();
        self.flash_firmware_with(image, size, &options, &FlashProgress::empty())
    }

    /// [`Session::flash_firmware`] with explicit options and progress reporting.
    pub fn flash_firmware_with<R: Read + Seek>(
        &mut self,
        image: &mut R,
        size: u32,
        options: &FlashOptions,
        progress: &FlashProgress,
    ) -> Result<(), Error> {
        let result = self.ensure_connected().and_then(|()| {
            flashing::flash_firmware(
                &mut self.iface,
                self.core.as_mut(),
                &self.target,
                image,
                size,
                options,
                progress,
            )
        });
        self.record(result)
    }
}

impl<H: Host> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target.name)
            .field("connected", &self.connected)
            .field("idcode", &self.idcode)
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}

/// Wake the target and address it, leaving the line idle.
fn wake_and_select<H: Host>(link: &mut SwdLink<H>, targetsel: u32) -> Result<(), Error> {
    link.wake_from_dormant()?;
    link.select_target(targetsel)?;
    link.delay_ms(SELECTION_DELAY_MS);
    link.soft_line_reset()
}
