//! Helpers for testing code built on the debug link.


pub use mock_target::{Ack, MockTarget, RomCall, Transaction};

use crate::host::{Clock, Gpio, PinId, PinMode};
use crate::Error;

/// Something the host was asked to do with its pins or its clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinEvent {
    Mode(PinId, PinMode),
    Level(PinId, bool),
    /// A millisecond delay.
    Sleep(u32),
}

/// A host that records every pin operation.
///
/// Reads are answered from `input`, front first. Once it is empty every
/// read returns high, like a line held by a pull-up.
#[derive(Debug, Default)]
pub struct PinLog {
    pub events: Vec<PinEvent>,
    pub input: Vec<bool>,
}

impl Gpio for PinLog {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) -> Result<(), Error> {
        self.events.push(PinEvent::Mode(pin, mode));
        Ok(())
    }

    fn set_level(&mut self, pin: PinId, high: bool) -> Result<(), Error> {
        self.events.push(PinEvent::Level(pin, high));
        Ok(())
    }

    fn level(&mut self, _pin: PinId) -> Result<bool, Error> {
        if self.input.is_empty() {
            Ok(true)
        } else {
            Ok(self.input.remove(0))
        }
    }
}

impl Clock for PinLog {
    fn delay_us(&mut self, _us: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.events.push(PinEvent::Sleep(ms));
    }
}
