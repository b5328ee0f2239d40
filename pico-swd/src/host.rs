//! The pin and timing primitives a host has to provide to drive the debug link.

use crate::Error;

/// Host GPIO line number.
pub type PinId = u32;

/// Direction and bias of a host pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Driven by the host.
    Output,
    /// Floating input, nothing pulls the line.
    Input,
    /// Input with the host's pull-up enabled.
    InputPullUp,
}

/// Access to the host's general purpose pins.
pub trait Gpio {
    /// Change the direction and bias of `pin`.
    fn set_mode(&mut self, pin: PinId, mode: PinMode) -> Result<(), Error>;

    /// Set the output level of `pin`.
    ///
    /// The level is latched even while the pin is an input, and takes
    /// effect once it is switched to [`PinMode::Output`].
    fn set_level(&mut self, pin: PinId, high: bool) -> Result<(), Error>;

    /// Sample the current level of `pin`.
    fn level(&mut self, pin: PinId) -> Result<bool, Error>;
}

/// Blocking delays, plus a hook to keep the host scheduler alive.
pub trait Clock {
    /// Busy wait for `us` microseconds.
    fn delay_us(&mut self, us: u32);

    /// Wait for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }

    /// Called from every poll loop so the host can feed watchdogs or run
    /// other tasks.
    fn yield_now(&mut self) {}
}

/// Everything the debug link needs from the host.
pub trait Host: Gpio + Clock {}

impl<T: Gpio + Clock> Host for T {}
