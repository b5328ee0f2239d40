//! Runs the `pico-swd` debug link from a Linux machine, such as a Raspberry
//! Pi wired to the target's debug header.
//!
//! Pins are driven through the GPIO character device (`/dev/gpiochipN`),
//! timing comes from the standard library.

mod clock;
#[cfg(target_os = "linux")]
mod gpio;

pub use clock::StdClock;
#[cfg(target_os = "linux")]
pub use gpio::{GpioError, LinuxGpio, LinuxHost};

/// GPIO chip used when none is configured.
pub const DEFAULT_CHIP: &str = "/dev/gpiochip0";

/// Consumer label shown for the requested lines, e.g. by `gpioinfo`.
pub const CONSUMER: &str = "pico-swd";
