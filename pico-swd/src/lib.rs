//! # Bit-banged SWD for RP2040 and RP2350
//!
//! Drives the Serial Wire Debug protocol over two host GPIO lines to wake,
//! select and control a Raspberry Pi microcontroller, and writes firmware to
//! its flash through the boot ROM's flash routines.
//!
//! ## Flashing an image
//!
//! ```no_run
//! # use pico_swd::{Error, Host, LinkConfig, Session, Target};
//! # fn flash<H: Host>(host: H, image: &[u8]) -> Result<(), Error> {
//! let config = LinkConfig::new(2, 3).with_reset(4);
//! let mut session = Session::new(host, config, Target::rp2040())?;
//!
//! session.begin()?;
//! session.flash_firmware(&mut std::io::Cursor::new(image), image.len() as u32)?;
//! session.reset_target()?;
//! # Ok(())
//! # }
//! ```
//!
//! The crate is built around the [`Host`] trait the caller implements, the
//! [`Target`] profiles and the [`Session`] that ties them together.

pub mod ap;
pub mod core;
pub mod dp;
mod error;
pub mod flashing;
mod host;
pub mod interface;
mod link;
pub mod retry;
pub mod rom;
mod session;
pub mod swd;
mod target;

#[cfg(any(test, feature = "test"))]
pub mod test;

pub use crate::error::{Error, ErrorKind};
pub use crate::host::{Clock, Gpio, Host, PinId, PinMode};
pub use crate::link::{LinkConfig, LinkStatistics, SwdLink};
pub use crate::session::Session;
pub use crate::target::{CoreFamily, RomTableLayout, Target};
