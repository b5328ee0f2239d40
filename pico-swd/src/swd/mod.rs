//! The SWD wire protocol on top of [`SwdLink`](crate::link::SwdLink).

mod packet;
mod sequences;

pub use packet::{parity, PacketHeader, PortType};
pub use sequences::{ACTIVATION_CODE, LINE_RESET_CYCLES, SELECTION_ALERT};
