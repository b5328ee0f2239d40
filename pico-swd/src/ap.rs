//! Memory access port registers and access port selection.

use bitfield::bitfield;

use crate::dp::Select;

/// Identifies one access port behind the debug port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApSelect {
    /// Access port index, SELECT bits 15:12.
    pub index: u8,
    /// Fixed vendor field, SELECT bits 11:8.
    pub vendor: u8,
}

impl ApSelect {
    pub const fn new(index: u8, vendor: u8) -> Self {
        Self { index, vendor }
    }

    /// The SELECT value that makes the bank holding `register` visible.
    pub fn select(&self, register: u8) -> Select {
        let mut select = Select::default();
        select.set_ap_index(self.index);
        select.set_vendor(self.vendor);
        select.set_ap_bank_sel(register >> 4);
        select.set_ctrl_sel(true);
        select
    }
}

/// A memory access port register at a fixed byte offset.
pub trait ApRegister: Clone + From<u32> + Into<u32> + Sized + std::fmt::Debug {
    const ADDRESS: u8;
    const NAME: &'static str;
}

macro_rules! ap_register {
    ($name:ident, $address:expr, $display:expr) => {
        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(raw: $name) -> Self {
                raw.0
            }
        }

        impl ApRegister for $name {
            const ADDRESS: u8 = $address;
            const NAME: &'static str = $display;
        }
    };
}

/// Access width selected through [`Csw::size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataSize {
    U8 = 0,
    U16 = 1,
    U32 = 2,
}

bitfield! {
    /// Control and status word.
    #[derive(Clone)]
    pub struct Csw(u32);
    impl Debug;
    pub dbg_sw_enable, set_dbg_sw_enable: 31;
    pub u8, prot, set_prot: 30, 24;
    pub tr_in_prog, _: 7;
    pub device_en, _: 6;
    pub u8, addr_inc, set_addr_inc: 5, 4;
    pub u8, size, set_size: 2, 0;
}

ap_register!(Csw, 0x00, "CSW");

impl Csw {
    /// Single 32 bit accesses with privileged, non-secure bus attributes.
    /// The address is never incremented.
    pub fn word_access() -> Self {
        let mut csw = Csw(0);
        csw.set_prot(0x23);
        csw.set_addr_inc(0);
        csw.set_size(DataSize::U32 as u8);
        csw
    }
}

bitfield! {
    /// Transfer address register.
    #[derive(Clone)]
    pub struct Tar(u32);
    impl Debug;
    pub u32, address, set_address: 31, 0;
}

ap_register!(Tar, 0x04, "TAR");

bitfield! {
    /// Data read/write register, accesses the word at TAR.
    #[derive(Clone)]
    pub struct Drw(u32);
    impl Debug;
    pub u32, data, set_data: 31, 0;
}

ap_register!(Drw, 0x0C, "DRW");

bitfield! {
    /// Identification register.
    #[derive(Clone)]
    pub struct Idr(u32);
    impl Debug;
    pub u8, revision, _: 31, 28;
    pub u16, designer, _: 27, 17;
    pub u8, class, _: 16, 13;
    pub u8, variant, _: 7, 4;
    pub u8, ap_type, _: 3, 0;
}

ap_register!(Idr, 0xFC, "IDR");
