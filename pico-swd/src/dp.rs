//! Debug port registers.

use bitfield::bitfield;

/// A debug port register at a fixed byte offset.
pub trait DpRegister: Clone + From<u32> + Into<u32> + Sized + std::fmt::Debug {
    const ADDRESS: u8;
    const NAME: &'static str;
}

macro_rules! dp_register {
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

        impl DpRegister for $name {
            const ADDRESS: u8 = $address;
            const NAME: &'static str = $display;
        }
    };
}

bitfield! {
    /// Identification register, read at offset 0x0.
    #[derive(Clone)]
    pub struct Dpidr(u32);
    impl Debug;
    pub u8, revision, _: 31, 28;
    pub u8, part_no, _: 27, 20;
    pub min, _: 16;
    pub u8, version, _: 15, 12;
    pub u16, designer, _: 11, 1;
}

dp_register!(Dpidr, 0x0, "DPIDR");

impl Dpidr {
    /// Whether the value can have come from a responding target.
    pub fn is_plausible(&self) -> bool {
        self.0 != 0 && self.0 != u32::MAX
    }
}

bitfield! {
    /// Abort register, written at offset 0x0.
    #[derive(Clone)]
    pub struct Abort(u32);
    impl Debug;
    pub _, set_orunerrclr: 4;
    pub _, set_wderrclr: 3;
    pub _, set_stkerrclr: 2;
    pub _, set_stkcmpclr: 1;
    pub _, set_dapabort: 0;
}

dp_register!(Abort, 0x0, "ABORT");

impl Abort {
    /// Clear every sticky flag without aborting a transaction in flight.
    pub fn clear_all() -> Self {
        let mut abort = Abort(0);
        abort.set_orunerrclr(true);
        abort.set_wderrclr(true);
        abort.set_stkerrclr(true);
        abort.set_stkcmpclr(true);
        abort
    }
}

bitfield! {
    /// Control and status register.
    #[derive(Clone, Default)]
    pub struct Ctrl(u32);
    impl Debug;
    pub csyspwrupack, _: 31;
    pub csyspwrupreq, set_csyspwrupreq: 30;
    pub cdbgpwrupack, _: 29;
    pub cdbgpwrupreq, set_cdbgpwrupreq: 28;
    pub cdbgrstack, _: 27;
    pub c_dbg_rst_req, set_c_dbg_rst_req: 26;
    pub w_data_err, _: 7;
    pub read_ok, _: 6;
    pub sticky_err, _: 5;
    pub stick_cmp, _: 4;
    pub sticky_orun, _: 1;
}

dp_register!(Ctrl, 0x4, "CTRL/STAT");

impl Ctrl {
    /// Request both the debug and the system power domain.
    pub fn power_up_request() -> Self {
        let mut ctrl = Ctrl(0);
        ctrl.set_cdbgpwrupreq(true);
        ctrl.set_csyspwrupreq(true);
        ctrl
    }

    pub fn is_powered(&self) -> bool {
        self.cdbgpwrupack() && self.csyspwrupack()
    }
}

bitfield! {
    /// Bank and access port selection.
    ///
    /// The access port address occupies bits 15:8, split into the port
    /// index and a fixed vendor field.
    #[derive(Clone, Default, PartialEq, Eq)]
    pub struct Select(u32);
    impl Debug;
    pub u8, ap_index, set_ap_index: 15, 12;
    pub u8, vendor, set_vendor: 11, 8;
    pub u8, ap_bank_sel, set_ap_bank_sel: 7, 4;
    pub ctrl_sel, set_ctrl_sel: 0;
}

dp_register!(Select, 0x8, "SELECT");

bitfield! {
    /// Read buffer holding the result of the last posted access port read.
    #[derive(Clone)]
    pub struct RdBuff(u32);
    impl Debug;
    pub u32, data, _: 31, 0;
}

dp_register!(RdBuff, 0xC, "RDBUFF");

bitfield! {
    /// Multidrop target selection, written at offset 0xC directly after a wake.
    #[derive(Clone)]
    pub struct TargetSel(u32);
    impl Debug;
    pub u8, instance, set_instance: 31, 28;
    pub u16, part_no, set_part_no: 27, 12;
    pub u16, designer, set_designer: 11, 1;
}

dp_register!(TargetSel, 0xC, "TARGETSEL");
