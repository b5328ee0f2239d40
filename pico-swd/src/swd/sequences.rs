use crate::dp::{DpRegister, TargetSel};
use crate::host::Host;
use crate::link::SwdLink;
use crate::swd::PortType;
use crate::Error;

/// Selection alert that takes a dormant debug port out of the dormant state,
/// in transmission order. Every byte goes out least significant bit first.
pub const SELECTION_ALERT: [u8; 16] = [
    0x92, 0xF3, 0x09, 0x62, 0x95, 0x2D, 0x85, 0x86, 0xE9, 0xAF, 0xDD, 0xE3, 0xA2, 0x0E, 0xBC, 0x19,
];

/// Four low cycles followed by the SWD activation code 0x1A.
pub const ACTIVATION_CODE: [u8; 2] = [0xA0, 0x01];

/// Number of high cycles sent as a line reset.
pub const LINE_RESET_CYCLES: usize = 60;

const IDLE_CYCLES: usize = 4;

impl<H: Host> SwdLink<H> {
    /// Hold the data line high long enough for any SWD target to reset its
    /// protocol state machine.
    pub fn line_reset(&mut self) -> Result<(), Error> {
        self.statistics.line_resets += 1;
        self.hold_line(true, LINE_RESET_CYCLES)
    }

    /// Drive the data line low for a few cycles so the next start bit is seen
    /// as a rising edge.
    pub fn idle(&mut self) -> Result<(), Error> {
        self.hold_line(false, IDLE_CYCLES)
    }

    /// A line reset followed by idle cycles, without the dormant wake bytes.
    pub fn soft_line_reset(&mut self) -> Result<(), Error> {
        self.line_reset()?;
        self.idle()
    }

    /// Bring a multidrop target out of the dormant state into SWD.
    ///
    /// After this the only legal request is a TARGETSEL write.
    pub fn wake_from_dormant(&mut self) -> Result<(), Error> {
        tracing::debug!("Sending dormant wake sequence");
        self.statistics.wakes += 1;

        self.drive_swdio()?;
        self.line_reset()?;

        let alert = u128::from_le_bytes(SELECTION_ALERT);
        self.write_bits(alert as u64, 64)?;
        self.write_bits((alert >> 64) as u64, 64)?;

        self.write_bits(u16::from_le_bytes(ACTIVATION_CODE) as u64, 16)?;

        self.line_reset()?;
        self.idle()
    }

    /// Address one device on the multidrop bus.
    pub fn select_target(&mut self, targetsel: u32) -> Result<(), Error> {
        tracing::debug!("Selecting target {:#010x}", targetsel);
        self.write_packet(PortType::DebugPort, TargetSel::ADDRESS, targetsel, true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::link::LinkConfig;
    use crate::test::PinLog;
    use pretty_assertions::assert_eq;

    fn sent_bits(log: &PinLog, swdio: u32, swclk: u32) -> Vec<bool> {
        // The level of SWDIO at every rising clock edge.
        let mut level = false;
        let mut bits = Vec::new();
        for event in &log.events {
            match *event {
                crate::test::PinEvent::Level(pin, high) if pin == swdio => level = high,
                crate::test::PinEvent::Level(pin, true) if pin == swclk => bits.push(level),
                _ => {}
            }
        }
        bits
    }

    #[test]
    fn wake_sequence_order() {
        let mut link = SwdLink::new(PinLog::default(), &LinkConfig::new(0, 1));
        link.wake_from_dormant().unwrap();

        let bits = sent_bits(link.host(), 0, 1);
        let mut expected = vec![true; LINE_RESET_CYCLES];
        for byte in SELECTION_ALERT.iter().chain(ACTIVATION_CODE.iter()) {
            expected.extend((0..8).map(|i| byte >> i & 1 == 1));
        }
        expected.extend(vec![true; LINE_RESET_CYCLES]);
        expected.extend(vec![false; IDLE_CYCLES]);

        assert_eq!(bits, expected);
        assert_eq!(link.statistics().wakes, 1);
        assert_eq!(link.statistics().line_resets, 2);
    }

    #[test]
    fn activation_code_is_framed_by_low_cycles() {
        let bits: Vec<bool> = ACTIVATION_CODE
            .iter()
            .flat_map(|byte| (0..8).map(move |i| byte >> i & 1 == 1))
            .collect();

        let code = bits[4..12]
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, bit)| acc | (*bit as u8) << i);

        assert!(bits[..4].iter().all(|bit| !bit));
        assert_eq!(code, 0x1A);
        assert!(bits[12..].iter().all(|bit| !bit));
    }

    #[test]
    fn targetsel_has_no_turnaround() {
        let mut link = SwdLink::new(PinLog::default(), &LinkConfig::new(0, 1));
        link.select_target(0x0100_2927).unwrap();

        let bits = sent_bits(link.host(), 0, 1);
        assert_eq!(bits.len(), 8 + 32 + 1);
        assert!(link
            .host()
            .events
            .iter()
            .all(|event| !matches!(event, crate::test::PinEvent::Mode(0, _))));
    }
}
