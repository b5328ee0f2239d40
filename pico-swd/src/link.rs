//! Bit level access to the SWDIO / SWCLK pair.

use crate::host::{Host, PinId, PinMode};
use crate::{Error, ErrorKind};

/// Pin assignment and timing of one debug link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// The bidirectional data pin.
    pub swdio: PinId,
    /// The clock pin.
    pub swclk: PinId,
    /// The target's reset line, if it is wired up.
    pub reset: Option<PinId>,
    /// Other pins connected to the target, floated before a hardware reset.
    pub extra_pins: Vec<PinId>,
    /// Delay of each clock phase in microseconds.
    pub half_period_us: u32,
    /// How long the reset line is held low.
    pub reset_hold_ms: u32,
    /// How long the target is given to boot after a reset.
    pub boot_settle_ms: u32,
}

impl LinkConfig {
    /// A link on the given data and clock pins without a reset line.
    pub fn new(swdio: PinId, swclk: PinId) -> Self {
        Self {
            swdio,
            swclk,
            reset: None,
            extra_pins: Vec::new(),
            half_period_us: 1,
            reset_hold_ms: 10,
            boot_settle_ms: 100,
        }
    }

    pub fn with_reset(mut self, reset: PinId) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Float `pin` together with the debug pins before asserting reset.
    pub fn with_extra_pin(mut self, pin: PinId) -> Self {
        self.extra_pins.push(pin);
        self
    }

    pub fn with_half_period_us(mut self, half_period_us: u32) -> Self {
        self.half_period_us = half_period_us;
        self
    }

    pub fn with_reset_timing(mut self, hold_ms: u32, settle_ms: u32) -> Self {
        self.reset_hold_ms = hold_ms;
        self.boot_settle_ms = settle_ms;
        self
    }

    /// Check that no pin is assigned twice.
    pub fn validate(&self) -> Result<(), Error> {
        let mut pins = vec![self.swdio, self.swclk];
        pins.extend(self.reset);

        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(Error::new(ErrorKind::InvalidConfig)
                    .with_context(format!("GPIO{pin} is assigned more than once")));
            }
        }

        if let Some(pin) = self.extra_pins.iter().find(|pin| pins.contains(pin)) {
            return Err(Error::new(ErrorKind::InvalidConfig)
                .with_context(format!("GPIO{pin} is both a debug pin and an extra pin")));
        }

        Ok(())
    }

    /// Every pin that is electrically connected to the target, except reset.
    pub(crate) fn target_pins(&self) -> impl Iterator<Item = PinId> + '_ {
        [self.swdio, self.swclk]
            .into_iter()
            .chain(self.extra_pins.iter().copied())
    }
}

/// Counters of what happened on the wire, used for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatistics {
    /// Number of packets issued.
    pub transfers: usize,
    /// Number of WAIT responses.
    pub wait_responses: usize,
    /// Number of FAULT responses.
    pub fault_responses: usize,
    /// Number of packets without a valid acknowledge.
    pub protocol_errors: usize,
    /// Number of read packets with a bad data parity.
    pub parity_errors: usize,
    /// Number of line resets sent.
    pub line_resets: usize,
    /// Number of dormant wake sequences sent.
    pub wakes: usize,
}

/// Half-duplex bit transport on two host pins.
///
/// All bits go out least significant bit first. The data line direction is
/// only changed through [`SwdLink::drive_swdio`] and [`SwdLink::release_swdio`],
/// never implicitly by a turnaround.
pub struct SwdLink<H> {
    host: H,
    swdio: PinId,
    swclk: PinId,
    half_period_us: u32,
    pub(crate) statistics: LinkStatistics,
}

impl<H: Host> SwdLink<H> {
    pub fn new(host: H, config: &LinkConfig) -> Self {
        Self {
            host,
            swdio: config.swdio,
            swclk: config.swclk,
            half_period_us: config.half_period_us,
            statistics: LinkStatistics::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn statistics(&self) -> &LinkStatistics {
        &self.statistics
    }

    /// Take control of both lines: clock low, data driven high.
    pub fn drive_pins(&mut self) -> Result<(), Error> {
        self.host.set_level(self.swclk, false)?;
        self.host.set_mode(self.swclk, PinMode::Output)?;
        self.host.set_level(self.swdio, true)?;
        self.host.set_mode(self.swdio, PinMode::Output)
    }

    /// Put both lines into `mode`, which should be one of the input modes.
    pub fn release_pins(&mut self, mode: PinMode) -> Result<(), Error> {
        self.host.set_mode(self.swdio, mode)?;
        self.host.set_mode(self.swclk, mode)
    }

    pub fn drive_swdio(&mut self) -> Result<(), Error> {
        self.host.set_mode(self.swdio, PinMode::Output)
    }

    pub fn release_swdio(&mut self) -> Result<(), Error> {
        self.host.set_mode(self.swdio, PinMode::InputPullUp)
    }

    fn half_period(&mut self) {
        self.host.delay_us(self.half_period_us);
    }

    /// Clock out the lowest `count` bits of `value`.
    pub fn write_bits(&mut self, value: u64, count: u8) -> Result<(), Error> {
        debug_assert!(count <= 64);

        for i in 0..count {
            self.host.set_level(self.swclk, false)?;
            self.half_period();
            self.host.set_level(self.swdio, (value >> i) & 1 == 1)?;
            self.half_period();
            self.host.set_level(self.swclk, true)?;
            self.half_period();
        }

        self.host.set_level(self.swclk, false)
    }

    /// Release the data line and clock in `count` bits, sampled after each
    /// rising edge.
    pub fn read_bits(&mut self, count: u8) -> Result<u64, Error> {
        debug_assert!(count <= 64);

        self.release_swdio()?;

        let mut value = 0;
        for i in 0..count {
            self.host.set_level(self.swclk, false)?;
            self.half_period();
            self.host.set_level(self.swclk, true)?;
            if self.host.level(self.swdio)? {
                value |= 1 << i;
            }
            self.half_period();
        }

        Ok(value)
    }

    /// A single clock cycle while the line changes hands.
    pub fn turnaround(&mut self) -> Result<(), Error> {
        self.host.set_level(self.swclk, false)?;
        self.half_period();
        self.host.set_level(self.swclk, true)?;
        self.half_period();
        Ok(())
    }

    /// Clock `cycles` cycles with the data line held at `level`.
    pub fn hold_line(&mut self, level: bool, cycles: usize) -> Result<(), Error> {
        let pattern = if level { u64::MAX } else { 0 };
        let mut remaining = cycles;
        while remaining > 0 {
            let chunk = remaining.min(64);
            self.write_bits(pattern, chunk as u8)?;
            remaining -= chunk;
        }
        Ok(())
    }

    pub(crate) fn delay_us(&mut self, us: u32) {
        self.host.delay_us(us);
    }

    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.host.delay_ms(ms);
    }

    pub(crate) fn yield_now(&mut self) {
        self.host.yield_now();
    }
}
