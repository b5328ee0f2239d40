use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gpiocdev::line::{Bias, Value};
use gpiocdev::Request;
use pico_swd::{Clock, Error, ErrorKind, Gpio, PinId, PinMode};

use crate::{StdClock, CONSUMER};

/// Failures of the GPIO character device.
#[derive(thiserror::Error, docsplay::Display, Debug)]
pub enum GpioError {
    /// Failed to request GPIO{pin} from {chip}.
    Request {
        pin: PinId,
        chip: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to reconfigure GPIO{pin}.
    Reconfigure {
        pin: PinId,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to access GPIO{pin}.
    Access {
        pin: PinId,
        #[source]
        source: gpiocdev::Error,
    },
}

impl From<GpioError> for Error {
    fn from(error: GpioError) -> Self {
        let context = match std::error::Error::source(&error) {
            Some(source) => format!("{error}: {source}"),
            None => error.to_string(),
        };
        Error::new(ErrorKind::Bus).with_context(context)
    }
}

struct Line {
    request: Request,
    mode: PinMode,
    level: bool,
}

/// Pins of one GPIO chip.
///
/// A line is requested the first time its mode is set and stays requested
/// until the `LinuxGpio` is dropped. Levels set before that are latched.
pub struct LinuxGpio {
    chip: PathBuf,
    lines: HashMap<PinId, Line>,
    latched: HashMap<PinId, bool>,
}

impl LinuxGpio {
    pub fn new(chip: impl AsRef<Path>) -> Self {
        Self {
            chip: chip.as_ref().to_path_buf(),
            lines: HashMap::new(),
            latched: HashMap::new(),
        }
    }

    pub fn chip(&self) -> &Path {
        &self.chip
    }

    fn request(&self, pin: PinId, mode: PinMode, level: bool) -> Result<Request, GpioError> {
        tracing::debug!("Requesting GPIO{} from {} as {:?}", pin, self.chip.display(), mode);

        let mut builder = Request::builder();
        builder.on_chip(&self.chip).with_consumer(CONSUMER).with_line(pin);
        match mode {
            PinMode::Output => builder.as_output(value(level)),
            PinMode::Input => builder.as_input().with_bias(Bias::Disabled),
            PinMode::InputPullUp => builder.as_input().with_bias(Bias::PullUp),
        };

        builder.request().map_err(|source| GpioError::Request {
            pin,
            chip: self.chip.display().to_string(),
            source,
        })
    }
}

impl Gpio for LinuxGpio {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) -> Result<(), Error> {
        let level = self.latched.get(&pin).copied().unwrap_or(false);

        let Some(line) = self.lines.get_mut(&pin) else {
            let request = self.request(pin, mode, level)?;
            self.lines.insert(pin, Line { request, mode, level });
            return Ok(());
        };
        if line.mode == mode {
            return Ok(());
        }

        let mut config = line.request.config();
        config.with_line(pin);
        match mode {
            PinMode::Output => config.as_output(value(line.level)),
            PinMode::Input => config.as_input().with_bias(Bias::Disabled),
            PinMode::InputPullUp => config.as_input().with_bias(Bias::PullUp),
        };
        line.request
            .reconfigure(&config)
            .map_err(|source| GpioError::Reconfigure { pin, source })?;
        line.mode = mode;

        Ok(())
    }

    fn set_level(&mut self, pin: PinId, high: bool) -> Result<(), Error> {
        self.latched.insert(pin, high);

        let Some(line) = self.lines.get_mut(&pin) else {
            return Ok(());
        };
        line.level = high;
        if line.mode == PinMode::Output {
            line.request
                .set_value(pin, value(high))
                .map_err(|source| GpioError::Access { pin, source })?;
        }
        Ok(())
    }

    fn level(&mut self, pin: PinId) -> Result<bool, Error> {
        let Some(line) = self.lines.get(&pin) else {
            return Err(Error::new(ErrorKind::Bus)
                .with_context(format!("GPIO{pin} was never configured")));
        };
        let level = line
            .request
            .value(pin)
            .map_err(|source| GpioError::Access { pin, source })?;
        Ok(level == Value::Active)
    }
}

impl std::fmt::Debug for LinuxGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxGpio")
            .field("chip", &self.chip)
            .field("lines", &self.lines.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn value(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// A GPIO chip together with the standard library clock.
#[derive(Debug)]
pub struct LinuxHost {
    pub gpio: LinuxGpio,
    pub clock: StdClock,
}

impl LinuxHost {
    pub fn new(chip: impl AsRef<Path>) -> Self {
        Self {
            gpio: LinuxGpio::new(chip),
            clock: StdClock,
        }
    }
}

impl Gpio for LinuxHost {
    fn set_mode(&mut self, pin: PinId, mode: PinMode) -> Result<(), Error> {
        self.gpio.set_mode(pin, mode)
    }

    fn set_level(&mut self, pin: PinId, high: bool) -> Result<(), Error> {
        self.gpio.set_level(pin, high)
    }

    fn level(&mut self, pin: PinId) -> Result<bool, Error> {
        self.gpio.level(pin)
    }
}

impl Clock for LinuxHost {
    fn delay_us(&mut self, us: u32) {
        self.clock.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.delay_ms(ms);
    }

    fn yield_now(&mut self) {
        self.clock.yield_now();
    }
}
