//! Log output that does not tear the progress bars.

use std::io::{self, Write};

use indicatif::MultiProgress;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Bars on screen while flashing.
static BARS: Mutex<Option<MultiProgress>> = Mutex::new(None);

/// How much the debug link and the tool report.
///
/// Only messages of this workspace are affected, other crates stay at
/// warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    fn directives(self) -> String {
        let level = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        // Targets match by prefix, so this covers pico_swd_linux too.
        format!("warn,pico_swd={level}")
    }
}

/// Stderr, with the bars cleared while a line is written.
struct BarAwareStderr;

impl Write for BarAwareStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match BARS.lock().as_ref() {
            Some(bars) => bars.suspend(|| io::stderr().write(buf)),
            None => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Log to stderr at `verbosity`, or as `RUST_LOG` says if none is given.
pub fn setup_logging(verbosity: Option<Verbosity>) {
    let filter = match verbosity {
        Some(verbosity) => EnvFilter::new(verbosity.directives()),
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .from_env_lossy(),
    };

    let stderr = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_writer(|| BarAwareStderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr).init();
}

/// Route log lines around `bars` until [`hide_bars`].
pub fn show_bars(bars: MultiProgress) {
    *BARS.lock() = Some(bars);
}

pub fn hide_bars() {
    *BARS.lock() = None;
}

#[cfg(test)]
mod test {
    use super::*;
    use test_case::test_case;

    #[test_case(Verbosity::Error => "warn,pico_swd=error")]
    #[test_case(Verbosity::Info => "warn,pico_swd=info")]
    #[test_case(Verbosity::Trace => "warn,pico_swd=trace")]
    fn scoped_to_the_workspace(verbosity: Verbosity) -> String {
        verbosity.directives()
    }

    #[test]
    fn directives_parse() {
        assert!(EnvFilter::try_new(Verbosity::Debug.directives()).is_ok());
    }
}
