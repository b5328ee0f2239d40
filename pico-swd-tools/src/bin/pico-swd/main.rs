mod cmd;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pico_swd::{Host, Session};

use crate::util::config::{Config, ConfigOverrides};
use crate::util::logging::{setup_logging, Verbosity};

#[derive(clap::Parser)]
#[clap(
    name = "pico-swd",
    about = "Flash and control RP2040 and RP2350 targets over bit-banged SWD",
    version
)]
struct Cli {
    /// Configuration file. Missing files are ignored.
    #[clap(
        long,
        global = true,
        env = "PICO_SWD_CONFIG",
        default_value = "pico-swd.toml",
        help_heading = "CONFIGURATION"
    )]
    config: PathBuf,

    /// Log level. Falls back to RUST_LOG and then to WARN.
    #[clap(long, global = true, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<Verbosity>,

    #[clap(flatten)]
    overrides: ConfigOverrides,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// Connect and show the debug port and boot ROM of the target
    Info(cmd::info::Cmd),
    /// Write a binary image to the start of flash and reboot the target
    Flash(cmd::flash::Cmd),
    /// Reset the target
    Reset(cmd::reset::Cmd),
    Read(cmd::read::Cmd),
    Write(cmd::write::Cmd),
}

impl Subcommand {
    fn run<H: Host>(self, host: H, config: &Config) -> Result<()> {
        let target = config.target()?;
        let mut session =
            Session::new(host, config.link_config(), target).context("Invalid pin configuration")?;

        match self {
            Subcommand::Info(cmd) => cmd.run(&mut session),
            Subcommand::Flash(cmd) => cmd.run(&mut session, config),
            Subcommand::Reset(cmd) => cmd.run(&mut session),
            Subcommand::Read(cmd) => cmd.run(&mut session),
            Subcommand::Write(cmd) => cmd.run(&mut session),
        }
    }
}

#[cfg(target_os = "linux")]
fn run(subcommand: Subcommand, config: &Config) -> Result<()> {
    let host = pico_swd_linux::LinuxHost::new(&config.chip);
    subcommand.run(host, config)
}

#[cfg(not(target_os = "linux"))]
fn run(_subcommand: Subcommand, _config: &Config) -> Result<()> {
    anyhow::bail!("Driving GPIO lines is only supported on Linux hosts")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config, &cli.overrides)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    setup_logging(cli.log_level.or(config.log_level));
    tracing::debug!("Using {:?}", config);

    run(cli.subcommand, &config)
}
