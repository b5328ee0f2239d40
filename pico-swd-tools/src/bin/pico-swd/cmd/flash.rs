use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::Context;
use pico_swd::flashing::FlashProgress;
use pico_swd::{Host, Session};

use crate::util::attached;
use crate::util::config::Config;
use crate::util::progress::FlashBars;

/// Write a raw binary image to the start of flash
///
/// The target is reset afterwards so it boots the new image, unless
/// --no-reset is given.
#[derive(clap::Parser)]
#[clap(verbatim_doc_comment)]
pub struct Cmd {
    /// Binary image, as produced by `objcopy -O binary`
    path: PathBuf,

    /// Leave the core halted instead of resetting it
    #[clap(long)]
    no_reset: bool,

    /// Hide the progress bars
    #[clap(long)]
    disable_progressbars: bool,
}

impl Cmd {
    pub fn run<H: Host>(self, session: &mut Session<H>, config: &Config) -> anyhow::Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let size = file
            .metadata()
            .with_context(|| format!("Failed to read the size of {}", self.path.display()))?
            .len();
        let size = u32::try_from(size).context("Image does not fit into the address space")?;
        anyhow::ensure!(size > 0, "{} is empty", self.path.display());

        let mut image = BufReader::new(file);
        let options = config.flash_options();

        attached(session, |session| {
            let bars = (!self.disable_progressbars).then(FlashBars::show);
            let progress = bars.as_ref().map_or_else(FlashProgress::empty, FlashBars::progress);

            session
                .flash_firmware_with(&mut image, size, &options, &progress)
                .with_context(|| format!("Failed to flash {}", self.path.display()))?;
            drop(bars);

            if !self.no_reset {
                session.reset_target().context("Failed to reset the target")?;
            }
            Ok(())
        })?;

        tracing::info!("Flashed {} bytes from {}", size, self.path.display());
        Ok(())
    }
}
