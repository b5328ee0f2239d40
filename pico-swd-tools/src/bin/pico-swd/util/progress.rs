use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pico_swd::flashing::{FlashProgress, ProgressEvent};

use super::logging;

/// Erase spinner and program bar for one flash operation.
pub struct FlashBars {
    erase: ProgressBar,
    program: ProgressBar,
}

impl FlashBars {
    pub fn show() -> Self {
        let multi = MultiProgress::new();
        let erase = multi.add(ProgressBar::new_spinner().with_message("Erasing"));
        let program = multi.add(ProgressBar::new(0).with_message("Programming"));
        program.set_style(Self::waiting());
        logging::show_bars(multi);

        Self { erase, program }
    }

    fn waiting() -> ProgressStyle {
        ProgressStyle::with_template("{msg:.green.bold} {spinner}")
            .expect("Error in progress bar creation. This is a bug, please report it.")
    }

    fn active() -> ProgressStyle {
        ProgressStyle::with_template(concat!(
            "{msg:.green.bold} {percent:>3}% [{bar:20}] ",
            "{bytes:>10} @ {bytes_per_sec:>12} (ETA {eta})",
        ))
        .expect("Error in progress bar creation. This is a bug, please report it.")
        .progress_chars("##-")
    }

    /// A handler updating the bars, to be passed to the flash operation.
    pub fn progress(&self) -> FlashProgress {
        let erase = self.erase.clone();
        let program = self.program.clone();

        FlashProgress::new(move |event| match event {
            ProgressEvent::StartedErasing { size } => {
                erase.set_message(format!("Erasing {size} bytes"));
                erase.enable_steady_tick(std::time::Duration::from_millis(100));
            }
            ProgressEvent::FinishedErasing { time } => {
                erase.finish_with_message(format!("Erased in {:.2?}", time));
            }
            ProgressEvent::FailedErasing => erase.abandon_with_message("Erasing failed"),
            ProgressEvent::StartedProgramming { total } => {
                program.set_length(total.into());
                program.set_style(Self::active());
                program.reset_elapsed();
            }
            ProgressEvent::ChunkProgrammed { size, .. } => program.inc(size.into()),
            ProgressEvent::FailedProgramming => program.abandon_with_message("Programming failed"),
            ProgressEvent::FinishedProgramming => program.finish_with_message("Programmed"),
        })
    }
}

impl Drop for FlashBars {
    fn drop(&mut self) {
        logging::hide_bars();
    }
}
