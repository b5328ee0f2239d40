use std::time::Duration;

/// Receives events while an image is written to flash.
///
/// # Example
///
/// ```
/// use pico_swd::flashing::FlashProgress;
///
/// let progress = FlashProgress::new(|event| println!("Event: {:?}", event));
/// ```
pub struct FlashProgress {
    handler: Box<dyn Fn(ProgressEvent)>,
}

impl FlashProgress {
    /// Create a new `FlashProgress` calling `handler` for every event.
    pub fn new(handler: impl Fn(ProgressEvent) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// A `FlashProgress` that ignores all events.
    pub fn empty() -> Self {
        Self::new(|_| {})
    }

    fn emit(&self, event: ProgressEvent) {
        (self.handler)(event);
    }

    pub(super) fn started_erasing(&self, size: u32) {
        self.emit(ProgressEvent::StartedErasing { size });
    }

    pub(super) fn finished_erasing(&self, time: Duration) {
        self.emit(ProgressEvent::FinishedErasing { time });
    }

    pub(super) fn failed_erasing(&self) {
        self.emit(ProgressEvent::FailedErasing);
    }

    pub(super) fn started_programming(&self, total: u32) {
        self.emit(ProgressEvent::StartedProgramming { total });
    }

    pub(super) fn chunk_programmed(&self, size: u32, time: Duration) {
        self.emit(ProgressEvent::ChunkProgrammed { size, time });
    }

    pub(super) fn failed_programming(&self) {
        self.emit(ProgressEvent::FailedProgramming);
    }

    pub(super) fn finished_programming(&self) {
        self.emit(ProgressEvent::FinishedProgramming);
    }
}

impl Default for FlashProgress {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for FlashProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashProgress").finish_non_exhaustive()
    }
}

/// Possible events during flashing.
///
/// Without errors the events arrive in this order:
///
/// * `StartedErasing`
/// * `FinishedErasing`
/// * `StartedProgramming`
/// * `ChunkProgrammed` for every chunk
/// * `FinishedProgramming`
///
/// After a `Failed*` event no further events are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Erasing of `size` bytes has started.
    StartedErasing { size: u32 },
    /// The erase routine returned.
    FinishedErasing { time: Duration },
    FailedErasing,
    /// Programming of `total` image bytes has started.
    StartedProgramming { total: u32 },
    /// A chunk of `size` image bytes has been programmed.
    ChunkProgrammed { size: u32, time: Duration },
    FailedProgramming,
    FinishedProgramming,
}
