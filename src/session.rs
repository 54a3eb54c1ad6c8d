//! Conversion phase: pull frames from a source, keep every `interval`-th
//! one, convert it and append it to the [`FrameBuffer`].

use crate::convert::{convert, TextFrame};
use crate::error::{PlayerError, Result};
use crate::source::{FrameSource, SourceInfo, FALLBACK_FRAME_RATE};
use crate::{PlaybackConfig, Progress};

/// Progress is reported each time this many frames have been appended.
pub const PROGRESS_EVERY: usize = 10;

/// Converted frames in playback order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    frames: Vec<TextFrame>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, frame: TextFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TextFrame> {
        self.frames.get(index)
    }

    pub fn frames(&self) -> &[TextFrame] {
        &self.frames
    }
}

impl From<Vec<TextFrame>> for FrameBuffer {
    fn from(frames: Vec<TextFrame>) -> Self {
        Self { frames }
    }
}

/// Number of source frames per kept frame.
///
/// A non-positive or non-finite source rate is treated as
/// [`FALLBACK_FRAME_RATE`].
pub fn sampling_interval(source_fps: f64, extraction_fps: u32) -> usize {
    let source_fps = if source_fps.is_finite() && source_fps > 0.0 {
        source_fps
    } else {
        FALLBACK_FRAME_RATE
    };
    if extraction_fps == 0 {
        return 1;
    }
    ((source_fps / extraction_fps as f64).floor() as usize).max(1)
}

/// Maximum number of frames to keep. `None` means "until the stream ends".
pub fn frame_budget(
    frame_count: Option<u64>,
    extraction_fps: u32,
    max_duration: Option<f64>,
) -> Option<usize> {
    let total = frame_count.map(|n| n as usize);
    let cap = max_duration.map(|secs| (extraction_fps as f64 * secs).floor().max(0.0) as usize);
    match (total, cap) {
        (Some(t), Some(c)) => Some(t.min(c)),
        (t, c) => t.or(c),
    }
}

/// Which source frames to keep and when to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    pub interval: usize,
    pub budget: Option<usize>,
}

impl SamplingPlan {
    pub fn new(info: &SourceInfo, config: &PlaybackConfig) -> Self {
        Self {
            interval: sampling_interval(info.frame_rate, config.extraction_fps),
            budget: frame_budget(info.frame_count, config.extraction_fps, config.max_duration),
        }
    }

    /// Whether the frame with this zero-based position in the stream is kept.
    pub fn selects(&self, position: u64) -> bool {
        position % self.interval as u64 == 0
    }

    pub fn is_full(&self, kept: usize) -> bool {
        self.budget.is_some_and(|b| kept >= b)
    }
}

/// Decode, sample and convert `source` into a [`FrameBuffer`].
///
/// `on_progress` receives a [`Progress`] every [`PROGRESS_EVERY`] frames and
/// once more when conversion finishes. Fails with
/// [`PlayerError::EmptyResult`] when no frame was kept.
pub fn build_buffer<S, F>(
    source: &mut S,
    config: &PlaybackConfig,
    mut on_progress: F,
) -> Result<FrameBuffer>
where
    S: FrameSource + ?Sized,
    F: FnMut(Progress),
{
    config.validate()?;

    let info = source.info();
    let plan = SamplingPlan::new(&info, config);
    let total = plan.budget.unwrap_or(0);
    log::info!(
        "sampling every {} frame(s) at {}x{}, budget {:?}",
        plan.interval,
        config.width,
        config.height,
        plan.budget
    );

    let mut buffer = FrameBuffer::new();
    let mut position: u64 = 0;

    while !plan.is_full(buffer.len()) {
        let raw = match source.next_frame() {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) if buffer.is_empty() => return Err(e),
            Err(e) => {
                log::warn!("stopping after {} frames: {}", buffer.len(), e);
                break;
            }
        };

        if plan.selects(position) {
            buffer.push(convert(&raw, config.width, config.height)?);
            if buffer.len() % PROGRESS_EVERY == 0 {
                on_progress(Progress::converting_frames(buffer.len(), total));
            }
        }
        position += 1;
    }

    log::info!("kept {} of {} decoded frames", buffer.len(), position);
    if buffer.is_empty() {
        return Err(PlayerError::EmptyResult);
    }
    on_progress(Progress::complete(buffer.len()));
    Ok(buffer)
}
