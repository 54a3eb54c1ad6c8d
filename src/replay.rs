//! Replay phase: loop over a [`FrameBuffer`] at a fixed cadence until
//! cancelled.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::error::{PlayerError, Result};
use crate::session::FrameBuffer;
use crate::terminal::Display;

/// Shared stop flag. Cloning yields another handle to the same flag.
///
/// Waiting on the token wakes up as soon as it is cancelled, so a pause
/// between frames never delays shutdown.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `timeout`. Returns `true` if the token is cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Cancel `token` when the user presses Ctrl+C.
///
/// Can only be installed once per process.
pub fn install_interrupt_handler(token: &CancellationToken) -> std::result::Result<(), ctrlc::Error> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        log::debug!("interrupt received");
        token.cancel();
    })
}

/// Outcome of a playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub frames_displayed: u64,
}

/// Time each frame stays on screen.
pub fn frame_delay(replay_fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / replay_fps as f64)
}

/// Header line shown above each frame. `index` is zero-based.
pub fn status_header(index: usize, len: usize, replay_fps: u32) -> String {
    format!(
        "Frame: {}/{} | FPS: {} | Press Ctrl+C to exit",
        index + 1,
        len,
        replay_fps
    )
}

/// Show `buffer` on `display` in a loop until `cancel` fires.
///
/// The token is checked only between frames; a frame that has started
/// drawing is always drawn completely.
pub fn replay<D>(
    buffer: &FrameBuffer,
    replay_fps: u32,
    display: &mut D,
    cancel: &CancellationToken,
) -> Result<PlaybackSummary>
where
    D: Display + ?Sized,
{
    if buffer.is_empty() {
        return Err(PlayerError::EmptyResult);
    }
    if replay_fps == 0 {
        return Err(PlayerError::InvalidArgument(
            "replay rate must be positive".to_string(),
        ));
    }

    display.begin()?;
    let result = run(buffer, replay_fps, display, cancel);
    let restored = display.end();
    let summary = result?;
    restored?;

    log::info!("displayed {} frames", summary.frames_displayed);
    Ok(summary)
}

fn run<D>(
    buffer: &FrameBuffer,
    replay_fps: u32,
    display: &mut D,
    cancel: &CancellationToken,
) -> Result<PlaybackSummary>
where
    D: Display + ?Sized,
{
    let delay = frame_delay(replay_fps);
    let frames = buffer.frames();
    let mut displayed: u64 = 0;

    while !cancel.is_cancelled() {
        let index = (displayed % frames.len() as u64) as usize;
        let header = status_header(index, frames.len(), replay_fps);
        display.present(&header, &frames[index])?;
        displayed += 1;

        if cancel.wait_timeout(delay) {
            break;
        }
    }

    Ok(PlaybackSummary {
        frames_displayed: displayed,
    })
}
