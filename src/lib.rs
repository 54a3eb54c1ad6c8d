//! # asciireel - terminal ASCII video player
//!
//! `asciireel` turns a video file into ASCII-art frames and loops them in the
//! terminal.
//!
//! ## Features
//!
//! - Area-averaged, contrast-stretched frame to ASCII conversion
//! - Frame sampling that normalizes the playback rate across source frame rates
//! - Terminal-aware output size
//! - Progress reporting while frames are converted
//! - Cancellable playback loop with a summary on exit
//!
//! ## Example
//!
//! ```no_run
//! use asciireel::replay::{replay, CancellationToken};
//! use asciireel::session::build_buffer;
//! use asciireel::source::FfmpegSource;
//! use asciireel::terminal::CrosstermDisplay;
//! use asciireel::PlaybackConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PlaybackConfig::default().with_max_duration(10.0);
//! let mut source = FfmpegSource::open(Path::new("video.mp4"))?;
//! let buffer = build_buffer(&mut source, &config, |progress| {
//!     println!("{}", progress.message);
//! })?;
//!
//! let cancel = CancellationToken::new();
//! asciireel::replay::install_interrupt_handler(&cancel)?;
//! let summary = replay(&buffer, config.replay_fps, &mut CrosstermDisplay::stdout(), &cancel)?;
//! println!("Played {} frames total.", summary.frames_displayed);
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod error;
pub mod replay;
pub mod session;
pub mod source;
pub mod terminal;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use convert::{convert, IntensityGrid, RawFrame, TextFrame, CHARACTER_RAMP};
pub use error::PlayerError;
pub use replay::{replay, CancellationToken, PlaybackSummary};
pub use session::{build_buffer, FrameBuffer};
pub use source::{FfmpegSource, FrameSource, SourceInfo};
pub use terminal::{CrosstermDisplay, Display, TerminalSize};

/// Represents the current phase of a conversion operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Converting decoded frames to ASCII art
    ConvertingFrames,
    /// Conversion completed successfully
    Complete,
}

/// Progress information for the conversion phase
#[derive(Debug, Clone)]
pub struct Progress {
    /// Current phase of the conversion
    pub phase: ProgressPhase,
    /// Number of frames converted so far
    pub completed: usize,
    /// Frame budget (0 if unknown)
    pub total: usize,
    /// Percentage complete (0.0 to 100.0, 0.0 when the total is unknown)
    pub percentage: f64,
    /// Human-readable message describing current status
    pub message: String,
}

impl Progress {
    /// Create a progress update for frame conversion
    pub fn converting_frames(completed: usize, total: usize) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let message = if total > 0 {
            format!("Progress: {:.1}% ({}/{} frames)", percentage, completed, total)
        } else {
            format!("Progress: {} frames", completed)
        };
        Self {
            phase: ProgressPhase::ConvertingFrames,
            completed,
            total,
            percentage,
            message,
        }
    }

    /// Create a completion progress update
    pub fn complete(total_frames: usize) -> Self {
        Self {
            phase: ProgressPhase::Complete,
            completed: total_frames,
            total: total_frames,
            percentage: 100.0,
            message: format!(
                "Conversion complete! Generated {} ASCII frames.",
                total_frames
            ),
        }
    }
}

/// Named playback settings
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Preset {
    /// Frames sampled per second of source video
    pub fps: u32,
    /// Frames shown per second during playback (defaults to `fps`)
    #[serde(default)]
    pub replay_fps: Option<u32>,
    #[serde(default = "default_max_width")]
    pub max_width: u16,
    #[serde(default = "default_max_height")]
    pub max_height: u16,
}

fn default_max_width() -> u16 {
    terminal::MAX_WIDTH
}

fn default_max_height() -> u16 {
    terminal::MAX_HEIGHT
}

fn default_countdown() -> f64 {
    3.0
}

/// Application configuration with playback presets
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub presets: HashMap<String, Preset>,
    pub default_preset: String,
    /// Seconds to wait between conversion and playback
    #[serde(default = "default_countdown")]
    pub countdown_secs: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let presets = [
            ("default", 25, 120, 40),
            ("small", 15, 80, 24),
            ("smooth", 30, 120, 40),
        ]
        .into_iter()
        .map(|(name, fps, max_width, max_height)| {
            (
                name.to_string(),
                Preset {
                    fps,
                    replay_fps: None,
                    max_width,
                    max_height,
                },
            )
        })
        .collect();

        Self {
            presets,
            default_preset: "default".to_string(),
            countdown_secs: default_countdown(),
        }
    }
}

impl AppConfig {
    /// Parse and validate configuration JSON
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_json::from_str(text).context("parsing config json")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("loading config {}", path.display()))
    }

    /// Check that every preset describes a playable configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.presets.contains_key(&self.default_preset) {
            return Err(anyhow!(
                "default_preset '{}' is not defined",
                self.default_preset
            ));
        }
        if self.countdown_secs < 0.0 || Duration::try_from_secs_f64(self.countdown_secs).is_err() {
            return Err(anyhow!(
                "countdown_secs must be a finite number of seconds, got {}",
                self.countdown_secs
            ));
        }
        for (name, preset) in &self.presets {
            if preset.fps == 0 || preset.replay_fps == Some(0) {
                return Err(anyhow!("Preset '{}' must use a positive frame rate", name));
            }
            if preset.max_width == 0
                || preset.max_height == 0
                || preset.max_width > terminal::MAX_WIDTH
                || preset.max_height > terminal::MAX_HEIGHT
            {
                return Err(anyhow!(
                    "Preset '{}' size must be between 1x1 and {}x{}",
                    name,
                    terminal::MAX_WIDTH,
                    terminal::MAX_HEIGHT
                ));
            }
        }
        Ok(())
    }

    /// Get a preset by name
    pub fn preset(&self, name: &str) -> anyhow::Result<&Preset> {
        self.presets
            .get(name)
            .ok_or_else(|| anyhow!("Preset '{}' not found", name))
    }
}

/// Settings for one conversion and playback run
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Output width in characters
    pub width: u32,
    /// Output height in rows, excluding the status header
    pub height: u32,
    /// Frames sampled per second of source video
    pub extraction_fps: u32,
    /// Frames shown per second during playback
    pub replay_fps: u32,
    /// Only convert this many seconds of video
    pub max_duration: Option<f64>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            width: terminal::MAX_WIDTH as u32,
            height: terminal::MAX_HEIGHT as u32,
            extraction_fps: 25,
            replay_fps: 25,
            max_duration: None,
        }
    }
}

impl PlaybackConfig {
    /// Settings for `preset`, shrunk to fit a terminal of `size`
    pub fn from_preset(preset: &Preset, size: Option<TerminalSize>) -> Self {
        let (cols, rows) = terminal::resolve_dimensions(size);
        Self {
            width: cols.min(preset.max_width).max(1) as u32,
            height: rows.min(preset.max_height).max(1) as u32,
            extraction_fps: preset.fps,
            replay_fps: preset.replay_fps.unwrap_or(preset.fps),
            max_duration: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the extraction rate
    pub fn with_extraction_fps(mut self, fps: u32) -> Self {
        self.extraction_fps = fps;
        self
    }

    pub fn with_replay_fps(mut self, fps: u32) -> Self {
        self.replay_fps = fps;
        self
    }

    pub fn with_max_duration(mut self, secs: f64) -> Self {
        self.max_duration = Some(secs);
        self
    }

    /// Reject settings that cannot produce playable output
    pub fn validate(&self) -> Result<(), PlayerError> {
        if self.width == 0 || self.height == 0 {
            return Err(PlayerError::InvalidArgument(format!(
                "output dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.extraction_fps == 0 || self.replay_fps == 0 {
            return Err(PlayerError::InvalidArgument(
                "frame rates must be positive".to_string(),
            ));
        }
        if let Some(secs) = self.max_duration {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(PlayerError::InvalidArgument(format!(
                    "max duration must be positive, got {}",
                    secs
                )));
            }
        }
        Ok(())
    }
}
