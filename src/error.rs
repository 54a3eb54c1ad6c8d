use std::path::PathBuf;

/// Errors produced while converting or playing a video.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// A caller passed an argument outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The video could not be opened or probed.
    #[error("could not open video {}: {reason}", path.display())]
    SourceUnavailable { path: PathBuf, reason: String },

    /// The source opened but no frame was selected for playback.
    #[error("no frames were produced from the video")]
    EmptyResult,

    /// Reading decoded frames failed after the source was opened.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlayerError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PlayerError::SourceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
