//! Error types.

use thiserror::Error;

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, TimingError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimingError {
    /// The document does not start with the `WEBVTT` signature.
    #[error("line 1: missing WEBVTT signature")]
    MissingSignature,

    #[error("line {line}: malformed timestamp {value:?}")]
    BadTimestamp { line: usize, value: String },

    #[error("line {line}: cue ends before it starts")]
    EndBeforeStart { line: usize },

    #[error("line {line}: cue block has no timing line")]
    MissingTiming { line: usize },

    /// Interpolation ranges are mismatched, too short or not increasing.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid easing: {0}")]
    InvalidEasing(String),

    #[error("invalid overlay config: {0}")]
    InvalidOverlay(String),
}

impl TimingError {
    pub fn bad_timestamp(line: usize, value: impl Into<String>) -> Self {
        Self::BadTimestamp {
            line,
            value: value.into(),
        }
    }

    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }
}
