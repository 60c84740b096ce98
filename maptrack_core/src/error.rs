//! Error types for the MapTrack core.

use thiserror::Error;

/// Errors that can occur while recording, querying or persisting a track.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Caller broke an operation's contract (non-finite input, bad range, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File open/read/write failure, including reads past end of stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte count implied by the header disagrees with the stream
    #[error("Format mismatch: expected {expected} bytes, found {actual}")]
    FormatMismatch { expected: u64, actual: u64 },

    /// A decoded record cannot be part of a valid track
    #[error("Corrupt record #{index}: {reason}")]
    CorruptRecord { index: usize, reason: String },

    /// Settings file could not be parsed or written
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl TrackError {
    /// Creates an invalid argument error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a corrupt record error.
    pub fn corrupt(index: usize, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            index,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type TrackResult<T> = Result<T, TrackError>;
