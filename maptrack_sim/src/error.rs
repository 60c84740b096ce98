//! Error types for the replay harness.

use maptrack_core::TrackError;
use thiserror::Error;

/// Errors that can occur while setting up or running a replay.
#[derive(Debug, Error)]
pub enum SimError {
    /// The session rejected a sample, a window or a file
    #[error("Track error: {0}")]
    Track(#[from] TrackError),

    /// Replay parameters out of range
    #[error("Invalid replay parameter: {0}")]
    InvalidParameter(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SimError {
    /// Creates an invalid parameter error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
