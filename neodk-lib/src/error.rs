use std::array::TryFromSliceError;
use std::io;
use thiserror::Error;

/// The primary error type for the `neodk-lib` library.
#[derive(Error, Debug)]
pub enum NeoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame payload too big: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("String of {0} bytes does not fit a 1-byte length field")]
    StringTooLong(usize),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Outbound queue full")]
    QueueFull,

    #[error("Session task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<TryFromSliceError> for NeoError {
    fn from(_: TryFromSliceError) -> Self {
        NeoError::InvalidFrame("Failed to convert slice to array".to_string())
    }
}
