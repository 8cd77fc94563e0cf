//! Error handling for the receiver
//!
//! Control-surface errors (`InvalidArgument`, `OutOfRange`) leave the
//! receiver unchanged. `Connect` only happens while a pipeline is assembled
//! and points at a configuration bug.

use thiserror::Error;

/// A specialized Result type for receiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for receiver operations
#[derive(Debug, Error)]
pub enum Error {
    /// No SDR device is attached, or none matches the requested index
    #[error("No SDR device found")]
    NoDeviceFound,

    /// A control value that is not usable at all (NaN gain, negative frequency)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A control value outside its allowed interval
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f32, min: f32, max: f32 },

    /// An RDS fragment carried a type code outside 0..=6
    #[error("Unknown RDS message type {0}")]
    UnknownMessageType(u8),

    /// Two stages were joined with different sample rates
    #[error("Rate mismatch at stage '{stage}': expected {expected} Hz, found {found} Hz")]
    Connect {
        stage: String,
        expected: f64,
        found: f64,
    },

    /// Pipeline lifecycle error (start after stop, panicked worker)
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Error raised by a sample source or DSP primitive
    #[error(transparent)]
    Source(#[from] fmtuner::Error),

    /// Audio output device error
    #[error("Audio error: {0}")]
    Audio(String),
}

impl Error {
    /// Create an invalid argument error with a custom message
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a pipeline error with a custom message
    pub fn pipeline<S: Into<String>>(msg: S) -> Self {
        Error::Pipeline(msg.into())
    }

    /// Create an audio error with a custom message
    pub fn audio<S: Into<String>>(msg: S) -> Self {
        Error::Audio(msg.into())
    }
}
