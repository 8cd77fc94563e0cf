//! Error handling for the fmtuner library
//!
//! A single error type covers sample sources (files, RTL-SDR devices) and the
//! construction of DSP primitives.

use thiserror::Error;

/// A specialized Result type for fmtuner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fmtuner operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations, device transfers)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No SDR device is attached, or none matches the requested index
    #[error("No SDR device found")]
    NoDeviceFound,

    /// Device configuration or runtime error
    #[error("Device error: {0}")]
    Device(String),

    /// Invalid I/Q format or value conversion
    #[error("Format error: {0}")]
    Format(String),

    /// A DSP primitive could not be constructed with the given parameters
    #[error("DSP error: {0}")]
    Dsp(String),

    /// RTL-SDR specific error (requires "rtlsdr" feature)
    #[cfg(feature = "rtlsdr")]
    #[error("RTL-SDR error: {0}")]
    RtlSdr(#[from] rtl_sdr_rs::error::RtlsdrError),
}

impl Error {
    /// Create a device error with a custom message
    pub fn device<S: Into<String>>(msg: S) -> Self {
        Error::Device(msg.into())
    }

    /// Create a format error with a custom message
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create a DSP construction error with a custom message
    pub fn dsp<S: Into<String>>(msg: S) -> Self {
        Error::Dsp(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("I/O error"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_device_error_constructor() {
        let err = Error::device("initialization failed");
        assert!(matches!(err, Error::Device(_)));
        assert_eq!(err.to_string(), "Device error: initialization failed");
    }

    #[test]
    fn test_no_device_display() {
        assert_eq!(Error::NoDeviceFound.to_string(), "No SDR device found");
    }

    #[test]
    fn test_dsp_error_constructor() {
        let err = Error::dsp("zero taps");
        assert!(matches!(err, Error::Dsp(_)));
        assert!(err.to_string().starts_with("DSP error"));
    }
}
