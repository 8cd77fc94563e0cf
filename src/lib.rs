#![doc = include_str!("../readme.md")]

use std::str::FromStr;

use num_complex::Complex;

pub mod dsp;
pub mod error;
pub mod iqread;
#[cfg(feature = "rtlsdr")]
pub mod rtlsdr;

pub use error::{Error, Result};

/**
 * I/Q Data Format
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IqFormat {
    /// Complex unsigned 8-bit (Cu8), the native RTL-SDR format
    Cu8,
    /// Complex signed 8-bit (Cs8)
    Cs8,
    /// Complex signed 16-bit (Cs16)
    Cs16,
    /// Complex 32-bit float (Cf32)
    Cf32,
}

impl IqFormat {
    pub(crate) fn bytes_per_sample(self) -> usize {
        match self {
            IqFormat::Cu8 | IqFormat::Cs8 => 2,
            IqFormat::Cs16 => 4,
            IqFormat::Cf32 => 8,
        }
    }
}

impl FromStr for IqFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cu8" => Ok(IqFormat::Cu8),
            "cs8" => Ok(IqFormat::Cs8),
            "cs16" => Ok(IqFormat::Cs16),
            "cf32" => Ok(IqFormat::Cf32),
            other => Err(Error::format(format!("unknown I/Q format '{other}'"))),
        }
    }
}

/**
 * Tuner gain setting
 */
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Gain {
    /// Automatic gain control enabled on the device
    Auto,
    /// Manual gain in dB, automatic gain control disabled
    Manual(f32),
}

impl FromStr for Gain {
    type Err = Error;

    /// Parses `"auto"` (any case) or a finite number of dB.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Gain::Auto);
        }
        match s.parse::<f32>() {
            Ok(db) if db.is_finite() => Ok(Gain::Manual(db)),
            _ => Err(Error::format(format!(
                "expected either 'auto' or a number, got '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for Gain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gain::Auto => write!(f, "auto"),
            Gain::Manual(db) => write!(f, "{db} dB"),
        }
    }
}

/// A tunable source of complex baseband samples.
///
/// Control methods take `&self` so that a control thread can retune the
/// device while a pipeline worker is blocked in [`Tuner::read`].
/// Implementations synchronise internally.
pub trait Tuner: Send + Sync {
    /// Sample rate delivered by [`Tuner::read`], in Hz.
    fn sample_rate(&self) -> u32;

    /// Set the center frequency in Hz.
    fn set_center_freq(&self, freq_hz: u32) -> Result<()>;

    /// Switch between automatic and manual gain.
    fn set_gain(&self, gain: Gain) -> Result<()>;

    /// Read the next chunk of samples; `None` at end of stream.
    fn read(&self) -> Option<Result<Vec<Complex<f32>>>>;
}

pub(crate) fn convert_bytes_to_complex(format: IqFormat, buffer: &[u8]) -> Vec<Complex<f32>> {
    match format {
        IqFormat::Cu8 => buffer
            .chunks_exact(2)
            .map(|c| Complex::new((c[0] as f32 - 127.5) / 128.0, (c[1] as f32 - 127.5) / 128.0))
            .collect(),
        IqFormat::Cs8 => buffer
            .chunks_exact(2)
            .map(|c| Complex::new((c[0] as i8) as f32 / 128.0, (c[1] as i8) as f32 / 128.0))
            .collect(),
        IqFormat::Cs16 => buffer
            .chunks_exact(4)
            .map(|c| {
                Complex::new(
                    i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0,
                    i16::from_le_bytes([c[2], c[3]]) as f32 / 32768.0,
                )
            })
            .collect(),
        IqFormat::Cf32 => buffer
            .chunks_exact(8)
            .map(|c| {
                Complex::new(
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })
            .collect(),
    }
}
