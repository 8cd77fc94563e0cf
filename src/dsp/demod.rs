//! Wideband FM demodulation.
//!
//! - [`QuadratureDemod`]: phase difference between consecutive samples
//! - [`DeemphasisFilter`]: first-order IIR restoring the broadcast audio balance
//! - [`WbfmDemod`]: both of the above with a decimating low-pass in between
//!
//! # Example
//!
//! ```
//! use fmtuner::dsp::demod::WbfmDemod;
//! use num_complex::Complex;
//!
//! // 480 kHz quadrature rate, 48 kHz audio
//! let mut demod = WbfmDemod::new(480_000.0, 10).unwrap();
//! let audio = demod.process(&vec![Complex::new(1.0, 0.0); 4800]);
//! assert_eq!(audio.len(), 480);
//! ```

use num_complex::Complex;

use super::filters::{FirFilter, Window, low_pass};
use crate::{Error, Result};

/// Maximum frequency deviation of broadcast FM, in Hz
pub const MAX_DEVIATION: f64 = 75e3;

/// De-emphasis time constant, in seconds
pub const DEEMPHASIS_TAU: f64 = 75e-6;

/// Quadrature demodulator.
///
/// Computes `gain * arg(x[n] * conj(x[n-1]))` for each sample.
pub struct QuadratureDemod {
    gain: f32,
    /// Last complex sample for phase difference calculation
    last: Complex<f32>,
}

impl QuadratureDemod {
    pub fn new(gain: f32) -> Self {
        Self {
            gain,
            last: Complex::new(1.0, 0.0),
        }
    }

    /// Demodulator scaled so that the maximum deviation maps to ±1.
    pub fn for_deviation(quad_rate: f64, max_deviation: f64) -> Self {
        Self::new((quad_rate / (2.0 * std::f64::consts::PI * max_deviation)) as f32)
    }

    pub fn process(&mut self, samples: &[Complex<f32>]) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples.len());
        for &sample in samples {
            out.push(self.gain * (sample * self.last.conj()).arg());
            self.last = sample;
        }
        out
    }
}

/// De-emphasis filter for FM broadcast audio.
///
/// Implements `y[n] = b*x[n] + a*y[n-1]` with `a = exp(-1/(fs*tau))`.
pub struct DeemphasisFilter {
    /// Coefficient for previous output (feedback)
    a: f32,
    /// Coefficient for current input (feedforward)
    b: f32,
    /// Previous output sample
    prev_y: f32,
}

impl DeemphasisFilter {
    pub fn new(sample_rate: f64, tau: f64) -> Self {
        let decay = (-1.0 / (sample_rate * tau)).exp();
        Self {
            a: decay as f32,
            b: (1.0 - decay) as f32,
            prev_y: 0.0,
        }
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let mut y = Vec::with_capacity(samples.len());
        for &x in samples {
            let out = self.b * x + self.a * self.prev_y;
            y.push(out);
            self.prev_y = out;
        }
        y
    }
}

/**
 * Wideband FM receiver
 *
 * Quadrature demodulation at `quad_rate`, then a Hamming low-pass decimating
 * by `audio_decimation`, then 75 µs de-emphasis at the output rate. The
 * low-pass cuts at `audio_rate/2 - audio_rate/32` with an `audio_rate/32`
 * transition band.
 */
pub struct WbfmDemod {
    demod: QuadratureDemod,
    filter: FirFilter<f32>,
    deemph: DeemphasisFilter,
    quad_rate: f64,
    audio_decimation: usize,
}

impl WbfmDemod {
    pub fn new(quad_rate: f64, audio_decimation: usize) -> Result<Self> {
        if audio_decimation == 0 {
            return Err(Error::dsp("audio decimation must be at least 1"));
        }
        let audio_rate = quad_rate / audio_decimation as f64;
        let transition = audio_rate / 32.0;
        let taps = low_pass(
            1.0,
            quad_rate,
            audio_rate / 2.0 - transition,
            transition,
            Window::Hamming,
        )?;
        Ok(Self {
            demod: QuadratureDemod::for_deviation(quad_rate, MAX_DEVIATION),
            filter: FirFilter::new(taps, audio_decimation)?,
            deemph: DeemphasisFilter::new(audio_rate, DEEMPHASIS_TAU),
            quad_rate,
            audio_decimation,
        })
    }

    pub fn quad_rate(&self) -> f64 {
        self.quad_rate
    }

    pub fn audio_rate(&self) -> f64 {
        self.quad_rate / self.audio_decimation as f64
    }

    pub fn process(&mut self, samples: &[Complex<f32>]) -> Vec<f32> {
        let baseband = self.demod.process(samples);
        let decimated = self.filter.process(&baseband);
        self.deemph.process(&decimated)
    }
}
