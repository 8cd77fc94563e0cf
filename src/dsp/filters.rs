//! Digital filter design and streaming FIR filtering.
//!
//! - [`low_pass`]: windowed-sinc low-pass design, tap count derived from the
//!   transition width and the window's stopband attenuation
//! - [`root_raised_cosine`]: matched filter for pulse-shaped symbol streams
//! - [`FirFilter`]: streaming FIR with integer decimation
//!
//! # Example
//!
//! ```
//! use fmtuner::dsp::filters::{FirFilter, Window, low_pass};
//!
//! // 15 kHz low-pass at 240 kHz, 5 kHz transition, unity gain
//! let taps = low_pass(1.0, 240_000.0, 15_000.0, 5_000.0, Window::Hamming).unwrap();
//! let mut filter = FirFilter::<f32>::new(taps, 1).unwrap();
//!
//! let output = filter.process(&vec![0.5; 100]);
//! assert_eq!(output.len(), 100);
//! ```

use std::f64::consts::PI;

use super::Sample;
use crate::{Error, Result};

/// Window applied to the ideal sinc response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hamming,
    Blackman,
}

impl Window {
    /// Stopband attenuation in dB, used to size the filter.
    pub fn max_attenuation(self) -> f64 {
        match self {
            Window::Hamming => 53.0,
            Window::Blackman => 74.0,
        }
    }

    fn coefficients(self, ntaps: usize) -> Vec<f64> {
        let m = (ntaps - 1).max(1) as f64;
        (0..ntaps)
            .map(|n| {
                let x = 2.0 * PI * n as f64 / m;
                match self {
                    Window::Hamming => 0.54 - 0.46 * x.cos(),
                    Window::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
                }
            })
            .collect()
    }
}

/// Number of taps needed for a given transition width: `⌈A·fs/(22·tw)⌉`, odd.
pub fn compute_ntaps(sample_rate: f64, transition_width: f64, window: Window) -> usize {
    let ntaps = window.max_attenuation() * sample_rate / (22.0 * transition_width);
    ntaps.ceil() as usize | 1
}

/// Design a windowed-sinc low-pass filter with DC gain `gain`.
///
/// # Errors
///
/// [`Error::Dsp`] when the sample rate or transition width is not positive,
/// or the cutoff is not within `(0, fs/2]`.
pub fn low_pass(
    gain: f64,
    sample_rate: f64,
    cutoff: f64,
    transition_width: f64,
    window: Window,
) -> Result<Vec<f32>> {
    if !(sample_rate > 0.0) {
        return Err(Error::dsp(format!("sample rate must be positive, got {sample_rate}")));
    }
    if !(cutoff > 0.0 && cutoff <= sample_rate / 2.0) {
        return Err(Error::dsp(format!(
            "cutoff {cutoff} Hz outside (0, {}] Hz",
            sample_rate / 2.0
        )));
    }
    if !(transition_width > 0.0) {
        return Err(Error::dsp(format!(
            "transition width must be positive, got {transition_width}"
        )));
    }

    let ntaps = compute_ntaps(sample_rate, transition_width, window);
    let w = window.coefficients(ntaps);
    let mid = (ntaps / 2) as isize;
    let fw_t0 = 2.0 * PI * cutoff / sample_rate;

    let mut taps: Vec<f64> = (0..ntaps)
        .map(|i| {
            let n = i as isize - mid;
            let sinc = if n == 0 {
                fw_t0 / PI
            } else {
                (n as f64 * fw_t0).sin() / (n as f64 * PI)
            };
            sinc * w[i]
        })
        .collect();

    let dc: f64 = taps.iter().sum();
    for t in taps.iter_mut() {
        *t *= gain / dc;
    }
    Ok(taps.into_iter().map(|t| t as f32).collect())
}

/// Design a root-raised-cosine filter with roll-off `alpha`, normalised to
/// `gain` at DC. An even `ntaps` is rounded up to the next odd count.
pub fn root_raised_cosine(
    gain: f64,
    sample_rate: f64,
    symbol_rate: f64,
    alpha: f64,
    ntaps: usize,
) -> Result<Vec<f32>> {
    if !(sample_rate > 0.0 && symbol_rate > 0.0 && symbol_rate <= sample_rate) {
        return Err(Error::dsp(format!(
            "invalid rates: {symbol_rate} symbols/s at {sample_rate} samples/s"
        )));
    }
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(Error::dsp(format!("roll-off must be in (0, 1], got {alpha}")));
    }
    let ntaps = ntaps | 1;
    let spb = sample_rate / symbol_rate;
    let mid = ntaps / 2;

    let mut taps = Vec::with_capacity(ntaps);
    for i in 0..ntaps {
        let xindx = i as f64 - mid as f64;
        let x1 = PI * xindx / spb;
        let x2 = 4.0 * alpha * xindx / spb;
        let x3 = x2 * x2 - 1.0;

        let tap = if x3.abs() >= 1e-6 {
            let num = if i != mid {
                ((1.0 + alpha) * x1).cos()
                    + ((1.0 - alpha) * x1).sin() / (4.0 * alpha * xindx / spb)
            } else {
                ((1.0 + alpha) * x1).cos() + (1.0 - alpha) * PI / (4.0 * alpha)
            };
            4.0 * alpha * num / (x3 * PI)
        } else if alpha == 1.0 {
            // Removable singularity at t = ±T/4α
            -1.0
        } else {
            let s3 = (1.0 - alpha) * x1;
            let s2 = (1.0 + alpha) * x1;
            let num = s2.sin() * (1.0 + alpha) * PI
                - s3.cos() * ((1.0 - alpha) * PI * spb) / (4.0 * alpha * xindx)
                + s3.sin() * spb * spb / (4.0 * alpha * xindx * xindx);
            let den = -32.0 * PI * alpha * alpha * xindx / spb;
            4.0 * alpha * num / den
        };
        taps.push(tap);
    }

    let scale: f64 = taps.iter().sum();
    Ok(taps.into_iter().map(|t| (t * gain / scale) as f32).collect())
}

/**
 * Streaming FIR filter with integer decimation.
 *
 * The filter keeps the last `ntaps - 1` input samples between calls, so
 * chunk boundaries are invisible in the output. With decimation `D` only
 * every `D`-th output is computed.
 */
pub struct FirFilter<T, K = f32> {
    /// Taps stored in reverse order for a forward dot product
    reversed: Vec<K>,
    decimation: usize,
    history: Vec<T>,
    /// Start of the next window in `history`
    next: usize,
}

impl<T: Sample<K>, K: Copy> FirFilter<T, K> {
    pub fn new(taps: Vec<K>, decimation: usize) -> Result<Self> {
        if taps.is_empty() {
            return Err(Error::dsp("FIR filter needs at least one tap"));
        }
        if decimation == 0 {
            return Err(Error::dsp("decimation must be at least 1"));
        }
        let ntaps = taps.len();
        let mut reversed = taps;
        reversed.reverse();
        Ok(Self {
            reversed,
            decimation,
            history: vec![T::zero(); ntaps - 1],
            next: 0,
        })
    }

    pub fn ntaps(&self) -> usize {
        self.reversed.len()
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    pub fn process(&mut self, samples: &[T]) -> Vec<T> {
        let ntaps = self.reversed.len();
        self.history.extend_from_slice(samples);

        let mut out = Vec::with_capacity(samples.len() / self.decimation + 1);
        while self.next + ntaps <= self.history.len() {
            let window = &self.history[self.next..self.next + ntaps];
            let acc = window
                .iter()
                .zip(&self.reversed)
                .fold(T::zero(), |acc, (&x, &h)| acc + x * h);
            out.push(acc);
            self.next += self.decimation;
        }

        let consumed = self.next.min(self.history.len());
        self.history.drain(..consumed);
        self.next -= consumed;
        out
    }
}
