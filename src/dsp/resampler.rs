//! Rational resampling with sinc interpolation.
//!
//! Converts a stream by `interpolation / decimation` using `rubato`.
//! Real streams are resampled as one channel, complex streams as two (I/Q).
//! Input that does not fill a whole `rubato` chunk is kept for the next call.
//!
//! # Example
//!
//! ```
//! use fmtuner::dsp::resampler::RationalResampler;
//!
//! // 2.4 MHz down by 10/49
//! let mut resampler = RationalResampler::<f32>::new(10, 49).unwrap();
//! let out = resampler.process(&vec![0.0; 49 * 1024]);
//! assert!(out.len() <= 10 * 1024);
//! ```
use num_complex::Complex;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::warn;

use crate::{Error, Result};

/// A sample made of one or more `f32` channels.
pub trait Frame: Copy + Send + 'static {
    const CHANNELS: usize;
    fn split(self, channels: &mut [Vec<f32>]);
    fn join(channels: &[Vec<f32>], index: usize) -> Self;
}

impl Frame for f32 {
    const CHANNELS: usize = 1;

    fn split(self, channels: &mut [Vec<f32>]) {
        channels[0].push(self);
    }

    fn join(channels: &[Vec<f32>], index: usize) -> Self {
        channels[0][index]
    }
}

impl Frame for Complex<f32> {
    const CHANNELS: usize = 2;

    fn split(self, channels: &mut [Vec<f32>]) {
        channels[0].push(self.re);
        channels[1].push(self.im);
    }

    fn join(channels: &[Vec<f32>], index: usize) -> Self {
        Complex::new(channels[0][index], channels[1][index])
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

pub struct RationalResampler<T: Frame> {
    resampler: SincFixedIn<f32>,
    interpolation: usize,
    decimation: usize,
    leftover: Vec<T>,
}

impl<T: Frame> RationalResampler<T> {
    /// Number of input frames handed to `rubato` per call
    const CHUNK: usize = 4096;

    /// Build a resampler producing `interpolation` output samples for every
    /// `decimation` input samples. The ratio is reduced to lowest terms.
    pub fn new(interpolation: usize, decimation: usize) -> Result<Self> {
        if interpolation == 0 || decimation == 0 {
            return Err(Error::dsp(format!(
                "invalid resampling ratio {interpolation}/{decimation}"
            )));
        }
        let g = gcd(interpolation, decimation);
        let (interpolation, decimation) = (interpolation / g, decimation / g);

        let params = SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 128,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::<f32>::new(
            interpolation as f64 / decimation as f64,
            1.0,
            params,
            Self::CHUNK,
            T::CHANNELS,
        )
        .map_err(|e| Error::dsp(format!("Failed to create resampler: {e:?}")))?;

        Ok(Self {
            resampler,
            interpolation,
            decimation,
            leftover: Vec::new(),
        })
    }

    pub fn interpolation(&self) -> usize {
        self.interpolation
    }

    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Output rate for a given input rate
    pub fn output_rate(&self, input_rate: f64) -> f64 {
        input_rate * self.interpolation as f64 / self.decimation as f64
    }

    pub fn process(&mut self, input: &[T]) -> Vec<T> {
        self.leftover.extend_from_slice(input);
        let mut output = Vec::new();

        loop {
            let frames = self.resampler.input_frames_next();
            if self.leftover.len() < frames {
                break;
            }
            let mut channels = vec![Vec::with_capacity(frames); T::CHANNELS];
            for frame in self.leftover.drain(..frames) {
                frame.split(&mut channels);
            }

            match self.resampler.process(&channels, None) {
                Ok(blocks) => {
                    output.extend((0..blocks[0].len()).map(|i| T::join(&blocks, i)));
                }
                Err(e) => {
                    warn!("Resampler error: {:?}", e);
                    break;
                }
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ratio_reduced() {
        let r = RationalResampler::<f32>::new(490, 500).unwrap();
        assert_eq!((r.interpolation(), r.decimation()), (49, 50));
        assert_relative_eq!(r.output_rate(500_000.0), 490_000.0);
    }

    #[test]
    fn test_zero_ratio_rejected() {
        assert!(RationalResampler::<f32>::new(0, 5).is_err());
        assert!(RationalResampler::<Complex<f32>>::new(5, 0).is_err());
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let mut r = RationalResampler::<f32>::new(49, 50).unwrap();
        let input = vec![0.5f32; 50 * 4096];
        let out = r.process(&input);
        let expected = 49 * 4096;
        assert!((out.len() as i64 - expected as i64).abs() < 4096 / 50 * 49 + 1);
    }

    #[test]
    fn test_dc_preserved() {
        let mut r = RationalResampler::<Complex<f32>>::new(10, 49).unwrap();
        let out = r.process(&vec![Complex::new(0.5, -0.25); 49 * 4096]);
        assert!(out.len() > 1000);
        let s = out[out.len() - 10];
        assert_relative_eq!(s.re, 0.5, epsilon = 0.01);
        assert_relative_eq!(s.im, -0.25, epsilon = 0.01);
    }
}
