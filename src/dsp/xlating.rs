//! Frequency-translating FIR filter.
//!
//! Selects a band centered on `center_freq`, decimates it and brings it down
//! to baseband in one pass. The real low-pass prototype is turned into a
//! complex band-pass filter by mixing its taps up to `center_freq`; the
//! decimated output is then rotated down by the same frequency.
//!
//! ```
//! use fmtuner::dsp::filters::{Window, low_pass};
//! use fmtuner::dsp::xlating::FreqXlatingFir;
//!
//! // Extract the 57 kHz RDS subcarrier from a 600 kHz FM baseband
//! let proto = low_pass(1.0, 600_000.0, 2_400.0, 2_000.0, Window::Hamming).unwrap();
//! let mut xlate = FreqXlatingFir::<f32>::new(&proto, 5, 57_000.0, 600_000.0).unwrap();
//! let baseband = xlate.process(&vec![0.0f32; 1000]);
//! assert_eq!(baseband.len(), 200);
//! ```
use std::marker::PhantomData;

use num_complex::Complex;

use super::filters::FirFilter;
use super::{DspBlock, Rotate};
use crate::Result;

pub struct FreqXlatingFir<T> {
    fir: FirFilter<Complex<f32>, Complex<f32>>,
    rotator: Rotate,
    _input: PhantomData<T>,
}

impl<T: Copy + Into<Complex<f32>>> FreqXlatingFir<T> {
    pub fn new(
        prototype: &[f32],
        decimation: usize,
        center_freq: f64,
        sample_rate: f64,
    ) -> Result<Self> {
        let fw_t0 = 2.0 * std::f64::consts::PI * center_freq / sample_rate;
        let taps: Vec<Complex<f32>> = prototype
            .iter()
            .enumerate()
            .map(|(n, &h)| Complex::from_polar(h, (n as f64 * fw_t0) as f32))
            .collect();
        Ok(Self {
            fir: FirFilter::new(taps, decimation)?,
            rotator: Rotate::new((-fw_t0 * decimation as f64) as f32),
            _input: PhantomData,
        })
    }

    pub fn decimation(&self) -> usize {
        self.fir.decimation()
    }

    pub fn process(&mut self, samples: &[T]) -> Vec<Complex<f32>> {
        let input: Vec<Complex<f32>> = samples.iter().map(|&s| s.into()).collect();
        let filtered = self.fir.process(&input);
        self.rotator.process(&filtered)
    }
}

impl DspBlock for FreqXlatingFir<Complex<f32>> {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        FreqXlatingFir::process(self, data)
    }
}
