/// Digital Signal Processing (DSP) module.
///
/// Streaming building blocks for FM broadcast reception. Every block keeps its
/// state across calls to `process`, so a stream may be fed in chunks of any
/// size and produces the same output as if it were fed at once.
///
/// # Modules
/// - `filters`: windowed-sinc and root-raised-cosine design, streaming FIR.
/// - `xlating`: frequency-translating FIR filter.
/// - `resampler`: rational resampling (sinc interpolation).
/// - `demod`: wideband FM demodulation and de-emphasis.
/// - `agc`: automatic gain control ahead of symbol recovery.
/// - `nco`: numerically controlled oscillator with a second-order loop.
/// - `psk`: M-PSK carrier and symbol timing recovery.
/// - `digital`: bit-level blocks (slicer, keep-one-in-N, differential decoder).
/// - `rotate`: complex rotation (frequency shift).
///
/// # Traits
/// - [`DspBlock`]: a processing block that operates on slices of complex samples.
use std::ops::{Add, Mul};

use num_complex::Complex;
use num_traits::Zero;

pub mod agc;
pub mod demod;
pub mod digital;
pub mod filters;
pub mod nco;
pub mod psk;
pub mod resampler;
pub mod rotate;
pub mod xlating;

pub use rotate::Rotate;

pub trait DspBlock {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>>;
}

/// A sample type a FIR filter with taps of type `K` can accumulate.
pub trait Sample<K = f32>: Copy + Zero + Add<Output = Self> + Mul<K, Output = Self> {}

impl<T, K> Sample<K> for T where T: Copy + Zero + Add<Output = T> + Mul<K, Output = T> {}
