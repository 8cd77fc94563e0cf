/// A DSP block that applies a complex rotation to a sequence of samples.
///
/// `Rotate` keeps a running phasor (`rot`) and a per-sample multiplier
/// (`mult`) derived from the rotation angle in radians. A positive angle
/// shifts the spectrum up, a negative one shifts it down.
///
/// # Example
/// ```
/// use num_complex::Complex;
/// use fmtuner::dsp::{DspBlock, Rotate};
///
/// let mut rotator = Rotate::new(std::f32::consts::FRAC_PI_2); // 90 degrees per sample
/// let input = vec![Complex::new(1.0, 0.0); 4];
/// let output = rotator.process(&input);
/// assert!((output[1].im - 1.0).abs() < 1e-6);
/// ```
use num_complex::Complex;

use crate::dsp::DspBlock;

pub struct Rotate {
    /// Current complex rotation factor
    rot: Complex<f32>,
    /// Per-sample rotation multiplier
    mult: Complex<f32>,
}

impl Rotate {
    /// Create a new Rotate DSP block with the specified rotation angle in radians
    pub fn new(angle: f32) -> Self {
        Self {
            rot: Complex::new(1.0, 0.0),
            mult: Complex::from_polar(1.0, angle),
        }
    }

    /// Rotator shifting a signal sampled at `sample_rate` by `freq` Hz
    pub fn with_frequency(freq: f64, sample_rate: f64) -> Self {
        Self::new((2.0 * std::f64::consts::PI * freq / sample_rate) as f32)
    }
}

impl DspBlock for Rotate {
    /// Process a slice of complex samples, applying the rotation
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut out = Vec::with_capacity(data.len());
        for &s in data {
            out.push(s * self.rot);
            self.rot *= self.mult;
        }
        // Keep the phasor on the unit circle
        if self.rot.norm() > 0.0 {
            self.rot /= self.rot.norm();
        }
        out
    }
}
