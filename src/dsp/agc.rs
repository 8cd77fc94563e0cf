//! Automatic Gain Control (AGC)
//!
//! Normalises the amplitude of a complex stream before symbol recovery. The
//! envelope is tracked with an exponential moving average and the gain is
//! nudged towards `target / envelope`, in the manner of liquid-dsp's
//! `agc_crcf`.
//!
//! # Example
//!
//! ```
//! use fmtuner::dsp::agc::Agc;
//! use num_complex::Complex;
//!
//! let mut agc = Agc::new(0.01);
//! let out = agc.process(&vec![Complex::new(4.0, 0.0); 2_000]);
//! assert!((out[1_999].norm() - 1.0).abs() < 0.05);
//! ```

use num_complex::Complex;

use super::DspBlock;

/// Automatic gain control for complex signals.
#[derive(Debug, Clone)]
pub struct Agc {
    /// Target output amplitude
    target: f32,

    /// Loop bandwidth (controls attack/decay rate)
    bandwidth: f32,

    gain: f32,

    /// Envelope estimate of the output
    envelope: f32,

    gain_min: f32,
    gain_max: f32,
}

impl Agc {
    /// AGC with unit target amplitude. `bandwidth` is clamped to `[0, 1]`;
    /// lower values react more slowly to level changes.
    pub fn new(bandwidth: f32) -> Self {
        Self::with_target(bandwidth, 1.0)
    }

    pub fn with_target(bandwidth: f32, target: f32) -> Self {
        Self {
            target,
            bandwidth: bandwidth.clamp(0.0, 1.0),
            gain: 1.0,
            envelope: target,
            gain_min: 1e-6,
            gain_max: 1e6,
        }
    }

    pub fn set_gain_limits(&mut self, min: f32, max: f32) {
        self.gain_min = min.max(1e-10);
        self.gain_max = max.min(1e10);
        self.gain = self.gain.clamp(self.gain_min, self.gain_max);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Scale one sample by the current gain, then update the gain.
    pub fn execute(&mut self, sample: Complex<f32>) -> Complex<f32> {
        let out = sample * self.gain;

        self.envelope = (1.0 - self.bandwidth) * self.envelope + self.bandwidth * out.norm();
        if self.envelope > 1e-10 {
            let error = self.target / self.envelope;
            self.gain *= 1.0 + self.bandwidth * (error - 1.0);
            self.gain = self.gain.clamp(self.gain_min, self.gain_max);
        }
        out
    }

    pub fn process(&mut self, samples: &[Complex<f32>]) -> Vec<Complex<f32>> {
        samples.iter().map(|&s| self.execute(s)).collect()
    }
}

impl Default for Agc {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl DspBlock for Agc {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        Agc::process(self, data)
    }
}
