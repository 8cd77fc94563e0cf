//! Numerically Controlled Oscillator (NCO) with Phase-Locked Loop (PLL)
//!
//! The NCO generates a complex phasor at a programmable frequency. Fed with a
//! phase error, its second-order loop adjusts frequency (integral path) and
//! phase (proportional path) to lock onto an incoming carrier.
//!
//! Phase is in radians, wrapped to `[-π, π)`; frequency is in radians per
//! sample and can be clamped to a tracking range.
//!
//! # Example
//!
//! ```
//! use fmtuner::dsp::nco::Nco;
//! use num_complex::Complex;
//!
//! let mut nco = Nco::new(0.0);
//! nco.set_loop_bandwidth(std::f64::consts::PI / 100.0);
//!
//! let baseband = nco.mix_down(Complex::new(0.0, 1.0));
//! nco.pll_step(0.1);
//! nco.step();
//! # let _ = baseband;
//! ```

use std::f64::consts::PI;

use num_complex::Complex;

/// Numerically Controlled Oscillator with integrated Phase-Locked Loop.
#[derive(Debug, Clone)]
pub struct Nco {
    /// Current phase in radians
    phase: f64,

    /// Frequency in radians per sample
    frequency: f64,

    /// Proportional (phase) gain
    alpha: f64,

    /// Integral (frequency) gain
    beta: f64,

    min_frequency: f64,
    max_frequency: f64,
}

impl Nco {
    /// Create an NCO at `frequency` radians per sample, without frequency limits.
    pub fn new(frequency: f64) -> Self {
        Self {
            phase: 0.0,
            frequency,
            alpha: 0.0,
            beta: 0.0,
            min_frequency: f64::NEG_INFINITY,
            max_frequency: f64::INFINITY,
        }
    }

    /// Derive loop gains from a normalised loop bandwidth, critically damped.
    ///
    /// With damping `ζ = √2/2`: `alpha = 4ζ·bw / d`, `beta = 4·bw² / d`
    /// where `d = 1 + 2ζ·bw + bw²`.
    pub fn set_loop_bandwidth(&mut self, bandwidth: f64) {
        let damping = std::f64::consts::FRAC_1_SQRT_2;
        let denom = 1.0 + 2.0 * damping * bandwidth + bandwidth * bandwidth;
        self.alpha = 4.0 * damping * bandwidth / denom;
        self.beta = 4.0 * bandwidth * bandwidth / denom;
    }

    /// Set the PLL gains directly.
    pub fn set_pll_gains(&mut self, alpha: f64, beta: f64) {
        self.alpha = alpha;
        self.beta = beta;
    }

    pub fn gains(&self) -> (f64, f64) {
        (self.alpha, self.beta)
    }

    /// Restrict tracking to `[min, max]` radians per sample.
    pub fn set_frequency_limits(&mut self, min: f64, max: f64) {
        self.min_frequency = min;
        self.max_frequency = max;
        self.frequency = self.frequency.clamp(min, max);
    }

    pub fn set_phase(&mut self, phase: f64) {
        self.phase = wrap_phase(phase);
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current phasor `exp(j·phase)`.
    pub fn phasor(&self) -> Complex<f32> {
        Complex::from_polar(1.0, self.phase as f32)
    }

    /// Multiply by `exp(-j·phase)`, shifting the input down by the NCO.
    pub fn mix_down(&self, input: Complex<f32>) -> Complex<f32> {
        input * self.phasor().conj()
    }

    /// Advance the phase by one sample at the current frequency.
    pub fn step(&mut self) {
        self.phase = wrap_phase(self.phase + self.frequency);
    }

    /// Feed a phase error (radians) through the loop filter.
    ///
    /// The frequency moves by `beta·error` (clamped to the tracking range)
    /// and the phase by `alpha·error`.
    pub fn pll_step(&mut self, phase_error: f64) {
        self.frequency = (self.frequency + self.beta * phase_error)
            .clamp(self.min_frequency, self.max_frequency);
        self.phase = wrap_phase(self.phase + self.alpha * phase_error);
    }
}

fn wrap_phase(phase: f64) -> f64 {
    (phase + PI).rem_euclid(2.0 * PI) - PI
}
