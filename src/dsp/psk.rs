//! M-PSK receiver: carrier recovery and symbol timing recovery.
//!
//! Each input sample is de-rotated by a tracking [`Nco`]. Symbols are
//! picked by linear interpolation at a fractional offset `mu` that a
//! Mueller and Müller timing loop advances by `omega` samples per symbol.
//! A Costas loop on the interpolated symbols corrects phase and frequency.
//! The phase error is normalised by the symbol power; the timing error is
//! not, so the input should be brought near unit amplitude first (see
//! [`Agc`](super::agc::Agc)).
//!
//! Only BPSK (`M = 2`) is supported.
//!
//! ```
//! use fmtuner::dsp::psk::{MpskParams, MpskReceiver};
//! use num_complex::Complex;
//!
//! let params = MpskParams::rds(120_000.0);
//! let mut rx = MpskReceiver::new(params).unwrap();
//! let symbols = rx.process(&vec![Complex::new(1.0, 0.0); 5_000]);
//! assert!(symbols.len() >= 98 && symbols.len() <= 100);
//! ```
use num_complex::Complex;

use super::nco::Nco;
use crate::{Error, Result};

/// RDS symbol rate (biphase symbols per second)
pub const RDS_SYMBOL_RATE: f64 = 2375.0;

/// Loop parameters of [`MpskReceiver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MpskParams {
    /// Constellation size
    pub m: usize,
    /// Initial carrier phase, radians
    pub theta: f64,
    /// Costas loop bandwidth, radians per sample
    pub loop_bw: f64,
    /// Lowest tracked frequency, radians per sample
    pub fmin: f64,
    /// Highest tracked frequency, radians per sample
    pub fmax: f64,
    /// Initial fractional sample offset
    pub mu: f64,
    pub gain_mu: f64,
    /// Nominal samples per symbol
    pub omega: f64,
    pub gain_omega: f64,
    /// Maximum relative deviation of `omega`: it stays within
    /// `omega·(1 ± omega_rel)`
    pub omega_rel: f64,
}

impl MpskParams {
    /// Parameters for the RDS BPSK stream at `sample_rate`.
    pub fn rds(sample_rate: f64) -> Self {
        Self {
            m: 2,
            theta: 0.0,
            loop_bw: std::f64::consts::PI / 100.0,
            fmin: -0.06,
            fmax: 0.06,
            mu: 0.5,
            gain_mu: 0.05,
            omega: sample_rate / RDS_SYMBOL_RATE,
            gain_omega: 0.001,
            omega_rel: 0.005,
        }
    }
}

pub struct MpskReceiver {
    params: MpskParams,
    nco: Nco,
    mu: f64,
    omega: f64,
    /// Two most recent de-rotated samples, oldest first
    delay: [Complex<f32>; 2],
    /// Last three interpolated symbols, oldest first
    current: [Complex<f32>; 3],
    /// Decisions for `current`
    decided: [Complex<f32>; 3],
}

impl MpskReceiver {
    pub fn new(params: MpskParams) -> Result<Self> {
        if params.m != 2 {
            return Err(Error::dsp(format!(
                "only BPSK is supported, got M = {}",
                params.m
            )));
        }
        if !(params.omega > 1.0) {
            return Err(Error::dsp(format!(
                "need more than one sample per symbol, got {}",
                params.omega
            )));
        }
        let mut nco = Nco::new(0.0);
        nco.set_loop_bandwidth(params.loop_bw);
        nco.set_frequency_limits(params.fmin, params.fmax);
        nco.set_phase(params.theta);

        let zero = Complex::new(0.0, 0.0);
        Ok(Self {
            params,
            nco,
            mu: params.mu,
            omega: params.omega,
            delay: [zero; 2],
            current: [zero; 3],
            decided: [zero; 3],
        })
    }

    /// Current samples-per-symbol estimate
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Current carrier frequency estimate, radians per sample
    pub fn frequency(&self) -> f64 {
        self.nco.frequency()
    }

    pub fn process(&mut self, samples: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut out = Vec::with_capacity((samples.len() as f64 / self.omega) as usize + 1);
        for &x in samples {
            while self.mu <= 1.0 {
                out.push(self.emit());
            }
            self.delay = [self.delay[1], self.nco.mix_down(x)];
            self.nco.step();
            self.mu -= 1.0;
        }
        out
    }

    fn emit(&mut self) -> Complex<f32> {
        let mu = self.mu as f32;
        let symbol = self.delay[0] + (self.delay[1] - self.delay[0]) * mu;
        self.track_timing(symbol);
        self.track_phase(symbol);
        symbol
    }

    fn track_timing(&mut self, symbol: Complex<f32>) {
        let decision = Complex::new(if symbol.re < 0.0 { -1.0 } else { 1.0 }, 0.0);
        self.current = [self.current[1], self.current[2], symbol];
        self.decided = [self.decided[1], self.decided[2], decision];

        let x = (self.decided[2] - self.decided[0]) * self.current[1].conj();
        let y = (self.current[2] - self.current[0]) * self.decided[1].conj();
        let error = ((y - x).re as f64).clamp(-1.0, 1.0);

        let nominal = self.params.omega;
        let rel = self.params.omega_rel;
        self.omega = (self.omega + self.params.gain_omega * error)
            .clamp(nominal * (1.0 - rel), nominal * (1.0 + rel));
        self.mu += self.omega + self.params.gain_mu * error;
    }

    fn track_phase(&mut self, symbol: Complex<f32>) {
        // Costas detector for BPSK: ½·sin(2θ) for a residual rotation θ
        let power = symbol.norm_sqr();
        if power <= 1e-12 {
            self.nco.pll_step(0.0);
            return;
        }
        let error = ((symbol.re * symbol.im / power) as f64).clamp(-1.0, 1.0);
        self.nco.pll_step(error);
    }
}
