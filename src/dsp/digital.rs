//! Bit-level blocks between symbol recovery and the RDS decoder.
use num_complex::Complex;

/// Real part of every sample.
pub fn complex_to_real(samples: &[Complex<f32>]) -> Vec<f32> {
    samples.iter().map(|s| s.re).collect()
}

/// Hard decision: `0` for negative input, `1` otherwise.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinarySlicer;

impl BinarySlicer {
    pub fn process(&self, samples: &[f32]) -> Vec<u8> {
        samples.iter().map(|&x| u8::from(x >= 0.0)).collect()
    }
}

/// Keeps the last of every `n` items; the count carries over between calls.
#[derive(Debug, Clone)]
pub struct KeepOneInN {
    n: usize,
    count: usize,
}

impl KeepOneInN {
    /// `n` is clamped to at least one.
    pub fn new(n: usize) -> Self {
        Self { n: n.max(1), count: 0 }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn process<T: Copy>(&mut self, items: &[T]) -> Vec<T> {
        let mut out = Vec::with_capacity(items.len() / self.n + 1);
        for &item in items {
            self.count += 1;
            if self.count == self.n {
                out.push(item);
                self.count = 0;
            }
        }
        out
    }
}

/// Differential decoder over symbols modulo `modulus`: `(x[n] - x[n-1]) mod M`.
#[derive(Debug, Clone)]
pub struct DiffDecoder {
    modulus: u8,
    last: u8,
}

impl DiffDecoder {
    /// `modulus` is clamped to at least two.
    pub fn new(modulus: u8) -> Self {
        Self {
            modulus: modulus.max(2),
            last: 0,
        }
    }

    pub fn process(&mut self, symbols: &[u8]) -> Vec<u8> {
        let m = self.modulus as u16;
        symbols
            .iter()
            .map(|&s| {
                let s = s as u16 % m;
                let out = ((s + m - self.last as u16) % m) as u8;
                self.last = s as u8;
                out
            })
            .collect()
    }
}
