//! Synthetic FM broadcast with an RDS subcarrier
#![allow(dead_code)]

use std::f64::consts::PI;
use std::sync::Mutex;

use fmtuner::{Gain, Tuner};
use num_complex::Complex;

/// RDS subcarrier frequency, 24 times the chip rate
pub const SUBCARRIER_HZ: f64 = 57_000.0;

/// Biphase chips per second, two per data bit
pub const CHIP_RATE: f64 = 2375.0;

const CHECKWORD_POLY: u32 = 0b101_1011_1001;

/// Offset words of blocks A, B, C and D
const OFFSETS: [u32; 4] = [0x0FC, 0x198, 0x168, 0x1B4];

/// 26-bit block: 16 data bits, then the checkword plus the offset word
pub fn encode_block(data: u16, position: usize) -> u32 {
    let mut reg = (data as u32) << 10;
    for bit in (10..26).rev() {
        if reg & (1 << bit) != 0 {
            reg ^= CHECKWORD_POLY << (bit - 10);
        }
    }
    (((data as u32) << 10) | reg) ^ OFFSETS[position]
}

/// The four 0A groups carrying an eight-character station name.
///
/// PTY 10, music, AF codes 110 and 112 (98.5 and 98.7 MHz).
pub fn station_groups(pi: u16, name: &[u8; 8]) -> Vec<[u16; 4]> {
    (0..4u16)
        .map(|segment| {
            let i = 2 * segment as usize;
            [
                pi,
                (10 << 5) | (1 << 3) | segment,
                (110 << 8) | 112,
                u16::from_be_bytes([name[i], name[i + 1]]),
            ]
        })
        .collect()
}

/// Data bits of `groups` repeated until `count` bits, MSB first
pub fn group_bits(groups: &[[u16; 4]], count: usize) -> Vec<u8> {
    groups
        .iter()
        .cycle()
        .flat_map(|group| {
            group.iter().enumerate().flat_map(|(position, &data)| {
                let block = encode_block(data, position);
                (0..26).rev().map(move |k| ((block >> k) & 1) as u8)
            })
        })
        .take(count)
        .collect()
}

/// FM broadcast carrying `bits` on the RDS subcarrier, plus a 1 kHz tone.
///
/// The bits are differentially encoded, then sent as biphase chips
/// amplitude-modulating the 57 kHz subcarrier with `rds_deviation` Hz.
pub fn fm_with_rds(
    sample_rate: f64,
    seconds: f64,
    bits: &[u8],
    rds_deviation: f64,
    audio_deviation: f64,
) -> Vec<Complex<f32>> {
    let mut level = 0u8;
    let encoded: Vec<u8> = bits
        .iter()
        .map(|&b| {
            level ^= b;
            level
        })
        .collect();

    let n = (sample_rate * seconds) as usize;
    let mut phase = 0.0f64;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate;
            let chip = (t * CHIP_RATE) as usize;
            let bit = encoded[(chip / 2).min(encoded.len() - 1)];
            let sign = if bit == 1 { 1.0 } else { -1.0 };
            let symbol = if chip % 2 == 0 { sign } else { -sign };

            let rds = rds_deviation * symbol * (2.0 * PI * SUBCARRIER_HZ * t).cos();
            let audio = audio_deviation * (2.0 * PI * 1_000.0 * t).sin();
            phase = (phase + 2.0 * PI * (rds + audio) / sample_rate) % (2.0 * PI);
            Complex::from_polar(1.0, phase as f32)
        })
        .collect()
}

/// Tuner replaying a recorded signal in fixed-size chunks
pub struct ReplayTuner {
    sample_rate: u32,
    chunk: usize,
    samples: Vec<Complex<f32>>,
    position: Mutex<usize>,
    frequency: Mutex<Option<u32>>,
}

impl ReplayTuner {
    pub fn new(sample_rate: u32, chunk: usize, samples: Vec<Complex<f32>>) -> Self {
        Self {
            sample_rate,
            chunk,
            samples,
            position: Mutex::new(0),
            frequency: Mutex::new(None),
        }
    }

    pub fn frequency(&self) -> Option<u32> {
        *self.frequency.lock().unwrap()
    }
}

impl Tuner for ReplayTuner {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_center_freq(&self, freq_hz: u32) -> fmtuner::Result<()> {
        *self.frequency.lock().unwrap() = Some(freq_hz);
        Ok(())
    }

    fn set_gain(&self, _gain: Gain) -> fmtuner::Result<()> {
        Ok(())
    }

    fn read(&self) -> Option<fmtuner::Result<Vec<Complex<f32>>>> {
        let mut position = self.position.lock().unwrap();
        if *position >= self.samples.len() {
            return None;
        }
        let end = (*position + self.chunk).min(self.samples.len());
        let chunk = self.samples[*position..end].to_vec();
        *position = end;
        Some(Ok(chunk))
    }
}
