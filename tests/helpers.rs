//! Test helper utilities for generating synthetic I/Q signals
#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::PathBuf;

/// Unique path in the system temp directory
pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("fmtuner-{}-{name}", std::process::id()))
}

/// Generate a complex sine wave as interleaved Cu8 bytes
pub fn generate_sine_wave_cu8(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<u8> {
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;
    (0..num_samples)
        .flat_map(|n| {
            let phase = angular_freq * n as f32;
            // [-1, 1] to [0, 255]
            [
                ((phase.cos() + 1.0) * 127.5) as u8,
                ((phase.sin() + 1.0) * 127.5) as u8,
            ]
        })
        .collect()
}

/// Generate a complex sine wave as interleaved little-endian Cs16 bytes
pub fn generate_sine_wave_cs16(frequency: f32, sample_rate: u32, num_samples: usize) -> Vec<u8> {
    let angular_freq = 2.0 * PI * frequency / sample_rate as f32;
    let mut buffer = Vec::with_capacity(num_samples * 4);
    for n in 0..num_samples {
        let phase = angular_freq * n as f32;
        buffer.extend_from_slice(&((phase.cos() * 32767.0) as i16).to_le_bytes());
        buffer.extend_from_slice(&((phase.sin() * 32767.0) as i16).to_le_bytes());
    }
    buffer
}

/// Generate a constant Cu8 signal
pub fn generate_dc_signal_cu8(num_samples: usize, i_value: f32, q_value: f32) -> Vec<u8> {
    let i_byte = ((i_value + 1.0) * 127.5).clamp(0.0, 255.0) as u8;
    let q_byte = ((q_value + 1.0) * 127.5).clamp(0.0, 255.0) as u8;
    [i_byte, q_byte].repeat(num_samples)
}

/// Frequency-modulate a sine tone onto a carrier at `offset` Hz, as Cf32 bytes
pub fn generate_fm_tone_cf32(
    tone: f32,
    deviation: f32,
    offset: f32,
    sample_rate: u32,
    num_samples: usize,
) -> Vec<u8> {
    let fs = sample_rate as f64;
    let mut phase = 0.0f64;
    let mut buffer = Vec::with_capacity(num_samples * 8);
    for n in 0..num_samples {
        let t = n as f64 / fs;
        let tone_phase = 2.0 * std::f64::consts::PI * tone as f64 * t;
        let inst = offset as f64 + deviation as f64 * tone_phase.sin();
        phase = (phase + 2.0 * std::f64::consts::PI * inst / fs) % (2.0 * std::f64::consts::PI);
        buffer.extend_from_slice(&(phase.cos() as f32).to_le_bytes());
        buffer.extend_from_slice(&(phase.sin() as f32).to_le_bytes());
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sine_wave_cu8_length() {
        assert_eq!(generate_sine_wave_cu8(1000.0, 96000, 100).len(), 200);
    }

    #[test]
    fn test_generate_dc_signal_cu8() {
        let samples = generate_dc_signal_cu8(50, 0.0, 0.0);
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|&b| b == 127));
    }

    #[test]
    fn test_generate_fm_tone_cf32_length() {
        assert_eq!(generate_fm_tone_cf32(1000.0, 75e3, 0.0, 480_000, 10).len(), 80);
    }
}
