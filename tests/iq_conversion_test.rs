//! Integration tests for I/Q format conversion
//!
//! Known byte patterns are written to disk and read back through `IqRead`.

mod helpers;

use fmtuner::IqFormat;
use fmtuner::iqread::{IqConfig, IqRead};
use num_complex::Complex;
use std::fs;

fn read_back(name: &str, bytes: &[u8], format: IqFormat, chunk: usize) -> Vec<Complex<f32>> {
    let path = helpers::temp_path(name);
    fs::write(&path, bytes).expect("Failed to write test file");
    let mut reader = IqRead::from_file(&path, IqConfig::new(96_000, chunk, format))
        .expect("Failed to open recording");
    let chunk = reader.next().expect("No data").expect("Read error");
    fs::remove_file(&path).ok();
    chunk
}

fn assert_close(got: Complex<f32>, re: f32, im: f32) {
    let epsilon = 0.01;
    assert!((got.re - re).abs() < epsilon, "I: expected ~{re}, got {}", got.re);
    assert!((got.im - im).abs() < epsilon, "Q: expected ~{im}, got {}", got.im);
}

#[test]
fn test_iq_conversion_cu8_sine_wave() {
    let bytes = helpers::generate_sine_wave_cu8(1000.0, 96000, 96);
    let chunk = read_back("sine.cu8", &bytes, IqFormat::Cu8, 96);
    assert_eq!(chunk.len(), 96);
    // Unit circle within quantisation error
    for s in chunk {
        assert!((s.norm() - 1.0).abs() < 0.02, "magnitude {}", s.norm());
    }
}

#[test]
fn test_iq_conversion_dc_signal() {
    let bytes = helpers::generate_dc_signal_cu8(100, 0.0, 0.0);
    for s in read_back("dc.cu8", &bytes, IqFormat::Cu8, 100) {
        assert_close(s, 0.0, 0.0);
    }
}

#[test]
fn test_convert_cu8_boundaries() {
    let chunk = read_back("bounds.cu8", &[0, 0, 127, 127, 128, 128, 255, 255], IqFormat::Cu8, 4);
    assert_close(chunk[0], -0.996, -0.996);
    assert_close(chunk[1], -0.004, -0.004);
    assert_close(chunk[2], 0.004, 0.004);
    assert_close(chunk[3], 0.996, 0.996);
}

#[test]
fn test_convert_cs8_sign_handling() {
    let bytes = [0x80, 0x80, 0xFF, 0xFF, 0, 0, 0x7F, 0x7F];
    let chunk = read_back("sign.cs8", &bytes, IqFormat::Cs8, 4);
    assert_close(chunk[0], -1.0, -1.0);
    assert_close(chunk[1], -0.0078, -0.0078);
    assert_close(chunk[2], 0.0, 0.0);
    assert_close(chunk[3], 0.992, 0.992);
}

#[test]
fn test_convert_cs16_endianness() {
    let mut bytes = Vec::new();
    for v in [i16::MIN, 0, i16::MAX] {
        bytes.extend_from_slice(&v.to_le_bytes());
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let chunk = read_back("endian.cs16", &bytes, IqFormat::Cs16, 3);
    assert_close(chunk[0], -1.0, -1.0);
    assert_close(chunk[1], 0.0, 0.0);
    assert_close(chunk[2], 0.999, 0.999);
}

#[test]
fn test_convert_cs16_sine_wave() {
    let bytes = helpers::generate_sine_wave_cs16(12_000.0, 96_000, 8);
    let chunk = read_back("sine.cs16", &bytes, IqFormat::Cs16, 8);
    // 12 kHz at 96 kHz is an eighth of a turn per sample
    assert_close(chunk[2], 0.0, 1.0);
    assert_close(chunk[4], -1.0, 0.0);
}

#[test]
fn test_convert_cf32_float_precision() {
    let mut bytes = Vec::new();
    for v in [0.5f32, -0.5, -1.0, 1.0, 0.0, 0.0] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    let chunk = read_back("precision.cf32", &bytes, IqFormat::Cf32, 3);
    assert_eq!(
        chunk,
        vec![Complex::new(0.5, -0.5), Complex::new(-1.0, 1.0), Complex::new(0.0, 0.0)]
    );
}

#[test]
fn test_convert_empty_buffer() {
    let path = helpers::temp_path("empty.cu8");
    fs::write(&path, b"").expect("Failed to write test file");
    let mut reader = IqRead::from_file(&path, IqConfig::new(96_000, 16, IqFormat::Cu8)).unwrap();
    let result = reader.next();
    assert!(result.is_none(), "Expected None for empty file, got {result:?}");
    fs::remove_file(&path).ok();
}
