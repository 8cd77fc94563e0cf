//! Integration tests for the iqread module

mod helpers;

use fmtuner::iqread::{IqConfig, IqFileTuner, IqRead};
use fmtuner::{Error, Gain, IqFormat, Tuner};
use std::fs;

#[test]
fn test_bytes_per_sample_by_format() {
    // Same 16 bytes: 8 Cu8/Cs8 samples, 4 Cs16 samples, 2 Cf32 samples
    let bytes = [0u8; 16];
    for (format, expected) in [
        (IqFormat::Cu8, 8),
        (IqFormat::Cs8, 8),
        (IqFormat::Cs16, 4),
        (IqFormat::Cf32, 2),
    ] {
        let mut reader = IqRead::new(&bytes[..], IqConfig::new(96_000, 64, format));
        let chunk = reader.next().expect("No data").expect("Read error");
        assert_eq!(chunk.len(), expected, "{format:?}");
    }
}

#[test]
fn test_expanduser_with_tilde() {
    let home = dirs::home_dir().expect("Could not get home directory");
    let name = format!(".fmtuner_test_{}.iq", std::process::id());
    let test_file = home.join(&name);
    fs::write(&test_file, [127u8, 127, 128, 128]).expect("Failed to write test file");

    let result = IqRead::from_file(format!("~/{name}"), IqConfig::new(96_000, 2, IqFormat::Cu8));
    assert!(result.is_ok(), "Failed to open file with tilde path: {:?}", result.err());

    let chunk = result.unwrap().next().expect("No data").expect("Read error");
    assert_eq!(chunk.len(), 2);

    fs::remove_file(&test_file).ok();
}

#[test]
fn test_nonexistent_file_is_io_error() {
    let result = IqRead::from_file(
        "~/nonexistent_file_12345.iq",
        IqConfig::new(96_000, 2, IqFormat::Cu8),
    );
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_iqread_multiple_chunks() {
    let path = helpers::temp_path("chunks.cu8");
    fs::write(&path, helpers::generate_sine_wave_cu8(1000.0, 96_000, 1000)).unwrap();

    let reader = IqRead::from_file(&path, IqConfig::new(96_000, 256, IqFormat::Cu8)).unwrap();
    let sizes: Vec<usize> = reader.map(|c| c.expect("Read error").len()).collect();
    assert_eq!(sizes, vec![256, 256, 256, 232]);

    fs::remove_file(&path).ok();
}

#[test]
fn test_file_tuner_plays_recording() {
    let path = helpers::temp_path("tuner.cu8");
    fs::write(&path, helpers::generate_dc_signal_cu8(300, 0.5, -0.5)).unwrap();

    let tuner = IqFileTuner::open(&path, IqConfig::new(2_400_000, 128, IqFormat::Cu8)).unwrap();
    assert_eq!(tuner.sample_rate(), 2_400_000);

    tuner.set_center_freq(87_600_000).unwrap();
    tuner.set_gain(Gain::Auto).unwrap();
    assert_eq!(tuner.center_freq(), 87_600_000);
    assert_eq!(tuner.gain(), Gain::Auto);

    let mut total = 0;
    while let Some(chunk) = tuner.read() {
        let chunk = chunk.unwrap();
        assert!(chunk.iter().all(|s| s.re > 0.4 && s.im < -0.4));
        total += chunk.len();
    }
    assert_eq!(total, 300);

    fs::remove_file(&path).ok();
}
