//! RDS decoding of a synthetic FM broadcast through the whole receiver

mod helpers;

use std::sync::{Arc, Mutex};

use helpers::{ReplayTuner, fm_with_rds, group_bits, station_groups};
use tuner::rds::{RdsField, RdsValue};
use tuner::{ReceiverBuilder, ReceiverConfig};

const SAMPLE_RATE: u32 = 1_200_000;
const SECONDS: f64 = 1.5;

fn broadcast() -> Vec<num_complex::Complex<f32>> {
    let groups = station_groups(0x54A8, b"KROQ FM ");
    let bits = group_bits(&groups, (SECONDS * 1187.5) as usize + 2);
    fm_with_rds(SAMPLE_RATE as f64, SECONDS, &bits, 4_000.0, 20_000.0)
}

#[test]
fn test_station_name_decoded_from_fm_signal() {
    let tuner = Arc::new(ReplayTuner::new(SAMPLE_RATE, 16_384, broadcast()));
    let events = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&events);

    let config = ReceiverConfig {
        baseband_decimation: 2,
        ..ReceiverConfig::default().with_sample_rate(SAMPLE_RATE)
    };
    let receiver = ReceiverBuilder::new(config)
        .tuner(Arc::clone(&tuner))
        .on_rds(move |field: RdsField, value: &RdsValue| {
            log.lock().unwrap().push((field, value.clone()));
        })
        .build()
        .unwrap();
    assert_eq!(tuner.frequency(), Some(87_600_000));

    receiver.start().unwrap();
    receiver.wait().unwrap();

    let events = events.lock().unwrap();
    assert!(
        events.contains(&(RdsField::StationName, RdsValue::Text("KROQ FM".to_string()))),
        "events: {events:?}"
    );

    let data = receiver.rds_data();
    assert_eq!(data.station_name(), Some("KROQ FM"));
    assert_eq!(data.program_information(), Some("54A8"));
    assert_eq!(data.program_type(), Some("Pop Music"));
    let frequencies = data.alternative_frequencies().unwrap();
    assert!(frequencies.contains("98.5"));
    assert!(frequencies.contains("98.7"));
}

#[test]
fn test_retune_forgets_decoded_station() {
    let tuner = Arc::new(ReplayTuner::new(SAMPLE_RATE, 16_384, broadcast()));
    let config = ReceiverConfig {
        baseband_decimation: 2,
        ..ReceiverConfig::default().with_sample_rate(SAMPLE_RATE)
    };
    let receiver = ReceiverBuilder::new(config)
        .tuner(Arc::clone(&tuner))
        .build()
        .unwrap();

    receiver.start().unwrap();
    receiver.wait().unwrap();
    assert_eq!(receiver.rds_data().station_name(), Some("KROQ FM"));

    receiver.set_frequency(98.7e6).unwrap();
    assert_eq!(tuner.frequency(), Some(98_700_000));
    assert!(receiver.rds_data().is_empty());
}
