//! Change detection and notification order of the RDS adapter

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use tuner::Error;
use tuner::rds::{RdsAdapter, RdsField, RdsFragment, RdsValue};

type Events = Arc<Mutex<Vec<(RdsField, RdsValue)>>>;

fn recording_adapter() -> (RdsAdapter, Events) {
    let events: Events = Arc::default();
    let log = Arc::clone(&events);
    let adapter = RdsAdapter::with_sink(Arc::new(move |field: RdsField, value: &RdsValue| {
        log.lock().unwrap().push((field, value.clone()));
    }));
    (adapter, events)
}

fn frequencies(list: &[&str]) -> RdsValue {
    RdsValue::Frequencies(list.iter().map(|s| s.to_string()).collect())
}

#[test]
fn test_station_scenario() {
    let (adapter, events) = recording_adapter();
    for (code, payload) in [
        (1, "KROQ"),
        (1, "KROQ"),
        (4, "Hello"),
        (6, "98.5, 98.7"),
        (6, "98.7, 99.1"),
    ] {
        adapter.handle(&RdsFragment::new(code, payload)).unwrap();
    }

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (RdsField::StationName, RdsValue::Text("KROQ".to_string())),
            (RdsField::RadioText, RdsValue::Text("Hello".to_string())),
            (RdsField::AlternativeFrequencies, frequencies(&["98.5", "98.7"])),
            (
                RdsField::AlternativeFrequencies,
                frequencies(&["98.5", "98.7", "99.1"])
            ),
        ]
    );

    let data = adapter.snapshot();
    assert_eq!(data.station_name(), Some("KROQ"));
    assert_eq!(data.radio_text(), Some("Hello"));
    assert_eq!(data.len(), 3);
}

#[test]
fn test_repeated_fragment_is_silent() {
    let (adapter, events) = recording_adapter();
    let fragment = RdsFragment::from_field(RdsField::ProgramInformation, "54A8");

    assert_eq!(adapter.handle(&fragment).unwrap(), Some(RdsField::ProgramInformation));
    assert_eq!(adapter.handle(&fragment).unwrap(), None);
    assert_eq!(adapter.handle(&fragment).unwrap(), None);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_text_replacement_notifies() {
    let (adapter, events) = recording_adapter();
    adapter.handle(&RdsFragment::new(2, "Rock")).unwrap();
    adapter.handle(&RdsFragment::new(2, "News")).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].1, RdsValue::Text("News".to_string()));
    assert_eq!(adapter.snapshot().program_type(), Some("News"));
}

#[test]
fn test_alternative_frequencies_only_grow() {
    let (adapter, events) = recording_adapter();
    adapter.handle(&RdsFragment::new(6, "98.5, 98.7")).unwrap();
    // Subset and empty payloads add nothing
    assert_eq!(adapter.handle(&RdsFragment::new(6, "98.7")).unwrap(), None);
    assert_eq!(adapter.handle(&RdsFragment::new(6, "")).unwrap(), None);
    assert_eq!(adapter.handle(&RdsFragment::new(6, " , ")).unwrap(), None);

    let data = adapter.snapshot();
    let expected: BTreeSet<String> = ["98.5", "98.7"].iter().map(|s| s.to_string()).collect();
    assert_eq!(data.alternative_frequencies(), Some(&expected));
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_clear_forgets_values() {
    let (adapter, events) = recording_adapter();
    adapter.handle(&RdsFragment::new(1, "KROQ")).unwrap();
    adapter.clear();
    assert!(adapter.snapshot().is_empty());

    // The same value is a change again after a clear
    assert_eq!(
        adapter.handle(&RdsFragment::new(1, "KROQ")).unwrap(),
        Some(RdsField::StationName)
    );
    assert_eq!(events.lock().unwrap().len(), 2);
}

#[test]
fn test_unknown_code_leaves_cache_untouched() {
    let (adapter, events) = recording_adapter();
    adapter.handle(&RdsFragment::new(1, "KROQ")).unwrap();

    let err = adapter.handle(&RdsFragment::new(7, "x")).unwrap_err();
    assert!(matches!(err, Error::UnknownMessageType(7)));
    assert_eq!(adapter.snapshot().len(), 1);
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn test_fragments_dropped_after_shutdown() {
    let (adapter, events) = recording_adapter();
    adapter.shutdown();
    assert!(adapter.is_shut_down());

    assert_eq!(adapter.handle(&RdsFragment::new(1, "KROQ")).unwrap(), None);
    assert!(adapter.snapshot().is_empty());
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn test_unsubscribe_keeps_caching() {
    let (adapter, events) = recording_adapter();
    adapter.subscribe(None);
    assert_eq!(
        adapter.handle(&RdsFragment::new(5, "2020-01-01 12:30 UTC+01:00")).unwrap(),
        Some(RdsField::ClockTime)
    );
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(
        adapter.snapshot().clock_time(),
        Some("2020-01-01 12:30 UTC+01:00")
    );
}
