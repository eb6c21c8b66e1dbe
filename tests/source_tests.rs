// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Integration tests for the reading source
//!
//! These tests drive a source over real file and TCP links and check the
//! fallback and stale-value behaviour end to end.

use meterwatch::{
    live, LiveVerdict, ReadOutcome, ReadingSource, SourceConfig, SourceMode, SourceStatus,
};
use std::io::Write;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Poll until a fresh reading shows up or the attempts run out
fn poll_fresh(source: &mut ReadingSource) -> ReadOutcome {
    for _ in 0..200 {
        let outcome = source.next_reading();
        if outcome.is_fresh() {
            return outcome;
        }
        thread::sleep(Duration::from_millis(5));
    }
    ReadOutcome::Unavailable
}

#[test]
fn test_file_backed_hardware_source() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "0").unwrap();
    file.flush().unwrap();

    let config = SourceConfig::hardware(&file.path().to_string_lossy());
    let mut source = ReadingSource::connect(&config).unwrap();
    assert_eq!(source.status(), SourceStatus::Hardware);
    assert!(source.is_hardware());

    let outcome = poll_fresh(&mut source);
    assert!(outcome.is_fresh());
    assert_eq!(outcome.reading().kwh(), 0.0);

    // A dead meter is maximum-risk theft on the live path
    let result = live::score(outcome.reading());
    assert_eq!(result.risk_score, 80);
    assert_eq!(result.verdict, LiveVerdict::Theft);

    // File exhausted: last value is reused
    let outcome = source.next_reading();
    assert!(matches!(outcome, ReadOutcome::Stale(_)));
}

#[test]
fn test_tcp_hardware_source() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(b"613\n").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(200));
    });

    let config = SourceConfig::hardware(&format!("tcp://{}", addr));
    let mut source = ReadingSource::connect(&config).unwrap();
    assert_eq!(source.status(), SourceStatus::Hardware);

    let outcome = poll_fresh(&mut source);
    // 613 / 1023 * 50
    assert!((outcome.reading().kwh() - 29.96).abs() < 0.01);
    assert_eq!(live::score(outcome.reading()).verdict, LiveVerdict::Normal);

    server.join().unwrap();
}

#[test]
fn test_unreachable_hardware_falls_back() {
    let config = SourceConfig::hardware("tcp://127.0.0.1:1").with_seed(5);
    let mut source = ReadingSource::connect(&config).unwrap();

    assert_eq!(source.status(), SourceStatus::FallbackSimulated);
    assert_eq!(config.mode, SourceMode::Hardware);

    for _ in 0..20 {
        let kwh = source.next_reading().reading().kwh();
        assert!((0.0..50.0).contains(&kwh));
    }
}

#[test]
fn test_config_from_json() {
    let config: SourceConfig =
        serde_json::from_str(r#"{"mode": "simulation", "seed": 3, "window_capacity": 3}"#)
            .unwrap();
    let mut source = ReadingSource::connect(&config).unwrap();

    for _ in 0..10 {
        source.next_reading();
    }
    assert_eq!(source.window().len(), 3);
}
