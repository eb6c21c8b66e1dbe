// Meterwatch Detect - Integration Tests
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! End-to-end checks of the hybrid engine on synthesized scenarios.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use meterwatch::{ReadingSource, Series, SourceConfig};
use meterwatch_detect::*;
use meterwatch_testdata::{Scenario, SynthConfig, Synthesizer};

// ============================================================================
// Helper Functions
// ============================================================================

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn series(values: &[f64]) -> Series {
    Series::from_values(start(), Duration::minutes(15), values)
}

fn synthesized(scenario: Scenario, seed: u64) -> Series {
    let mut source = ReadingSource::simulated(&SourceConfig::simulation());
    Synthesizer::new(SynthConfig::default().with_start(start()))
        .unwrap()
        .with_seed(seed)
        .generate(&mut source, scenario)
        .series
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_theft_scenario_is_anomalous() {
    let series = synthesized(Scenario::Theft, 42);
    assert_eq!(series.len(), 60);

    let result = evaluate(&series);
    assert!(result.drop_percent > 40.0, "drop {}", result.drop_percent);
    assert!(result.risk_score >= 80);
    assert_eq!(result.verdict, Verdict::Anomalous);
    assert_eq!(result.reason, Reason::SevereDrop);
}

#[test]
fn test_normal_scenario_is_normal() {
    let result = evaluate(&synthesized(Scenario::Normal, 42));
    assert!(result.risk_score < 70);
    assert_eq!(result.verdict, Verdict::Normal);
}

#[test]
fn test_low_variance_series_are_normal() {
    for len in [5, 6, 12, 30, 60, 200] {
        let values: Vec<f64> = (0..len)
            .map(|i| 3.0 + 0.15 * ((i * 7 % 11) as f64 / 10.0 - 0.5))
            .collect();
        let result = evaluate(&series(&values));

        assert_eq!(result.verdict, Verdict::Normal, "length {}", len);
        assert!(result.risk_score < 70);
        assert_eq!(result.outlier_count(), 0);
    }
}

#[test]
fn test_evaluate_is_idempotent() {
    let engine = HybridEngine::new(DetectionConfig::default().with_seed(42));
    for scenario in Scenario::ALL {
        let series = synthesized(scenario, 9);
        assert_eq!(engine.evaluate(&series), engine.evaluate(&series));
    }
}

#[test]
fn test_short_series_sentinel_regardless_of_content() {
    for values in [vec![], vec![0.0], vec![3.0, 3.0, 3.0], vec![100.0, 0.0, 50.0, 1.0]] {
        let result = evaluate(&series(&values));
        assert!(result.is_insufficient());
        assert_eq!(result.risk_score, 0);
        assert_eq!(result.verdict, Verdict::Anomalous);
        assert_eq!(result.reason.as_str(), "insufficient data");
    }
}

#[test]
fn test_tabulate_theft() {
    let series = synthesized(Scenario::Theft, 1);
    let result = evaluate(&series);
    let rows = tabulate(&series, &result);

    assert_eq!(rows.len(), 60);
    assert_eq!(ROW_HEADER[0], "timestamp");
    assert!(rows[..59].iter().all(|r| r.verdict.is_none()));

    let last = &rows[59];
    assert_eq!(last.verdict, Some(Verdict::Anomalous));
    assert_eq!(last.reason, Some(Reason::SevereDrop));
    assert!((last.consumption - 0.9).abs() < 1e-9);
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_custom_thresholds() {
    let mut config = DetectionConfig::default();
    config.fusion.anomalous_threshold = 60;

    // 25% drop reaches the moderate tier, now enough for an anomalous verdict
    let values = [3.0, 3.0, 3.1, 2.9, 3.0, 3.0, 2.25];
    let result = HybridEngine::new(config).evaluate(&series(&values));
    assert_eq!(result.risk_score, 60);
    assert_eq!(result.verdict, Verdict::Anomalous);
}

#[test]
fn test_result_json() {
    let result = evaluate(&synthesized(Scenario::Theft, 3));
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["verdict"], "ANOMALOUS");
    assert_eq!(json["reason"], "Sudden significant drop detected");
    assert_eq!(json["ml_labels"].as_array().unwrap().len(), 60);
}
