// Meterwatch Monitor - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the live poller and batch detection.

use lazy_static::lazy_static;
use meterwatch::{LiveRiskResult, ReadOutcome};
use meterwatch_detect::DetectionResult;
use meterwatch_testdata::Scenario;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use tracing::warn;

lazy_static! {
    // ============================================================
    // Live scoring
    // ============================================================

    /// Latest smoothed consumption seen by the poller.
    pub static ref LIVE_CONSUMPTION_KWH: Gauge = register_gauge!(
        "meterwatch_live_consumption_kwh",
        "Latest smoothed consumption in kWh"
    ).unwrap();

    /// Latest live risk score (0-100).
    pub static ref LIVE_RISK_SCORE: Gauge = register_gauge!(
        "meterwatch_live_risk_score",
        "Latest live risk score (0-100)"
    ).unwrap();

    /// Values: 0 = Normal, 1 = Warning, 2 = Theft
    pub static ref LIVE_VERDICT: Gauge = register_gauge!(
        "meterwatch_live_verdict",
        "Latest live verdict (0=Normal, 1=Warning, 2=Theft)"
    ).unwrap();

    pub static ref LIVE_POLLS_TOTAL: CounterVec = register_counter_vec!(
        "meterwatch_live_polls_total",
        "Live polls by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SOURCE_HARDWARE: Gauge = register_gauge!(
        "meterwatch_source_hardware",
        "Reading source backed by hardware (1) or simulation (0)"
    ).unwrap();

    // ============================================================
    // Batch detection
    // ============================================================

    pub static ref BATCH_RISK_SCORE: Gauge = register_gauge!(
        "meterwatch_batch_risk_score",
        "Risk score of the last batch evaluation"
    ).unwrap();

    pub static ref BATCH_DROP_PERCENT: Gauge = register_gauge!(
        "meterwatch_batch_drop_percent",
        "Drop of the last point against its rolling baseline (%)"
    ).unwrap();

    pub static ref BATCH_OUTLIERS: Gauge = register_gauge!(
        "meterwatch_batch_outliers",
        "Points labelled outlier in the last batch evaluation"
    ).unwrap();

    pub static ref BATCH_EVALUATIONS_TOTAL: CounterVec = register_counter_vec!(
        "meterwatch_batch_evaluations_total",
        "Batch evaluations by verdict",
        &["verdict"]
    ).unwrap();

    pub static ref SERIES_GENERATED_TOTAL: CounterVec = register_counter_vec!(
        "meterwatch_series_generated_total",
        "Synthesized series by scenario",
        &["scenario"]
    ).unwrap();
}

/// Count a poll, and update the live gauges when it was scored.
pub fn record_poll(outcome: &ReadOutcome, result: Option<&LiveRiskResult>) {
    LIVE_POLLS_TOTAL
        .with_label_values(&[outcome.as_str()])
        .inc();

    if let Some(result) = result {
        LIVE_CONSUMPTION_KWH.set(result.consumption.kwh());
        LIVE_RISK_SCORE.set(result.risk_score as f64);
        LIVE_VERDICT.set(result.verdict.code() as f64);
    }
}

pub fn update_source_metrics(is_hardware: bool) {
    SOURCE_HARDWARE.set(if is_hardware { 1.0 } else { 0.0 });
}

pub fn record_evaluation(result: &DetectionResult) {
    BATCH_RISK_SCORE.set(result.risk_score as f64);
    BATCH_DROP_PERCENT.set(result.drop_percent);
    BATCH_OUTLIERS.set(result.outlier_count() as f64);
    BATCH_EVALUATIONS_TOTAL
        .with_label_values(&[result.verdict.as_str()])
        .inc();
}

pub fn record_generated(scenario: Scenario) {
    SERIES_GENERATED_TOTAL
        .with_label_values(&[scenario.as_str()])
        .inc();
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
