// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Detection results and their tabular form.

use meterwatch::{Series, TIMESTAMP_FORMAT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-point label from the outlier model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MlLabel {
    Inlier,
    Outlier,
}

impl MlLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MlLabel::Inlier => "inlier",
            MlLabel::Outlier => "outlier",
        }
    }

    /// Conventional numeric code: 1 for inliers, -1 for outliers.
    pub fn code(&self) -> i8 {
        match self {
            MlLabel::Inlier => 1,
            MlLabel::Outlier => -1,
        }
    }

    pub fn is_outlier(&self) -> bool {
        matches!(self, MlLabel::Outlier)
    }
}

/// Final classification of the last point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Normal,
    Anomalous,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Normal => "NORMAL",
            Verdict::Anomalous => "ANOMALOUS",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule that produced the final risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "Normal usage")]
    NormalUsage,
    #[serde(rename = "Moderate drop in consumption")]
    ModerateDrop,
    #[serde(rename = "Sudden significant drop detected")]
    SevereDrop,
    #[serde(rename = "Anomalous consumption pattern")]
    AnomalousPattern,
    #[serde(rename = "insufficient data")]
    InsufficientData,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::NormalUsage => "Normal usage",
            Reason::ModerateDrop => "Moderate drop in consumption",
            Reason::SevereDrop => "Sudden significant drop detected",
            Reason::AnomalousPattern => "Anomalous consumption pattern",
            Reason::InsufficientData => "insufficient data",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating one series.
///
/// `risk_score`, `verdict`, `reason` and `drop_percent` describe the last
/// point only; `ml_labels` has one entry per point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub ml_labels: Vec<MlLabel>,
    pub risk_score: u8,
    pub verdict: Verdict,
    pub reason: Reason,
    pub drop_percent: f64,
}

impl DetectionResult {
    /// Fail-closed result for a series too short to analyse.
    ///
    /// Risk is 0 yet the verdict is anomalous; callers tell it apart with
    /// [`DetectionResult::is_insufficient`].
    pub fn insufficient(len: usize) -> Self {
        Self {
            ml_labels: vec![MlLabel::Inlier; len],
            risk_score: 0,
            verdict: Verdict::Anomalous,
            reason: Reason::InsufficientData,
            drop_percent: 0.0,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.reason == Reason::InsufficientData
    }

    pub fn is_anomalous(&self) -> bool {
        self.verdict == Verdict::Anomalous
    }

    /// Label of the last point.
    pub fn last_label(&self) -> Option<MlLabel> {
        self.ml_labels.last().copied()
    }

    pub fn outlier_count(&self) -> usize {
        self.ml_labels.iter().filter(|l| l.is_outlier()).count()
    }
}

/// One row of the tabular output.
///
/// Only the last row of a table carries the risk, verdict and reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRow {
    pub timestamp: String,
    pub consumption: f64,
    pub ml_label: MlLabel,
    pub risk_score: Option<u8>,
    pub verdict: Option<Verdict>,
    pub reason: Option<Reason>,
}

/// Column names of the tabular output, in order.
pub const ROW_HEADER: [&str; 6] = [
    "timestamp",
    "consumption",
    "ml_label",
    "risk_score",
    "verdict",
    "reason",
];

/// Join a series with its detection result into rows.
pub fn tabulate(series: &Series, result: &DetectionResult) -> Vec<DetectionRow> {
    let last = series.len().saturating_sub(1);

    series
        .points()
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let is_last = i == last;
            DetectionRow {
                timestamp: point.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                consumption: point.consumption.kwh(),
                ml_label: result.ml_labels.get(i).copied().unwrap_or(MlLabel::Inlier),
                risk_score: is_last.then_some(result.risk_score),
                verdict: is_last.then_some(result.verdict),
                reason: is_last.then_some(result.reason),
            }
        })
        .collect()
}
