// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Constant-time risk scoring of a single smoothed reading.
//!
//! The live path refreshes many times per second, so it never fits a model:
//! the reading is compared against a fixed expected operating band.
//!
//! | Consumption | Risk |
//! |---|---|
//! | below `min` | `min(80, (min - c) / min * 100)` |
//! | above `max` | `min(60, (c - max) / max * 50)` |
//! | within band | `10` |
//!
//! Risk is truncated to an integer, then `> 70` is THEFT DETECTED,
//! `41..=70` is WARNING and anything else NORMAL.

use crate::config::OperatingBand;
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk ceiling for under-consumption.
pub const UNDER_BAND_RISK_CAP: f64 = 80.0;
/// Risk ceiling for over-consumption.
pub const OVER_BAND_RISK_CAP: f64 = 60.0;
/// Risk inside the expected band.
pub const IN_BAND_RISK: u8 = 10;
/// Risk strictly above this is theft.
pub const THEFT_THRESHOLD: u8 = 70;
/// Risk strictly above this is a warning.
pub const WARNING_THRESHOLD: u8 = 40;

/// Three-tier live verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiveVerdict {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "THEFT DETECTED")]
    Theft,
}

impl LiveVerdict {
    /// Verdict for an integer risk score.
    pub fn from_risk(risk: u8) -> Self {
        if risk > THEFT_THRESHOLD {
            LiveVerdict::Theft
        } else if risk > WARNING_THRESHOLD {
            LiveVerdict::Warning
        } else {
            LiveVerdict::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LiveVerdict::Normal => "NORMAL",
            LiveVerdict::Warning => "WARNING",
            LiveVerdict::Theft => "THEFT DETECTED",
        }
    }

    /// Numeric code for gauges: 0 = normal, 1 = warning, 2 = theft.
    pub fn code(&self) -> u8 {
        match self {
            LiveVerdict::Normal => 0,
            LiveVerdict::Warning => 1,
            LiveVerdict::Theft => 2,
        }
    }
}

impl fmt::Display for LiveVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scoring one live reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRiskResult {
    pub consumption: Reading,
    pub risk_score: u8,
    pub verdict: LiveVerdict,
    pub reason: String,
}

impl LiveRiskResult {
    pub fn is_theft(&self) -> bool {
        self.verdict == LiveVerdict::Theft
    }
}

/// Scores readings against an operating band.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveRiskScorer {
    band: OperatingBand,
}

impl LiveRiskScorer {
    pub fn new(band: OperatingBand) -> Self {
        Self { band }
    }

    pub fn band(&self) -> OperatingBand {
        self.band
    }

    /// Integer risk for a consumption value.
    pub fn risk(&self, consumption: Reading) -> u8 {
        let c = consumption.kwh();
        let OperatingBand { min, max } = self.band;

        let risk = if c < min {
            UNDER_BAND_RISK_CAP.min((min - c) / min * 100.0)
        } else if c > max {
            OVER_BAND_RISK_CAP.min((c - max) / max * 50.0)
        } else {
            return IN_BAND_RISK;
        };

        // Truncation, not rounding: 12.5 scores 12.
        risk.clamp(0.0, 100.0) as u8
    }

    pub fn score(&self, consumption: Reading) -> LiveRiskResult {
        let risk_score = self.risk(consumption);
        let verdict = LiveVerdict::from_risk(risk_score);
        let shown = consumption.rounded(2);

        let reason = match verdict {
            LiveVerdict::Theft => format!(
                "Suspicious consumption detected: {:.2} kWh (expected: {}-{} kWh)",
                shown.kwh(),
                self.band.min,
                self.band.max
            ),
            LiveVerdict::Warning => format!(
                "Consumption outside expected band: {:.2} kWh",
                shown.kwh()
            ),
            LiveVerdict::Normal => format!("Normal consumption: {:.2} kWh", shown.kwh()),
        };

        LiveRiskResult {
            consumption: shown,
            risk_score,
            verdict,
            reason,
        }
    }
}

/// Score against the default [20, 40] kWh band.
pub fn score(consumption: Reading) -> LiveRiskResult {
    LiveRiskScorer::default().score(consumption)
}
