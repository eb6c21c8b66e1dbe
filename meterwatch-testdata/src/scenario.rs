// Meterwatch Testdata - Consumption scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Consumption scenarios and their synthesis parameters.

use crate::error::SynthError;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Consumption scenario to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Baseline usage with Gaussian noise.
    Normal,
    /// Baseline usage followed by a sustained step drop.
    Theft,
}

impl Scenario {
    /// All scenarios.
    pub const ALL: [Scenario; 2] = [Scenario::Normal, Scenario::Theft];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Theft => "theft",
        }
    }

    /// Whether the step drop is injected.
    pub fn injects_drop(&self) -> bool {
        matches!(self, Scenario::Theft)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(Scenario::Normal),
            "theft" => Ok(Scenario::Theft),
            other => Err(SynthError::UnknownScenario(other.to_string())),
        }
    }
}

/// Synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Number of points.
    pub length: usize,
    /// Minutes between consecutive points.
    pub spacing_minutes: i64,
    /// Synthetic baseline consumption (kWh).
    pub baseline: f64,
    /// Standard deviation of the Gaussian noise.
    pub noise_std: f64,
    /// Fraction of the baseline kept during the theft drop.
    pub theft_factor: f64,
    /// The drop covers every index strictly greater than this.
    pub drop_after: usize,
    /// Hardware readings are divided by this to match the synthetic range.
    pub hardware_divisor: f64,
    /// Lowest value a point may take.
    pub floor: f64,
    /// Decimal places kept.
    pub decimals: i32,
    /// Timestamp of the first point; the current local time when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            length: 60,
            spacing_minutes: 15,
            baseline: 3.0,
            noise_std: 0.2,
            theft_factor: 0.3,
            drop_after: 40,
            hardware_divisor: 10.0,
            floor: 0.4,
            decimals: 2,
            start: None,
        }
    }
}

impl SynthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of points.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Set the spacing in minutes.
    pub fn with_spacing_minutes(mut self, minutes: i64) -> Self {
        self.spacing_minutes = minutes;
        self
    }

    /// Set the first timestamp.
    pub fn with_start(mut self, start: NaiveDateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// First timestamp, truncated to whole seconds.
    pub fn start_time(&self) -> NaiveDateTime {
        let start = self.start.unwrap_or_else(|| Local::now().naive_local());
        start.with_nanosecond(0).unwrap_or(start)
    }

    /// Index of the first dropped point.
    pub fn drop_start(&self) -> usize {
        self.drop_after + 1
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        if self.spacing_minutes <= 0 {
            return Err(SynthError::InvalidConfig(
                "spacing_minutes must be positive".to_string(),
            ));
        }
        if !(self.noise_std >= 0.0) {
            return Err(SynthError::InvalidConfig(
                "noise_std must be non-negative".to_string(),
            ));
        }
        if !(self.hardware_divisor > 0.0) {
            return Err(SynthError::InvalidConfig(
                "hardware_divisor must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.theft_factor) {
            return Err(SynthError::InvalidConfig(
                "theft_factor must lie in [0, 1]".to_string(),
            ));
        }
        if !self.baseline.is_finite() || !self.floor.is_finite() {
            return Err(SynthError::InvalidConfig(
                "baseline and floor must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SynthError> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
