// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading source and live scoring configuration.

use crate::error::{MeterError, Result};
use crate::window::DEFAULT_WINDOW_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where readings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Metering board on a line-oriented link.
    Hardware,
    /// Uniform random values, no link.
    Simulation,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Hardware => "hardware",
            SourceMode::Simulation => "simulation",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceMode {
    type Err = MeterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "hardware" | "arduino" => Ok(SourceMode::Hardware),
            "simulation" | "sim" | "simulated" => Ok(SourceMode::Simulation),
            other => Err(MeterError::InvalidConfig(format!(
                "unknown source mode '{}'",
                other
            ))),
        }
    }
}

/// Reading source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Hardware or simulation.
    pub mode: SourceMode,

    /// Link identifier: a device path or `tcp://host:port`.
    pub connection: String,

    /// Line speed of the serial link.
    pub baud: u32,

    /// Raw value corresponding to full scale on the sensor ADC.
    pub full_scale: f64,

    /// Upper bound of the rescaled consumption range (kWh).
    pub range_max: f64,

    /// Number of raw samples in the smoothing window.
    pub window_capacity: usize,

    /// Seed for the simulated source (entropy when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Hardware,
            connection: "/dev/ttyACM0".to_string(),
            baud: 9600,
            full_scale: 1023.0,
            range_max: 50.0,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            seed: None,
        }
    }
}

impl SourceConfig {
    /// Simulation-only configuration.
    pub fn simulation() -> Self {
        Self {
            mode: SourceMode::Simulation,
            ..Default::default()
        }
    }

    /// Hardware configuration on the given link.
    pub fn hardware(connection: &str) -> Self {
        Self {
            mode: SourceMode::Hardware,
            connection: connection.to_string(),
            ..Default::default()
        }
    }

    /// Set the simulation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the smoothing window capacity.
    pub fn with_window_capacity(mut self, capacity: usize) -> Self {
        self.window_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(MeterError::InvalidConfig(
                "window_capacity must be at least 1".to_string(),
            ));
        }
        if !(self.full_scale > 0.0) {
            return Err(MeterError::InvalidConfig(
                "full_scale must be positive".to_string(),
            ));
        }
        if !(self.range_max > 0.0) {
            return Err(MeterError::InvalidConfig(
                "range_max must be positive".to_string(),
            ));
        }
        if self.mode == SourceMode::Hardware && self.connection.trim().is_empty() {
            return Err(MeterError::InvalidConfig(
                "hardware mode needs a connection identifier".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expected consumption band for live scoring (kWh).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatingBand {
    pub min: f64,
    pub max: f64,
}

impl Default for OperatingBand {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 40.0,
        }
    }
}

impl OperatingBand {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, kwh: f64) -> bool {
        kwh >= self.min && kwh <= self.max
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min > 0.0) || !(self.max > self.min) {
            return Err(MeterError::InvalidConfig(format!(
                "operating band [{}, {}] must satisfy 0 < min < max",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();
        assert_eq!(config.mode, SourceMode::Hardware);
        assert_eq!(config.baud, 9600);
        assert_eq!(config.window_capacity, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = SourceConfig::simulation().with_seed(7);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"simulation\""));

        let parsed: SourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.mode, SourceMode::Simulation);
        assert_eq!(parsed.seed, Some(7));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: SourceConfig = serde_json::from_str(r#"{"mode": "simulation"}"#).unwrap();
        assert_eq!(parsed.mode, SourceMode::Simulation);
        assert_eq!(parsed.full_scale, 1023.0);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(SourceConfig::default()
            .with_window_capacity(0)
            .validate()
            .is_err());
        assert!(SourceConfig::hardware("  ").validate().is_err());
        assert!(OperatingBand::new(40.0, 20.0).validate().is_err());
        assert!(OperatingBand::default().validate().is_ok());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("arduino".parse::<SourceMode>().unwrap(), SourceMode::Hardware);
        assert_eq!("SIM".parse::<SourceMode>().unwrap(), SourceMode::Simulation);
        assert!("satellite".parse::<SourceMode>().is_err());
    }

    #[test]
    fn test_band_contains() {
        let band = OperatingBand::default();
        assert!(band.contains(20.0));
        assert!(band.contains(40.0));
        assert!(!band.contains(19.99));
    }
}
