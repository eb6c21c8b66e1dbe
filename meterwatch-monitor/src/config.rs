// Meterwatch Monitor - Configuration
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration, loaded from a JSON file and overridden by flags.

use crate::error::MonitorError;
use meterwatch::{OperatingBand, SourceConfig};
use meterwatch_detect::DetectionConfig;
use meterwatch_testdata::SynthConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything the monitor needs to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub band: OperatingBand,
    pub detection: DetectionConfig,
    pub synth: SynthConfig,

    /// Delay between live polls (milliseconds).
    pub poll_interval_ms: u64,

    /// Number of live snapshots kept in memory.
    pub history_len: usize,

    /// Dataset file written by `/generate` and read by `/detect/batch`.
    pub data_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            band: OperatingBand::default(),
            detection: DetectionConfig::default(),
            synth: SynthConfig::default(),
            poll_interval_ms: 100,
            history_len: 120,
            data_path: PathBuf::from("data/meter_data.csv"),
        }
    }
}

impl MonitorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| MonitorError::Config(e.to_string()))
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.source.validate()?;
        self.band.validate()?;
        self.detection
            .validate()
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        self.synth.validate()?;

        if self.poll_interval_ms == 0 {
            return Err(MonitorError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.history_len == 0 {
            return Err(MonitorError::Config(
                "history_len must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterwatch::SourceMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.source.mode, SourceMode::Hardware);
        assert_eq!(config.band, OperatingBand::new(20.0, 40.0));
        assert_eq!(config.data_path, PathBuf::from("data/meter_data.csv"));
    }

    #[test]
    fn test_partial_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"source": {{"mode": "simulation", "seed": 3}}, "poll_interval_ms": 250,
                "detection": {{"fusion": {{"anomalous_threshold": 60}}}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = MonitorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.source.mode, SourceMode::Simulation);
        assert_eq!(config.source.seed, Some(3));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.detection.fusion.anomalous_threshold, 60);
        assert_eq!(config.history_len, 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let config = MonitorConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        let mut config = MonitorConfig::default();
        config.band = OperatingBand::new(40.0, 20.0);
        assert!(matches!(config.validate(), Err(MonitorError::Meter(_))));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        file.flush().unwrap();
        assert!(matches!(
            MonitorConfig::from_json_file(file.path()),
            Err(MonitorError::Config(_))
        ));
    }
}
