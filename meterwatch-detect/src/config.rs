// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Detection engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Configuration rejected by [`DetectionConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid detection config: {0}")]
pub struct ConfigError(pub String);

/// Master configuration for the hybrid engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Isolation forest settings.
    pub forest: ForestConfig,

    /// Outlier labelling settings.
    pub outliers: OutlierConfig,

    /// Rolling-drop settings.
    pub drop: DropConfig,

    /// Risk tiers and verdict threshold.
    pub fusion: FusionConfig,
}

/// Isolation forest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of isolation trees.
    pub n_trees: usize,

    /// Points drawn (without replacement) to grow each tree.
    pub max_samples: usize,

    /// Seed for the forest generator; the same seed gives the same forest.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

/// How anomaly scores become labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Expected share of outliers; the top scores up to this fraction are candidates.
    pub outlier_fraction: f64,

    /// A candidate is an outlier only if it deviates from the series median
    /// by more than this fraction of the median.
    pub min_relative_deviation: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            outlier_fraction: 0.2,
            min_relative_deviation: 0.25,
        }
    }
}

/// Rolling baseline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DropConfig {
    /// Points averaged into the baseline.
    pub window: usize,

    /// Values closer than this count as equal when finding a trailing plateau.
    pub plateau_tolerance: f64,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            window: 5,
            plateau_tolerance: 1e-9,
        }
    }
}

/// Risk fusion tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Drop percentage above which the moderate tier applies.
    pub moderate_drop_percent: f64,
    /// Risk for the moderate tier.
    pub moderate_risk: u8,
    /// Drop percentage above which the severe tier applies.
    pub severe_drop_percent: f64,
    /// Risk for the severe tier.
    pub severe_risk: u8,
    /// Risk floor when the last point is an outlier.
    pub outlier_risk: u8,
    /// Risk at or above which the verdict is anomalous.
    pub anomalous_threshold: u8,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            moderate_drop_percent: 20.0,
            moderate_risk: 60,
            severe_drop_percent: 40.0,
            severe_risk: 80,
            outlier_risk: 70,
            anomalous_threshold: 70,
        }
    }
}

impl DetectionConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different forest seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.forest.seed = seed;
        self
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config
            .validate()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forest.n_trees == 0 {
            return Err(ConfigError("forest.n_trees must be at least 1".into()));
        }
        if self.forest.max_samples < 2 {
            return Err(ConfigError("forest.max_samples must be at least 2".into()));
        }
        if !(self.outliers.outlier_fraction > 0.0 && self.outliers.outlier_fraction <= 0.5) {
            return Err(ConfigError(
                "outliers.outlier_fraction must lie in (0, 0.5]".into(),
            ));
        }
        if !(self.outliers.min_relative_deviation >= 0.0) {
            return Err(ConfigError(
                "outliers.min_relative_deviation must be non-negative".into(),
            ));
        }
        if self.drop.window == 0 {
            return Err(ConfigError("drop.window must be at least 1".into()));
        }
        if self.fusion.severe_drop_percent < self.fusion.moderate_drop_percent {
            return Err(ConfigError(
                "fusion.severe_drop_percent must not be below moderate_drop_percent".into(),
            ));
        }
        if self.fusion.anomalous_threshold > 100 {
            return Err(ConfigError(
                "fusion.anomalous_threshold must be at most 100".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.forest.n_trees, 100);
        assert_eq!(config.forest.seed, 42);
        assert_eq!(config.outliers.outlier_fraction, 0.2);
        assert_eq!(config.drop.window, 5);
        assert_eq!(config.fusion.anomalous_threshold, 70);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"forest": {"seed": 7}, "outliers": {"outlier_fraction": 0.1}}"#)
                .unwrap();
        assert_eq!(config.forest.seed, 7);
        assert_eq!(config.forest.n_trees, 100);
        assert_eq!(config.outliers.outlier_fraction, 0.1);
        assert_eq!(config.outliers.min_relative_deviation, 0.25);
    }

    #[test]
    fn test_validation() {
        let mut config = DetectionConfig::default();
        config.outliers.outlier_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.drop.window = 0;
        assert!(config.validate().is_err());

        let mut config = DetectionConfig::default();
        config.fusion.severe_drop_percent = 10.0;
        assert!(config.validate().is_err());
    }
}
