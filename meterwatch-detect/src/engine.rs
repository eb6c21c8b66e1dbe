// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! HybridEngine - fuses the outlier model with the rolling drop rule.

use crate::config::{DetectionConfig, FusionConfig};
use crate::drop::drop_percent;
use crate::forest::{flag_outliers, ForestError, IsolationForest};
use crate::result::{DetectionResult, MlLabel, Reason, Verdict};
use meterwatch::{Series, MIN_ANALYSIS_LEN};
use tracing::debug;

/// Stateless batch evaluator.
///
/// Every call refits the outlier model from scratch with the configured
/// seed; nothing is carried between calls.
#[derive(Debug, Clone, Default)]
pub struct HybridEngine {
    config: DetectionConfig,
}

impl HybridEngine {
    /// Create an engine with the given configuration.
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Evaluate the last point of `series`.
    pub fn evaluate(&self, series: &Series) -> DetectionResult {
        if series.len() < MIN_ANALYSIS_LEN {
            debug!(
                "Series of {} points is below the {}-point minimum",
                series.len(),
                MIN_ANALYSIS_LEN
            );
            return DetectionResult::insufficient(series.len());
        }

        let values = series.values();

        let ml_labels = match self.label(&values) {
            Ok(labels) => labels,
            Err(e) => {
                debug!("Outlier model skipped: {}", e);
                vec![MlLabel::Inlier; values.len()]
            }
        };

        let drop = drop_percent(&values, &self.config.drop);
        let last_label = ml_labels.last().copied().unwrap_or(MlLabel::Inlier);
        let (risk_score, reason) = fuse(drop, last_label, &self.config.fusion);

        let verdict = if risk_score >= self.config.fusion.anomalous_threshold {
            Verdict::Anomalous
        } else {
            Verdict::Normal
        };

        debug!(
            "Evaluated {} points: drop {:.1}%, last {}, risk {} ({})",
            values.len(),
            drop,
            last_label.as_str(),
            risk_score,
            reason
        );

        DetectionResult {
            ml_labels,
            risk_score,
            verdict,
            reason,
            drop_percent: drop,
        }
    }

    fn label(&self, values: &[f64]) -> Result<Vec<MlLabel>, ForestError> {
        let forest = IsolationForest::fit(values, &self.config.forest)?;
        let scores = forest.score_all(values);

        Ok(flag_outliers(values, &scores, &self.config.outliers)
            .into_iter()
            .map(|outlier| {
                if outlier {
                    MlLabel::Outlier
                } else {
                    MlLabel::Inlier
                }
            })
            .collect())
    }
}

/// Risk and reason for the last point. Later rules override earlier ones;
/// the outlier rule only replaces the reason when it raises the score.
fn fuse(drop: f64, last_label: MlLabel, config: &FusionConfig) -> (u8, Reason) {
    let mut risk = 0;
    let mut reason = Reason::NormalUsage;

    if drop > config.moderate_drop_percent {
        risk = config.moderate_risk;
        reason = Reason::ModerateDrop;
    }
    if drop > config.severe_drop_percent {
        risk = config.severe_risk;
        reason = Reason::SevereDrop;
    }
    if last_label.is_outlier() && config.outlier_risk > risk {
        risk = config.outlier_risk;
        reason = Reason::AnomalousPattern;
    }

    (risk, reason)
}

/// Evaluate with the default configuration.
pub fn evaluate(series: &Series) -> DetectionResult {
    HybridEngine::default().evaluate(series)
}
