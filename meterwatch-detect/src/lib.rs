// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Meterwatch Detect
//!
//! Batch anomaly detection over a consumption series.
//!
//! Two detectors look at the same series and are fused on the last point:
//! - **Outlier model**: a seeded univariate isolation forest labels every
//!   point inlier or outlier
//! - **Rolling drop**: percent drop of the last value against the trailing
//!   five-point average
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{Duration, NaiveDate};
//! use meterwatch::Series;
//! use meterwatch_detect::{HybridEngine, Verdict};
//!
//! let start = NaiveDate::from_ymd_opt(2024, 2, 1)
//!     .unwrap()
//!     .and_hms_opt(0, 0, 0)
//!     .unwrap();
//! let mut values = vec![3.0; 41];
//! values.extend([0.9; 19]);
//! let series = Series::from_values(start, Duration::minutes(15), &values);
//!
//! let result = HybridEngine::default().evaluate(&series);
//! assert_eq!(result.risk_score, 80);
//! assert_eq!(result.verdict, Verdict::Anomalous);
//! ```
//!
//! ## Fusion
//!
//! | Rule | Risk | Reason |
//! |------|------|--------|
//! | default | 0 | Normal usage |
//! | drop > 20% | 60 | Moderate drop in consumption |
//! | drop > 40% | 80 | Sudden significant drop detected |
//! | last point outlier | max(risk, 70) | Anomalous consumption pattern |
//!
//! The verdict is anomalous at a risk of 70 or more. Series shorter than
//! five points produce the insufficient-data sentinel.

pub mod config;
pub mod drop;
pub mod engine;
pub mod forest;
pub mod result;

// Re-exports
pub use config::{ConfigError, DetectionConfig, DropConfig, ForestConfig, FusionConfig, OutlierConfig};
pub use engine::{evaluate, HybridEngine};
pub use forest::{ForestError, IsolationForest};
pub use result::{tabulate, DetectionResult, DetectionRow, MlLabel, Reason, Verdict, ROW_HEADER};
