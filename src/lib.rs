//! # Meterwatch - Smart-meter ingestion core
//!
//! Acquisition and live scoring for a single electricity meter.
//!
//! ## Key Features
//!
//! - **Reading Source**: Hardware link or simulation, with automatic fallback
//! - **Smoothing**: Trailing mean over the last five raw samples
//! - **Live Scoring**: Constant-time risk against an expected operating band
//! - **Series**: Timestamped consumption series consumed by batch detection
//!
//! ## Quick Start
//!
//! ```rust
//! use meterwatch::{live, ReadingSource, SourceConfig};
//!
//! let config = SourceConfig::simulation().with_seed(42);
//! let mut source = ReadingSource::connect(&config).unwrap();
//!
//! let outcome = source.next_reading();
//! assert!(outcome.is_fresh());
//!
//! let result = live::score(outcome.reading());
//! assert!(result.risk_score <= 80);
//! ```
//!
//! ## Modules
//!
//! - [`source`]: Reading source and fallback handling
//! - [`link`]: Line-oriented sensor links
//! - [`window`]: Smoothing buffer
//! - [`live`]: Live risk scorer
//! - [`series`]: Consumption series

// Modules
pub mod config;
pub mod error;
pub mod link;
pub mod live;
pub mod reading;
pub mod series;
pub mod source;
pub mod window;

// Re-exports for convenient access
pub use config::{OperatingBand, SourceConfig, SourceMode};
pub use error::{LinkError, MeterError, Result, SeriesError};
pub use link::{LineLink, SensorLink};
pub use live::{LiveRiskResult, LiveRiskScorer, LiveVerdict};
pub use reading::{ReadOutcome, Reading};
pub use series::{Series, SeriesBuilder, SeriesPoint, MIN_ANALYSIS_LEN, TIMESTAMP_FORMAT};
pub use source::{ReadingSource, SourceStatus};
pub use window::{SmoothingWindow, DEFAULT_WINDOW_CAPACITY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
