// Meterwatch Testdata - Consumption scenario synthesizer
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Meterwatch Testdata
//!
//! Synthetic consumption series for exercising the anomaly engine.
//!
//! Two scenarios are provided:
//!
//! - **Normal**: baseline 3.0 kWh with Gaussian noise (σ = 0.2)
//! - **Theft**: the same, then a sustained step drop to 30% of baseline
//!   from index 41 onwards
//!
//! When the reading source is backed by an open hardware link, positive
//! hardware readings (divided by 10) take the place of the model.
//!
//! ## Quick Start
//!
//! ```rust
//! use meterwatch::{ReadingSource, SourceConfig};
//! use meterwatch_testdata::{Scenario, SynthConfig, Synthesizer};
//!
//! let mut source = ReadingSource::simulated(&SourceConfig::simulation());
//! let synth = Synthesizer::new(SynthConfig::default()).unwrap().with_seed(42);
//!
//! let generated = synth.generate(&mut source, Scenario::Theft);
//! assert_eq!(generated.len(), 60);
//! ```

pub mod error;
pub mod generator;
pub mod scenario;

// Re-exports for convenience
pub use error::SynthError;
pub use generator::{synthesize, GeneratedSeries, Synthesizer};
pub use scenario::{Scenario, SynthConfig};
