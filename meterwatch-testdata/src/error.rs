// Meterwatch Testdata - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use thiserror::Error;

/// Errors raised while configuring the synthesizer.
///
/// Synthesis itself never fails: source faults fall back to the synthetic model.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Unknown scenario '{0}' (expected 'normal' or 'theft')")]
    UnknownScenario(String),

    #[error("Invalid synth config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
