// Meterwatch Monitor - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use crate::store::StoreError;
use meterwatch::MeterError;
use meterwatch_testdata::SynthError;
use thiserror::Error;

/// Errors surfaced by the monitor binary.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Meter(#[from] MeterError),

    #[error("Dataset store: {0}")]
    Store(#[from] StoreError),

    #[error("Synthesis: {0}")]
    Synth(#[from] SynthError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
