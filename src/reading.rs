// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Consumption readings and the tri-state poll outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single consumption measurement in kilowatt-hours.
///
/// Values are clamped to a non-negative floor; NaN collapses to zero.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(f64);

impl Reading {
    /// Zero consumption.
    pub const ZERO: Reading = Reading(0.0);

    /// Create a reading, clamping negative and NaN values to zero.
    pub fn new(kwh: f64) -> Self {
        if kwh.is_nan() || kwh < 0.0 {
            Reading(0.0)
        } else {
            Reading(kwh)
        }
    }

    /// Value in kWh.
    pub fn kwh(self) -> f64 {
        self.0
    }

    /// Round to the given number of decimal places.
    pub fn rounded(self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Reading::new((self.0 * factor).round() / factor)
    }

    /// Check for a strictly positive value.
    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

impl From<f64> for Reading {
    fn from(kwh: f64) -> Self {
        Reading::new(kwh)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} kWh", self.0)
    }
}

/// Outcome of polling a reading source once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    /// A new valid sample was consumed; carries the smoothed value.
    Fresh(Reading),
    /// Nothing new was usable; carries the last smoothed value.
    Stale(Reading),
    /// No valid sample has ever been seen.
    Unavailable,
}

impl ReadOutcome {
    /// The carried value, if any.
    pub fn value(&self) -> Option<Reading> {
        match self {
            ReadOutcome::Fresh(r) | ReadOutcome::Stale(r) => Some(*r),
            ReadOutcome::Unavailable => None,
        }
    }

    /// The carried value, or zero when unavailable.
    pub fn reading(&self) -> Reading {
        self.value().unwrap_or(Reading::ZERO)
    }

    /// Whether this poll consumed a new sample.
    pub fn is_fresh(&self) -> bool {
        matches!(self, ReadOutcome::Fresh(_))
    }

    /// Whether the source is running on stale data or nothing at all.
    pub fn is_degraded(&self) -> bool {
        !self.is_fresh()
    }

    /// Short label, used for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadOutcome::Fresh(_) => "fresh",
            ReadOutcome::Stale(_) => "stale",
            ReadOutcome::Unavailable => "unavailable",
        }
    }
}
