// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Timestamped consumption series.

use crate::error::SeriesError;
use crate::reading::Reading;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Shortest series the batch detector will analyse.
pub const MIN_ANALYSIS_LEN: usize = 5;

/// Timestamp format used in tabular output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub consumption: Reading,
}

/// Ordered consumption series; timestamps strictly increase.
///
/// A series cannot be modified once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Validate and wrap a list of points.
    pub fn from_points(points: Vec<SeriesPoint>) -> Result<Self, SeriesError> {
        for (index, point) in points.iter().enumerate() {
            if !point.consumption.kwh().is_finite() {
                return Err(SeriesError::NonFinite { index });
            }
            if index > 0 && point.timestamp <= points[index - 1].timestamp {
                return Err(SeriesError::OutOfOrder { index });
            }
        }
        Ok(Self { points })
    }

    /// Series of `values` starting at `start`, spaced evenly.
    pub fn from_values(start: NaiveDateTime, spacing: Duration, values: &[f64]) -> Self {
        let mut builder = SeriesBuilder::new(start, spacing);
        for &v in values {
            builder.push(Reading::new(v));
        }
        builder.build()
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Consumption values in chronological order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.consumption.kwh()).collect()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Whether the series is long enough for statistical analysis.
    pub fn is_analysable(&self) -> bool {
        self.points.len() >= MIN_ANALYSIS_LEN
    }

    /// Time between the first and last point.
    pub fn duration(&self) -> Duration {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }
}

/// Builds a series with evenly spaced timestamps.
#[derive(Debug, Clone)]
pub struct SeriesBuilder {
    next_timestamp: NaiveDateTime,
    spacing: Duration,
    points: Vec<SeriesPoint>,
}

impl SeriesBuilder {
    /// `spacing` must be positive; non-positive spacing is bumped to one second.
    pub fn new(start: NaiveDateTime, spacing: Duration) -> Self {
        let spacing = if spacing <= Duration::zero() {
            Duration::seconds(1)
        } else {
            spacing
        };
        Self {
            next_timestamp: start,
            spacing,
            points: Vec::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.points.reserve(capacity);
        self
    }

    /// Append the next reading.
    pub fn push(&mut self, consumption: Reading) {
        self.points.push(SeriesPoint {
            timestamp: self.next_timestamp,
            consumption,
        });
        self.next_timestamp += self.spacing;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn build(self) -> Series {
        Series {
            points: self.points,
        }
    }
}
