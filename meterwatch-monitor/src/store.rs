// Meterwatch Monitor - CSV dataset store
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CSV persistence of the current dataset.
//!
//! Files use the detection table layout
//! (`timestamp,consumption,ml_label,risk_score,verdict,reason`). Only the
//! first two columns are read back; detection columns are recomputed.

use chrono::NaiveDateTime;
use meterwatch::{Reading, Series, SeriesError, SeriesPoint, TIMESTAMP_FORMAT};
use meterwatch_detect::{tabulate, DetectionResult, ROW_HEADER};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid series: {0}")]
    Series(#[from] SeriesError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Empty dataset")]
    Empty,
}

/// Dataset file on disk.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write `series`, with detection columns when a result is given.
    pub fn save(&self, series: &Series, result: Option<&DetectionResult>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        match result {
            Some(result) => {
                for row in tabulate(series, result) {
                    writer.serialize(row)?;
                }
            }
            None => {
                writer.write_record(ROW_HEADER)?;
                for point in series.points() {
                    let timestamp = point.timestamp.format(TIMESTAMP_FORMAT).to_string();
                    let consumption = point.consumption.kwh().to_string();
                    writer.write_record([timestamp.as_str(), consumption.as_str(), "", "", "", ""])?;
                }
            }
        }
        writer.flush()?;

        info!("Saved {} points to {}", series.len(), self.path.display());
        Ok(())
    }

    /// Read the stored series back.
    pub fn load(&self) -> Result<Series, StoreError> {
        let mut reader = csv::Reader::from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| StoreError::InvalidFormat(format!("missing '{}' column", name)))
        };
        let ts_col = column("timestamp")?;
        let value_col = column("consumption")?;

        let mut points = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

            let timestamp = NaiveDateTime::parse_from_str(field(ts_col), TIMESTAMP_FORMAT)
                .map_err(|e| StoreError::InvalidFormat(format!("row {}: {}", line + 1, e)))?;
            let consumption: f64 = field(value_col).parse().map_err(|_| {
                StoreError::InvalidFormat(format!("row {}: invalid consumption", line + 1))
            })?;

            points.push(SeriesPoint {
                timestamp,
                consumption: Reading::new(consumption),
            });
        }

        if points.is_empty() {
            return Err(StoreError::Empty);
        }

        debug!("Loaded {} points from {}", points.len(), self.path.display());
        Ok(Series::from_points(points)?)
    }
}
