//! Error types for Meterwatch
//!
//! Sensor-level faults never escape a [`ReadingSource`](crate::ReadingSource);
//! these types surface configuration and construction problems only.

use thiserror::Error;

/// Result type alias for Meterwatch operations
pub type Result<T> = std::result::Result<T, MeterError>;

/// Main error type for Meterwatch operations
#[derive(Error, Debug)]
pub enum MeterError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Series construction error
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    /// Sensor link error
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a sensor link
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The link could not be opened
    #[error("Cannot open {identifier}: {reason}")]
    Open { identifier: String, reason: String },

    /// The peer went away
    #[error("Link disconnected: {reason}")]
    Disconnected { reason: String },

    /// Read failure on an open link
    #[error("Read failed: {0}")]
    Io(String),
}

/// Errors building a series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    /// Timestamps must strictly increase
    #[error("Point {index} is not after its predecessor")]
    OutOfOrder { index: usize },

    /// Consumption value is not a finite number
    #[error("Point {index} has a non-finite consumption value")]
    NonFinite { index: usize },
}
