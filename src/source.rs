// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading source: hardware-backed or simulated.
//!
//! A [`ReadingSource`] owns its sensor link and its smoothing window for the
//! whole monitoring session. Build one per physical sensor and hand it (or a
//! handle to it) to both the batch and the live call sites.
//!
//! Faults never escape: a link that cannot be opened turns the source into a
//! simulated one for the session, and a failed or empty poll reports
//! [`ReadOutcome::Stale`] or [`ReadOutcome::Unavailable`] instead of an error.

use crate::config::{SourceConfig, SourceMode};
use crate::error::Result;
use crate::link::{LineLink, SensorLink};
use crate::reading::{ReadOutcome, Reading};
use crate::window::SmoothingWindow;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use tracing::{debug, info, warn};

/// How the source is currently producing readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Backed by an open sensor link.
    Hardware,
    /// Simulation was requested.
    Simulated,
    /// Hardware was requested but the link could not be opened.
    FallbackSimulated,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Hardware => "hardware",
            SourceStatus::Simulated => "simulated",
            SourceStatus::FallbackSimulated => "fallback_simulated",
        }
    }
}

enum Backend {
    Simulated,
    Hardware(Box<dyn SensorLink>),
}

/// Producer of smoothed consumption readings.
pub struct ReadingSource {
    backend: Backend,
    window: SmoothingWindow,
    rng: StdRng,
    full_scale: f64,
    range_max: f64,
    fallback_reason: Option<String>,
    link_healthy: bool,
}

impl ReadingSource {
    /// Build the source described by `config`.
    ///
    /// Only an invalid configuration is an error. A hardware link that fails
    /// to open is logged and replaced by simulation for the session.
    pub fn connect(config: &SourceConfig) -> Result<Self> {
        config.validate()?;

        let source = match config.mode {
            SourceMode::Simulation => Self::simulated(config),
            SourceMode::Hardware => match LineLink::open(&config.connection, config.baud) {
                Ok(link) => Self::with_link(Box::new(link), config),
                Err(e) => {
                    warn!("Sensor link unavailable ({}), falling back to simulation", e);
                    let mut source = Self::simulated(config);
                    source.fallback_reason = Some(e.to_string());
                    source
                }
            },
        };

        Ok(source)
    }

    /// Simulated source.
    pub fn simulated(config: &SourceConfig) -> Self {
        Self::build(Backend::Simulated, config)
    }

    /// Hardware source over an already-open link.
    pub fn with_link(link: Box<dyn SensorLink>, config: &SourceConfig) -> Self {
        info!("Reading source attached to {}", link.identifier());
        Self::build(Backend::Hardware(link), config)
    }

    fn build(backend: Backend, config: &SourceConfig) -> Self {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        Self {
            backend,
            window: SmoothingWindow::new(config.window_capacity),
            rng,
            full_scale: config.full_scale,
            range_max: config.range_max,
            fallback_reason: None,
            link_healthy: true,
        }
    }

    /// Poll once. Never blocks on the link.
    pub fn next_reading(&mut self) -> ReadOutcome {
        let raw = match &mut self.backend {
            Backend::Simulated => Some(self.rng.gen_range(0.0..self.range_max)),
            Backend::Hardware(link) => {
                let lines = match link.drain() {
                    Ok(lines) => {
                        if !self.link_healthy {
                            info!("Sensor link {} recovered", link.identifier());
                            self.link_healthy = true;
                        }
                        lines
                    }
                    Err(e) => {
                        if self.link_healthy {
                            warn!("Sensor read failed, reusing last value: {}", e);
                            self.link_healthy = false;
                        }
                        Vec::new()
                    }
                };

                if lines.len() > 1 {
                    debug!("Discarding {} older pending lines", lines.len() - 1);
                }

                lines
                    .iter()
                    .rev()
                    .find_map(|line| parse_raw(line, self.full_scale))
                    .map(|raw| raw / self.full_scale * self.range_max)
            }
        };

        match raw {
            Some(kwh) => {
                self.window.push(Reading::new(kwh));
                self.window
                    .current()
                    .map(ReadOutcome::Fresh)
                    .unwrap_or(ReadOutcome::Unavailable)
            }
            None => match self.window.current() {
                Some(last) => ReadOutcome::Stale(last),
                None => ReadOutcome::Unavailable,
            },
        }
    }

    /// Smoothed value of the window, `None` before the first sample.
    pub fn current(&self) -> Option<Reading> {
        self.window.current()
    }

    /// Whether an open hardware link backs this source.
    pub fn is_hardware(&self) -> bool {
        match &self.backend {
            Backend::Hardware(link) => link.is_open(),
            Backend::Simulated => false,
        }
    }

    pub fn status(&self) -> SourceStatus {
        match (&self.backend, &self.fallback_reason) {
            (Backend::Hardware(_), _) => SourceStatus::Hardware,
            (Backend::Simulated, Some(_)) => SourceStatus::FallbackSimulated,
            (Backend::Simulated, None) => SourceStatus::Simulated,
        }
    }

    /// Why hardware was abandoned, if it was.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn window(&self) -> &SmoothingWindow {
        &self.window
    }

    /// Discard window contents; the link stays open.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Close the link, if any.
    pub fn close(&mut self) {
        if let Backend::Hardware(link) = &mut self.backend {
            link.close();
        }
    }
}

impl fmt::Debug for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingSource")
            .field("status", &self.status())
            .field("window", &self.window)
            .field("fallback_reason", &self.fallback_reason)
            .finish()
    }
}

/// Parse one raw ADC line; anything but a plain in-range integer is rejected.
fn parse_raw(line: &str, full_scale: f64) -> Option<f64> {
    let line = line.trim();
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = line.parse().ok()?;
    let value = value as f64;
    (value <= full_scale).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hardware_source() -> (std::sync::mpsc::Sender<String>, ReadingSource) {
        let (tx, link) = LineLink::channel();
        let source = ReadingSource::with_link(Box::new(link), &SourceConfig::default());
        (tx, source)
    }

    #[test]
    fn test_parse_raw() {
        assert_eq!(parse_raw("512", 1023.0), Some(512.0));
        assert_eq!(parse_raw(" 7 ", 1023.0), Some(7.0));
        assert_eq!(parse_raw("-5", 1023.0), None);
        assert_eq!(parse_raw("12.5", 1023.0), None);
        assert_eq!(parse_raw("abc", 1023.0), None);
        assert_eq!(parse_raw("", 1023.0), None);
        assert_eq!(parse_raw("4096", 1023.0), None);
        assert_eq!(parse_raw("99999999999999999999999", 1023.0), None);
    }

    #[test]
    fn test_unavailable_before_first_sample() {
        let (_tx, mut source) = hardware_source();
        assert_eq!(source.next_reading(), ReadOutcome::Unavailable);
        assert_eq!(source.next_reading().reading(), Reading::ZERO);
        assert_eq!(source.current(), None);
    }

    #[test]
    fn test_fresh_reading_is_rescaled() {
        let (tx, mut source) = hardware_source();
        tx.send("1023".to_string()).unwrap();

        let outcome = source.next_reading();
        assert!(outcome.is_fresh());
        assert_relative_eq!(outcome.reading().kwh(), 50.0);
    }

    #[test]
    fn test_only_newest_valid_line_used() {
        let (tx, mut source) = hardware_source();
        for line in ["100", "200", "garbage", "0", "oops"] {
            tx.send(line.to_string()).unwrap();
        }

        let outcome = source.next_reading();
        assert!(outcome.is_fresh());
        // Newest valid line is "0", only one sample enters the window
        assert_eq!(source.window().len(), 1);
        assert_relative_eq!(outcome.reading().kwh(), 0.0);
    }

    #[test]
    fn test_stale_when_only_garbage_pending() {
        let (tx, mut source) = hardware_source();
        tx.send("511".to_string()).unwrap();
        let first = source.next_reading().reading();

        tx.send("not-a-number".to_string()).unwrap();
        let outcome = source.next_reading();
        assert_eq!(outcome, ReadOutcome::Stale(first));

        // Nothing pending at all
        assert_eq!(source.next_reading(), ReadOutcome::Stale(first));
    }

    #[test]
    fn test_disconnected_link_reuses_last_value() {
        let (tx, mut source) = hardware_source();
        tx.send("1023".to_string()).unwrap();
        source.next_reading();
        drop(tx);

        let outcome = source.next_reading();
        assert!(matches!(outcome, ReadOutcome::Stale(_)));
        assert_relative_eq!(outcome.reading().kwh(), 50.0);
    }

    #[test]
    fn test_hardware_smoothing() {
        let (tx, mut source) = hardware_source();
        let mut last = ReadOutcome::Unavailable;
        for raw in ["0", "1023", "0", "1023", "0", "1023", "0"] {
            tx.send(raw.to_string()).unwrap();
            last = source.next_reading();
        }
        // Window keeps the last five: 0, 50, 0, 50, 0
        assert_eq!(source.window().len(), 5);
        assert_relative_eq!(last.reading().kwh(), 20.0);
    }

    #[test]
    fn test_simulated_range_and_smoothing() {
        let mut source = ReadingSource::simulated(&SourceConfig::simulation().with_seed(42));
        assert!(!source.is_hardware());
        assert_eq!(source.status(), SourceStatus::Simulated);

        for _ in 0..100 {
            let outcome = source.next_reading();
            assert!(outcome.is_fresh());
            let kwh = outcome.reading().kwh();
            assert!((0.0..50.0).contains(&kwh));
        }
        assert_eq!(source.window().len(), 5);
    }

    #[test]
    fn test_simulated_seed_reproducible() {
        let config = SourceConfig::simulation().with_seed(9);
        let mut a = ReadingSource::simulated(&config);
        let mut b = ReadingSource::simulated(&config);
        for _ in 0..10 {
            assert_eq!(a.next_reading(), b.next_reading());
        }
    }

    #[test]
    fn test_connect_falls_back_to_simulation() {
        let config = SourceConfig::hardware("/nonexistent/meterwatch-tty").with_seed(1);
        let mut source = ReadingSource::connect(&config).unwrap();

        assert_eq!(source.status(), SourceStatus::FallbackSimulated);
        assert!(!source.is_hardware());
        assert!(source.fallback_reason().is_some());
        assert!(source.next_reading().is_fresh());
    }

    #[test]
    fn test_connect_rejects_invalid_config() {
        let config = SourceConfig::simulation().with_window_capacity(0);
        assert!(ReadingSource::connect(&config).is_err());
    }

    #[test]
    fn test_reset_discards_window() {
        let (tx, mut source) = hardware_source();
        tx.send("600".to_string()).unwrap();
        source.next_reading();
        assert!(source.current().is_some());

        source.reset();
        assert_eq!(source.current(), None);
        assert_eq!(source.next_reading(), ReadOutcome::Unavailable);
    }

    #[test]
    fn test_close_link() {
        let (_tx, mut source) = hardware_source();
        assert!(source.is_hardware());
        source.close();
        assert!(!source.is_hardware());
        assert_eq!(source.status(), SourceStatus::Hardware);
    }
}
