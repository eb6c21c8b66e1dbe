// Meterwatch Testdata - Scenario synthesizer
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core series synthesis.
//!
//! Each point is taken from the reading source when an open hardware link
//! backs it and the reading is positive; every other point comes from the
//! synthetic model (baseline plus Gaussian noise, with a step drop for the
//! theft scenario).

use crate::error::SynthError;
use crate::scenario::{Scenario, SynthConfig};
use chrono::Duration;
use meterwatch::{Reading, ReadingSource, Series, SeriesBuilder};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::Serialize;
use tracing::{debug, info};

/// A synthesized series together with the scenario that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSeries {
    pub scenario: Scenario,
    pub series: Series,
    /// Points taken from the hardware link rather than the model.
    pub hardware_points: usize,
}

impl GeneratedSeries {
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Synthesize one series for `scenario`.
///
/// Never fails: a source without an open hardware link, a non-positive
/// reading or an unavailable sample all fall back to the synthetic model.
pub fn synthesize<R: Rng + ?Sized>(
    source: &mut ReadingSource,
    scenario: Scenario,
    config: &SynthConfig,
    rng: &mut R,
) -> Series {
    synthesize_counted(source, scenario, config, rng).0
}

fn synthesize_counted<R: Rng + ?Sized>(
    source: &mut ReadingSource,
    scenario: Scenario,
    config: &SynthConfig,
    rng: &mut R,
) -> (Series, usize) {
    let noise = Normal::new(0.0, config.noise_std).ok();
    let spacing = Duration::minutes(config.spacing_minutes);
    let mut builder = SeriesBuilder::new(config.start_time(), spacing).with_capacity(config.length);
    let mut hardware_points = 0;

    for i in 0..config.length {
        let usage = match hardware_sample(source, config) {
            Some(kwh) => {
                hardware_points += 1;
                kwh
            }
            None => model_sample(scenario, i, config, noise.as_ref(), rng),
        };

        builder.push(Reading::new(usage.max(config.floor)).rounded(config.decimals));
    }

    debug!(
        "Synthesized {} points ({} from hardware)",
        builder.len(),
        hardware_points
    );
    (builder.build(), hardware_points)
}

/// Hardware value for one point, if the source can provide a usable one.
fn hardware_sample(source: &mut ReadingSource, config: &SynthConfig) -> Option<f64> {
    if !source.is_hardware() {
        return None;
    }
    // Zero is treated as "no data", even though a dead meter also reads zero.
    source
        .next_reading()
        .value()
        .filter(|r| r.is_positive())
        .map(|r| r.kwh() / config.hardware_divisor)
}

fn model_sample<R: Rng + ?Sized>(
    scenario: Scenario,
    index: usize,
    config: &SynthConfig,
    noise: Option<&Normal<f64>>,
    rng: &mut R,
) -> f64 {
    if scenario.injects_drop() && index > config.drop_after {
        return config.baseline * config.theft_factor;
    }
    let jitter = noise.map(|n| n.sample(rng)).unwrap_or(0.0);
    config.baseline + jitter
}

/// Scenario synthesizer with its own seeded generator.
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthConfig,
    seed: Option<u64>,
}

impl Synthesizer {
    /// Create a synthesizer; the configuration is validated here.
    pub fn new(config: SynthConfig) -> Result<Self, SynthError> {
        config.validate()?;
        Ok(Self { config, seed: None })
    }

    /// Every run uses a generator seeded with `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the number of points.
    pub fn with_length(mut self, length: usize) -> Self {
        self.config.length = length;
        self
    }

    /// Set the first timestamp.
    pub fn with_start(mut self, start: chrono::NaiveDateTime) -> Self {
        self.config.start = Some(start);
        self
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Synthesize a series for `scenario`.
    pub fn generate(&self, source: &mut ReadingSource, scenario: Scenario) -> GeneratedSeries {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let (series, hardware_points) =
            synthesize_counted(source, scenario, &self.config, &mut rng);

        info!(
            "Data generated: {} records | Mode: {}",
            series.len(),
            scenario.as_str().to_uppercase()
        );

        GeneratedSeries {
            scenario,
            series,
            hardware_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use meterwatch::{LineLink, SourceConfig};

    fn start() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn simulated() -> ReadingSource {
        ReadingSource::simulated(&SourceConfig::simulation().with_seed(7))
    }

    fn config() -> SynthConfig {
        SynthConfig::default().with_start(start())
    }

    #[test]
    fn test_normal_series_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let series = synthesize(&mut simulated(), Scenario::Normal, &config(), &mut rng);

        assert_eq!(series.len(), 60);
        assert_eq!(series.duration(), Duration::minutes(15 * 59));
        for v in series.values() {
            assert!(v >= 0.4);
            // 3.0 +- a generous 8 sigma
            assert!((1.4..=4.6).contains(&v), "value {} out of range", v);
            assert_relative_eq!(v, (v * 100.0).round() / 100.0);
        }
    }

    #[test]
    fn test_theft_step_at_index_41() {
        let mut rng = StdRng::seed_from_u64(42);
        let series = synthesize(&mut simulated(), Scenario::Theft, &config(), &mut rng);
        let values = series.values();

        for v in &values[41..] {
            assert_relative_eq!(*v, 0.9);
        }
        assert!(values[40] > 1.5);
    }

    #[test]
    fn test_floor_applied() {
        let config = SynthConfig {
            baseline: 0.1,
            noise_std: 0.0,
            ..config()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let series = synthesize(&mut simulated(), Scenario::Normal, &config, &mut rng);
        assert!(series.values().iter().all(|v| *v == 0.4));
    }

    #[test]
    fn test_seeded_synthesizer_reproducible() {
        let synth = Synthesizer::new(config()).unwrap().with_seed(3);
        let a = synth.generate(&mut simulated(), Scenario::Normal);
        let b = synth.generate(&mut simulated(), Scenario::Normal);
        assert_eq!(a.series, b.series);
        assert_eq!(a.scenario, Scenario::Normal);
        assert_eq!(a.hardware_points, 0);
    }

    #[test]
    fn test_hardware_values_used_when_positive() {
        let (tx, link) = LineLink::channel();
        let mut source = ReadingSource::with_link(Box::new(link), &SourceConfig::default());
        // 1023 -> 50 kWh, window mean 50, divided by 10
        tx.send("1023".to_string()).unwrap();

        let synth = Synthesizer::new(config()).unwrap().with_seed(1).with_length(3);
        let generated = synth.generate(&mut source, Scenario::Theft);

        // The same value is reused as stale for the remaining points
        assert_eq!(generated.hardware_points, 3);
        for v in generated.series.values() {
            assert_relative_eq!(v, 5.0);
        }
    }

    #[test]
    fn test_zero_hardware_reading_falls_back() {
        let (tx, link) = LineLink::channel();
        let mut source = ReadingSource::with_link(Box::new(link), &SourceConfig::default());
        tx.send("0".to_string()).unwrap();

        let synth = Synthesizer::new(config()).unwrap().with_seed(1);
        let generated = synth.generate(&mut source, Scenario::Theft);

        assert_eq!(generated.hardware_points, 0);
        assert_relative_eq!(generated.series.values()[59], 0.9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SynthConfig::default().with_spacing_minutes(-5);
        assert!(Synthesizer::new(config).is_err());
    }
}
