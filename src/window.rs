// Meterwatch - Smart-meter ingestion core
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded moving-average window over raw readings.

use crate::reading::Reading;
use std::collections::VecDeque;

/// Default number of raw samples averaged.
pub const DEFAULT_WINDOW_CAPACITY: usize = 5;

/// Bounded FIFO of raw readings exposing their mean.
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SmoothingWindow {
    /// Create a window holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a sample, evicting the oldest on overflow.
    pub fn push(&mut self, reading: Reading) {
        self.samples.push_back(reading.kwh());
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Mean of the current contents, `None` before the first sample.
    pub fn current(&self) -> Option<Reading> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().sum();
        Some(Reading::new(sum / self.samples.len() as f64))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Raw samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Reading> + '_ {
        self.samples.iter().map(|&v| Reading::new(v))
    }

    /// Discard all samples.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SmoothingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}
