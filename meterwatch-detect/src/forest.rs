// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Univariate isolation forest.
//!
//! Each tree is grown on a random subsample by picking a uniform split
//! threshold between the current minimum and maximum until a point is
//! isolated, every remaining value is equal, or the height limit
//! `ceil(log2(subsample))` is reached. Points that are isolated after few
//! splits are anomalous. The anomaly score is `2^(-E[h(x)] / c(n))`, where
//! `c(n)` is the average path length of an unsuccessful binary search tree
//! lookup: scores near 1 are outliers, scores well below 0.5 are normal.

use crate::config::{ForestConfig, OutlierConfig};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use thiserror::Error;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Reasons a forest cannot be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForestError {
    #[error("Need at least 2 points to fit, got {0}")]
    TooFewPoints(usize),

    #[error("All values are identical, nothing to isolate")]
    Degenerate,

    #[error("Non-finite value at index {0}")]
    NonFinite(usize),
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted isolation forest over one-dimensional data.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    /// Fit a forest on `values`.
    ///
    /// The generator is seeded from `config.seed` on every call, so fitting
    /// the same values twice gives the same forest.
    pub fn fit(values: &[f64], config: &ForestConfig) -> Result<Self, ForestError> {
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForestError::NonFinite(i));
        }
        if values.len() < 2 {
            return Err(ForestError::TooFewPoints(values.len()));
        }
        let first = values[0];
        if values.iter().all(|v| *v == first) {
            return Err(ForestError::Degenerate);
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let subsample = config.max_samples.clamp(2, values.len());
        let height_limit = (subsample as f64).log2().ceil() as usize;

        let trees = (0..config.n_trees.max(1))
            .map(|_| {
                let mut sample: Vec<f64> = index::sample(&mut rng, values.len(), subsample)
                    .iter()
                    .map(|i| values[i])
                    .collect();
                grow(&mut sample, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self { trees, subsample })
    }

    /// Anomaly score in (0, 1] for a single value.
    pub fn score(&self, x: f64) -> f64 {
        let total: f64 = self.trees.iter().map(|t| path_length(t, x, 0)).sum();
        let mean = total / self.trees.len() as f64;
        2f64.powf(-mean / average_path_length(self.subsample))
    }

    /// Scores for every value, in order.
    pub fn score_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| self.score(*v)).collect()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample(&self) -> usize {
        self.subsample
    }
}

fn grow(values: &mut [f64], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });

    if depth >= limit || values.len() <= 1 || min >= max {
        return Node::Leaf { size: values.len() };
    }

    let threshold = rng.gen_range(min..max);
    let split = partition(values, threshold);
    let (left, right) = values.split_at_mut(split);

    Node::Split {
        threshold,
        left: Box::new(grow(left, depth + 1, limit, rng)),
        right: Box::new(grow(right, depth + 1, limit, rng)),
    }
}

/// Move values below `threshold` to the front; returns their count.
fn partition(values: &mut [f64], threshold: f64) -> usize {
    let mut split = 0;
    for i in 0..values.len() {
        if values[i] < threshold {
            values.swap(i, split);
            split += 1;
        }
    }
    split
}

fn path_length(node: &Node, x: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            threshold,
            left,
            right,
        } => {
            if x < *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful search in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile (`q` in [0, 100]) of unsorted values.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Per-point outlier flags.
///
/// A point is flagged when its score is above the `1 - outlier_fraction`
/// quantile of all scores and its value deviates from the median by more
/// than `min_relative_deviation` of the median.
pub fn flag_outliers(values: &[f64], scores: &[f64], config: &OutlierConfig) -> Vec<bool> {
    let (Some(cutoff), Some(median)) = (
        percentile(scores, 100.0 * (1.0 - config.outlier_fraction)),
        percentile(values, 50.0),
    ) else {
        return vec![false; values.len()];
    };
    let min_deviation = config.min_relative_deviation * median.abs();

    values
        .iter()
        .zip(scores)
        .map(|(v, s)| *s > cutoff && (v - median).abs() > min_deviation)
        .collect()
}
