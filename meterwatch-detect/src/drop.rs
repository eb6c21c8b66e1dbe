// Meterwatch Detect - Hybrid anomaly engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Rolling-average drop of the last point.

use crate::config::DropConfig;

/// Expected level the last point is compared against.
///
/// This is the mean of up to `window` points ending at the second-to-last
/// point. When the last value sits on a plateau (a trailing run of equal
/// values), the window ends just before that plateau instead, so a sustained
/// step is measured against the level preceding it. A plateau spanning the
/// whole series falls back to the plain window.
///
/// Returns `None` for fewer than two points.
pub fn baseline(values: &[f64], config: &DropConfig) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let run_start = plateau_start(values, config.plateau_tolerance);
    let end = if run_start > 0 { run_start } else { n - 1 };
    let start = end.saturating_sub(config.window.max(1));

    let window = &values[start..end];
    Some(window.iter().sum::<f64>() / window.len() as f64)
}

/// Index where the trailing run of values equal to the last one begins.
fn plateau_start(values: &[f64], tolerance: f64) -> usize {
    let Some(&last) = values.last() else {
        return 0;
    };
    let mut start = values.len() - 1;
    while start > 0 && (values[start - 1] - last).abs() <= tolerance {
        start -= 1;
    }
    start
}

/// Percent drop of the last value relative to [`baseline`].
///
/// Positive when consumption fell. A missing or non-positive baseline
/// yields 0.
pub fn drop_percent(values: &[f64], config: &DropConfig) -> f64 {
    let (Some(base), Some(&last)) = (baseline(values, config), values.last()) else {
        return 0.0;
    };
    if base <= 0.0 {
        return 0.0;
    }
    (base - last) / base * 100.0
}
