use error_stack::{Report, bail};

use crate::config::PatternConfig;
use crate::error::PatternError;

/// The three points a double bottom is built from: first trough, the
/// neckline peak between the troughs, second trough.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalPoints {
    pub low1_idx: usize,
    pub low1_price: f64,
    pub peak_idx: usize,
    pub peak_price: f64,
    pub low2_idx: usize,
    pub low2_price: f64,
}

/// Classification of one symbol at one evaluation time. The critical points
/// are reported even when validation fails, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternResult {
    pub is_double_bottom: bool,
    pub score: u8,
    pub points: CriticalPoints,
}

/// Scan an oldest-first close series for a double-bottom (W) pattern.
///
/// Single deterministic pass:
/// 1. Low1: minimum close within the leading `search_window` fraction.
/// 2. Peak: maximum close from Low1 to the end.
/// 3. Low2: minimum close from Peak to the end.
/// 4. Gates: troughs within `trough_tolerance` of each other, neckline at
///    least `min_rebound` above Low1, and the last close above Low2.
///
/// Scans break ties on the lowest index. A failed gate is a legitimate
/// `is_double_bottom = false` outcome; only a series too short at any stage
/// is an error.
pub fn detect(
    closes: &[f64],
    config: &PatternConfig,
) -> Result<PatternResult, Report<PatternError>> {
    let n = closes.len();
    if n < config.min_bars {
        bail!(PatternError::InsufficientData {
            required: config.min_bars,
            available: n,
        });
    }

    // A tiny window on a short series could floor to zero; scan at least
    // the first bar.
    let range = ((config.search_window * n as f64).floor() as usize).max(1);
    let low1_idx = argmin(&closes[..range]);

    let after_low1 = n - low1_idx;
    if after_low1 < config.min_after_low1 {
        bail!(PatternError::InsufficientData {
            required: low1_idx + config.min_after_low1,
            available: n,
        });
    }
    let peak_idx = low1_idx + argmax(&closes[low1_idx..]);

    let after_peak = n - peak_idx;
    if after_peak < config.min_after_peak {
        bail!(PatternError::InsufficientData {
            required: peak_idx + config.min_after_peak,
            available: n,
        });
    }
    let low2_idx = peak_idx + argmin(&closes[peak_idx..]);

    let low1 = closes[low1_idx];
    let peak = closes[peak_idx];
    let low2 = closes[low2_idx];
    let points = CriticalPoints {
        low1_idx,
        low1_price: low1,
        peak_idx,
        peak_price: peak,
        low2_idx,
        low2_price: low2,
    };

    let price_diff_ratio = (low1 - low2).abs() / low1;
    let rebound_ratio = (peak - low1) / low1;
    let current = closes[n - 1];

    let symmetric = price_diff_ratio < config.trough_tolerance;
    let rebounded = rebound_ratio > config.min_rebound;
    let recovering = current > low2;

    if !(symmetric && rebounded && recovering) {
        return Ok(PatternResult {
            is_double_bottom: false,
            score: 0,
            points,
        });
    }

    Ok(PatternResult {
        is_double_bottom: true,
        score: score(price_diff_ratio, rebound_ratio),
        points,
    })
}

/// Symmetry contributes up to 50 points, rebound 100 per unit; rounded
/// half-up and clamped into [0, 100].
fn score(price_diff_ratio: f64, rebound_ratio: f64) -> u8 {
    let raw = (1.0 - price_diff_ratio) * 50.0 + rebound_ratio * 100.0;
    raw.round().clamp(0.0, 100.0) as u8
}

/// Index of the minimum value; first occurrence wins on ties.
fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v < values[best] { i } else { best })
}

/// Index of the maximum value; first occurrence wins on ties.
fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > values[best] { i } else { best })
}
