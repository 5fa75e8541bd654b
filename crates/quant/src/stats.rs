//! Statistical helpers used by strategy signals and market metrics.
//!
//! All dispersion measures are population (n denominator), matching how the
//! engine reports volatility.

/// Mean of a slice. `None` if empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance. `None` with fewer than two points.
pub fn variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let mean_val = mean(values)?;
    let sum_sq: f64 = values.iter().map(|v| (v - mean_val).powi(2)).sum();
    Some(sum_sq / n as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    variance(values).map(f64::sqrt)
}

/// Population standard deviation, 0 when undefined.
pub fn std_dev_or_zero(values: &[f64]) -> f64 {
    std_dev(values).unwrap_or(0.0)
}

/// Last `n` elements of a series (all of it when shorter).
pub fn trailing(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Simple returns between consecutive points, skipping zero bases.
pub fn returns(prices: &[f64]) -> Vec<f64> {
    if prices.len() < 2 {
        return vec![];
    }

    prices
        .windows(2)
        .filter_map(|w| (w[0] != 0.0).then(|| (w[1] - w[0]) / w[0]))
        .collect()
}

/// Return from `past` to `now`, guarded against a zero base.
#[inline]
pub fn pct_change(past: f64, now: f64) -> f64 {
    (now - past) / (past + 1e-9)
}

/// Z-score of the last element against the whole window.
///
/// `None` when the window has fewer than two points. Returns 0 when the
/// dispersion is below `min_std`.
pub fn zscore_last(window: &[f64], min_std: f64) -> Option<f64> {
    let last = *window.last()?;
    let mu = mean(window)?;
    let sd = std_dev(window)?;
    if sd < min_std {
        return Some(0.0);
    }
    Some((last - mu) / sd)
}
