//! Small numeric helpers over plain `f64` slices.
//!
//! Everything here is pure and allocation-light; the scale of data (a few
//! hundred holders, a few dozen positions each) never justifies a numeric
//! library. Degenerate inputs are part of the contract: empty sequences,
//! all-equal values and zero spreads map to documented neutral outputs
//! instead of errors, because upstream wallet histories are frequently
//! empty or tiny and must still produce a score.

/// Bound `value` to `[lo, hi]`.
///
/// Callers must ensure `lo <= hi`; configuration validation guarantees this
/// for every bound the library passes in, and inverted bounds panic.
pub fn clip(value: f64, lo: f64, hi: f64) -> f64 {
    value.clamp(lo, hi)
}

/// Stake-weighted mean of `values`.
///
/// Zero total weight degrades to the unweighted mean; an empty sequence
/// returns `empty_default` (the caller's prior).
pub fn weighted_mean(values: &[f64], weights: &[f64], empty_default: f64) -> f64 {
    if values.is_empty() {
        return empty_default;
    }
    debug_assert_eq!(values.len(), weights.len());
    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        return values.iter().sum::<f64>() / values.len() as f64;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / total_weight
}

/// Replace tail values with the boundary values at the symmetric
/// `clip_pct` percentiles, preserving input order.
///
/// On the sorted copy the boundaries sit at `floor(n·(1−clip_pct)/2)` and
/// `min(floor(n·(1+clip_pct)/2), n−1)`; those positions keep their own
/// values, which makes the operation idempotent. A single-element slice
/// comes back unchanged.
pub fn winsorize(values: &[f64], clip_pct: f64) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let lower_idx = (n as f64 * (1.0 - clip_pct) / 2.0) as usize;
    let upper_idx = ((n as f64 * (1.0 + clip_pct) / 2.0) as usize).min(n - 1);
    let lo = sorted[lower_idx];
    let hi = sorted[upper_idx];
    values.iter().map(|&v| clip(v, lo, hi)).collect()
}

/// Map `x` into `[0, 1]` against a reference distribution, centered on the
/// reference median and scaled by its IQR.
///
/// Zero IQR falls back to min-max normalization over the reference range;
/// fewer than two distinct reference values yield the neutral midpoint.
/// Monotonic non-decreasing in `x` in every branch.
pub fn robust_scale(x: f64, reference: &[f64]) -> f64 {
    if reference.len() < 2 {
        return 0.5;
    }
    let mut sorted = reference.to_vec();
    sorted.sort_by(f64::total_cmp);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    if min == max {
        return 0.5;
    }
    let med = percentile(&sorted, 0.5);
    let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);
    if iqr > 0.0 {
        clip(0.5 + (x - med) / (2.0 * iqr), 0.0, 1.0)
    } else {
        clip(normalize_unit_interval(x, min, max), 0.0, 1.0)
    }
}

/// Standard score of `x`. A zero (or non-finite) spread returns 0.0 so a
/// constant history reads as "no deviation" rather than an error.
pub fn z_score(x: f64, mean: f64, stddev: f64) -> f64 {
    if stddev <= 0.0 || !stddev.is_finite() {
        return 0.0;
    }
    (x - mean) / stddev
}

/// Linear shrinkage of `raw` toward `prior` with pseudo-count `n0`.
///
/// The identities hold exactly, not just to rounding: no observations
/// returns the prior itself and a zero pseudo-count returns `raw` itself.
pub fn shrink_to_prior(raw: f64, prior: f64, n: usize, n0: usize) -> f64 {
    if n == 0 {
        return prior;
    }
    if n0 == 0 {
        return raw;
    }
    (n as f64 * raw + n0 as f64 * prior) / ((n + n0) as f64)
}

/// Linear map of `x` from `[min, max]` onto `[0, 1]`.
///
/// A collapsed range returns the neutral midpoint. The output is not
/// clipped; callers clip when `x` may fall outside the observed range.
pub fn normalize_unit_interval(x: f64, min: f64, max: f64) -> f64 {
    if min == max {
        return 0.5;
    }
    (x - min) / (max - min)
}

/// Interpolated median. Empty input returns 0.0; callers guard emptiness
/// where a different neutral value is required.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 0.5)
}

/// Arithmetic mean; empty input returns 0.0.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; fewer than two values return 0.0.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Linear-interpolation percentile over an already sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}
