//! Per-wallet behavioral feature extraction.
//!
//! All five features land in [0, 1] with 0.5 as the no-signal midpoint.
//! Degenerate histories (no positions, no risked capital, constant stakes)
//! produce neutral values rather than errors; thin histories shrink toward
//! the configured prior instead of being excluded.

use regex::Regex;

use crate::config::Config;
use crate::stats::{
    median, normalize_unit_interval, robust_scale, shrink_to_prior, stddev, weighted_mean,
    winsorize, z_score,
};
use crate::types::{ClosedPosition, FeatureVector, Trade};

/// Compute the feature vector for one wallet.
///
/// Only closed positions whose title matches `earnings_pattern` enter the
/// sample; the returned count is the size of that matched sample and feeds
/// the low-sample flag downstream. Deterministic for fixed inputs.
pub fn compute_features(
    current_stake_usd: f64,
    positions: &[ClosedPosition],
    trades: &[Trade],
    earnings_pattern: &Regex,
    cfg: &Config,
) -> (FeatureVector, usize) {
    let matched: Vec<&ClosedPosition> = positions
        .iter()
        .filter(|p| earnings_pattern.is_match(&p.title))
        .collect();
    let sample_size = matched.len();

    let features = FeatureVector {
        win_rate: win_rate(&matched, cfg),
        pnl_per_usd: pnl_per_usd(&matched, cfg),
        timing_edge: timing_edge(trades),
        conviction_z: conviction_z(current_stake_usd, &matched),
        consistency: consistency(&matched),
    };
    (features, sample_size)
}

/// Stake-weighted share of winning positions, shrunk toward the prior with
/// `min_sample` pseudo-observations. An empty sample is exactly the prior.
fn win_rate(positions: &[&ClosedPosition], cfg: &Config) -> f64 {
    let prior = cfg.scoring.shrinkage_prior;
    let indicators: Vec<f64> = positions
        .iter()
        .map(|p| if p.was_winner { 1.0 } else { 0.0 })
        .collect();
    let stakes: Vec<f64> = positions.iter().map(|p| p.stake_usd()).collect();
    let raw = weighted_mean(&indicators, &stakes, prior);
    shrink_to_prior(raw, prior, positions.len(), cfg.history.min_sample)
}

/// Median return per dollar risked, winsorized and scaled against the
/// wallet's own ratio distribution.
///
/// Because the reference distribution is the wallet's own, the scaled
/// median sits at 0.5 whenever the ratio IQR is positive; the feature
/// leaves neutral only through the zero-IQR min-max fallback. Positions
/// with no capital at risk are excluded from the ratio sample.
fn pnl_per_usd(positions: &[&ClosedPosition], cfg: &Config) -> f64 {
    let ratios: Vec<f64> = positions
        .iter()
        .filter_map(|p| {
            let risked = p.stake_usd();
            (risked > 0.0).then(|| p.pnl_usd / risked)
        })
        .collect();
    if ratios.is_empty() {
        return 0.5;
    }

    let winsorized = winsorize(&ratios, cfg.caps.feature_clip_pct);
    let scaled = robust_scale(median(&winsorized), &winsorized);
    if ratios.len() < cfg.history.min_sample {
        shrink_to_prior(scaled, 0.5, ratios.len(), cfg.history.min_sample)
    } else {
        scaled
    }
}

/// Share of trade-weighted size landing 24h-to-1h before resolution versus
/// the wallet's own baseline for that window. The trades feed carries no
/// per-market resolution join yet, so this stays pinned at the neutral
/// midpoint until that join exists.
fn timing_edge(_trades: &[Trade]) -> f64 {
    0.5
}

/// How unusual the current stake is against the wallet's historical stake
/// distribution: z-score against the historical median and spread, then a
/// saturating map of [-3, +3] onto [0, 1].
fn conviction_z(current_stake_usd: f64, positions: &[&ClosedPosition]) -> f64 {
    let stakes: Vec<f64> = positions
        .iter()
        .map(|p| p.stake_usd())
        .filter(|s| *s > 0.0)
        .collect();
    if stakes.is_empty() {
        return 0.5;
    }
    let z = z_score(current_stake_usd, median(&stakes), stddev(&stakes));
    normalize_unit_interval(z, -3.0, 3.0).clamp(0.0, 1.0)
}

/// Directional alignment with the wallet's historical modal side on the
/// same ticker. Position records carry no ticker/side breakdown, so there
/// is no alignment history to compare against; neutral midpoint.
fn consistency(_positions: &[&ClosedPosition]) -> f64 {
    0.5
}
