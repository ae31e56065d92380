//! Wallet scoring and market-level signal aggregation.
//!
//! Per-wallet scoring is pure and independent across wallets, so the batch
//! path fans out with rayon. Aggregation is the single join point: it needs
//! the total stake across the batch before any contribution can be
//! normalized.

use rayon::prelude::*;

use crate::config::{Config, Weights};
use crate::error::Result;
use crate::stats::clip;
use crate::types::{Direction, FeatureVector, MarketSignal, Side, WalletScore};

/// Scoring input for one wallet: identity, live position and extracted
/// features.
#[derive(Debug, Clone)]
pub struct WalletObservation {
    pub address: String,
    pub username: Option<String>,
    pub current_stake_usd: f64,
    pub side: Side,
    pub features: FeatureVector,
    pub sample_size: usize,
}

/// Weighted blend of the feature vector, clipped to the configured score
/// range. Fails only on an invalid weight configuration, which `validate()`
/// rules out at load time for the binaries.
pub fn score_wallet(features: &FeatureVector, cfg: &Config) -> Result<f64> {
    let weights = cfg.weights.normalized()?;
    Ok(blend(features, &weights, cfg))
}

fn blend(features: &FeatureVector, normalized: &Weights, cfg: &Config) -> f64 {
    let score = normalized.win_rate * features.win_rate
        + normalized.pnl_per_usd * features.pnl_per_usd
        + normalized.timing_edge * features.timing_edge
        + normalized.conviction_z * features.conviction_z
        + normalized.consistency * features.consistency;
    clip(score, cfg.scoring.score_floor, cfg.scoring.score_ceiling)
}

/// Score a batch of wallets in parallel.
///
/// Weights normalize once up front, so a bad weight configuration fails
/// before any wallet is touched. `signed_contribution` here is the
/// USD-scaled ranking value; the aggregation below works on stake fractions
/// instead.
pub fn compute_wallet_scores(
    observations: &[WalletObservation],
    cfg: &Config,
) -> Result<Vec<WalletScore>> {
    let weights = cfg.weights.normalized()?;
    let min_sample = cfg.history.min_sample;

    Ok(observations
        .par_iter()
        .map(|obs| {
            let score = blend(&obs.features, &weights, cfg);
            WalletScore {
                address: obs.address.clone(),
                username: obs.username.clone(),
                current_stake_usd: obs.current_stake_usd,
                current_side: obs.side,
                features: obs.features,
                insider_likelihood_score: score,
                signed_contribution: score * obs.current_stake_usd * obs.side.sign(),
                sample_size: obs.sample_size,
                low_sample_flag: obs.sample_size < min_sample,
            }
        })
        .collect())
}

/// Fold the scored batch into a market signal.
///
/// Each wallet contributes `score x stake_fraction x side`, capped in
/// magnitude at `max_influence_single_wallet` so one whale cannot dominate.
/// `dir_score = None` means the caller had no price input and the blend
/// reduces to the holder signal alone; `Some(0.0)` means a known flat price
/// and still dilutes the holder signal by its blend weight.
pub fn aggregate_market_signal(
    scores: &[WalletScore],
    dir_score: Option<f64>,
    cfg: &Config,
) -> MarketSignal {
    if scores.is_empty() {
        return MarketSignal::empty();
    }

    let total_stake: f64 = scores.iter().map(|s| s.current_stake_usd).sum();
    let cap = cfg.caps.max_influence_single_wallet;

    let holder_signal = if total_stake > 0.0 {
        let sum: f64 = scores
            .iter()
            .map(|s| {
                let fraction = s.current_stake_usd / total_stake;
                let contribution = s.insider_likelihood_score * fraction * s.current_side.sign();
                clip(contribution, -cap, cap)
            })
            .sum();
        clip(sum, -1.0, 1.0)
    } else {
        0.0
    };

    let m = &cfg.market_signal;
    let final_score = match dir_score {
        Some(d) => clip(
            m.holder_weight * holder_signal + m.dir_weight * d,
            -1.0,
            1.0,
        ),
        None => holder_signal,
    };

    let direction = if final_score >= m.up_threshold {
        Direction::Up
    } else if final_score <= m.down_threshold {
        Direction::Down
    } else {
        Direction::Flat
    };

    MarketSignal {
        holder_signal,
        dir_score,
        final_score,
        direction,
        wallet_count: scores.len(),
        total_stake_usd: total_stake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_features(v: f64) -> FeatureVector {
        FeatureVector {
            win_rate: v,
            pnl_per_usd: v,
            timing_edge: v,
            conviction_z: v,
            consistency: v,
        }
    }

    fn wallet_score(address: &str, stake: f64, side: Side, score: f64) -> WalletScore {
        WalletScore {
            address: address.to_string(),
            username: None,
            current_stake_usd: stake,
            current_side: side,
            features: uniform_features(score),
            insider_likelihood_score: score,
            signed_contribution: score * stake * side.sign(),
            sample_size: 10,
            low_sample_flag: false,
        }
    }

    #[test]
    fn test_uniform_features_score_to_the_same_value() {
        let cfg = Config::default();
        let score = score_wallet(&uniform_features(0.6), &cfg).unwrap();
        // Normalized weights sum to 1, so a uniform vector is a fixed point.
        assert!((score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_score_respects_configured_bounds() {
        let mut cfg = Config::default();
        cfg.scoring.score_floor = 0.2;
        cfg.scoring.score_ceiling = 0.8;
        assert_eq!(score_wallet(&uniform_features(1.0), &cfg).unwrap(), 0.8);
        assert_eq!(score_wallet(&uniform_features(0.0), &cfg).unwrap(), 0.2);
    }

    #[test]
    fn test_batch_scoring_sets_flags_and_contributions() {
        let cfg = Config::default();
        let observations = vec![WalletObservation {
            address: "0xwhale".to_string(),
            username: Some("whale".to_string()),
            current_stake_usd: 1000.0,
            side: Side::No,
            features: uniform_features(0.6),
            sample_size: 3,
        }];
        let scores = compute_wallet_scores(&observations, &cfg).unwrap();
        assert_eq!(scores.len(), 1);
        let s = &scores[0];
        assert!(s.low_sample_flag);
        assert!((s.insider_likelihood_score - 0.6).abs() < 1e-12);
        assert!((s.signed_contribution + 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_weights_fail_before_any_wallet_is_scored() {
        let mut cfg = Config::default();
        cfg.weights = Weights {
            win_rate: 0.0,
            pnl_per_usd: 0.0,
            timing_edge: 0.0,
            conviction_z: 0.0,
            consistency: 0.0,
        };
        let observations = vec![WalletObservation {
            address: "0xa".to_string(),
            username: None,
            current_stake_usd: 100.0,
            side: Side::Yes,
            features: uniform_features(0.5),
            sample_size: 10,
        }];
        assert!(compute_wallet_scores(&observations, &cfg).is_err());
        assert!(score_wallet(&uniform_features(0.5), &cfg).is_err());
    }

    #[test]
    fn test_empty_batch_produces_flat_zero_signal() {
        let cfg = Config::default();
        let signal = aggregate_market_signal(&[], Some(0.8), &cfg);
        assert_eq!(signal.holder_signal, 0.0);
        assert_eq!(signal.final_score, 0.0);
        assert_eq!(signal.direction, Direction::Flat);
        assert_eq!(signal.wallet_count, 0);
        assert_eq!(signal.dir_score, None);
    }

    #[test]
    fn test_whale_contribution_is_capped() {
        let cfg = Config::default();
        // $700 at score 0.8 on YES and $300 at 0.2 on NO: the whale's raw
        // 0.8 x 0.7 = 0.56 caps to 0.33, the small holder's -0.06 passes.
        let scores = vec![
            wallet_score("0xwhale", 700.0, Side::Yes, 0.8),
            wallet_score("0xsmall", 300.0, Side::No, 0.2),
        ];
        let signal = aggregate_market_signal(&scores, None, &cfg);
        assert!((signal.holder_signal - 0.27).abs() < 1e-9);
        assert_eq!(signal.wallet_count, 2);
        assert!((signal.total_stake_usd - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_contribution_exceeds_cap_even_at_max_score() {
        let mut cfg = Config::default();
        cfg.caps.max_influence_single_wallet = 0.10;
        let scores = vec![
            wallet_score("0xgiant", 1_000_000.0, Side::Yes, 1.0),
            wallet_score("0xtiny", 1.0, Side::No, 1.0),
        ];
        let signal = aggregate_market_signal(&scores, None, &cfg);
        // The giant saturates at +0.10; the tiny NO side barely registers.
        assert!(signal.holder_signal <= 0.10 + 1e-12);
        assert!(signal.holder_signal > 0.09);
    }

    #[test]
    fn test_price_blend_and_up_call() {
        let cfg = Config::default();
        let scores = vec![
            wallet_score("0xwhale", 700.0, Side::Yes, 0.8),
            wallet_score("0xsmall", 300.0, Side::No, 0.2),
        ];
        let signal = aggregate_market_signal(&scores, Some(0.5), &cfg);
        // 0.7 x 0.27 + 0.3 x 0.5 = 0.339, above the 0.25 threshold.
        assert!((signal.final_score - 0.339).abs() < 1e-9);
        assert_eq!(signal.direction, Direction::Up);
        assert_eq!(signal.dir_score, Some(0.5));
    }

    #[test]
    fn test_absent_price_reduces_to_holder_signal() {
        let cfg = Config::default();
        let scores = vec![
            wallet_score("0xwhale", 700.0, Side::Yes, 0.8),
            wallet_score("0xsmall", 300.0, Side::No, 0.2),
        ];
        // No price input: the holder signal passes through undiluted.
        let without = aggregate_market_signal(&scores, None, &cfg);
        assert!((without.final_score - 0.27).abs() < 1e-9);
        assert_eq!(without.direction, Direction::Up);

        // A known flat price still dilutes by the blend weights.
        let with_flat = aggregate_market_signal(&scores, Some(0.0), &cfg);
        assert!((with_flat.final_score - 0.189).abs() < 1e-9);
        assert_eq!(with_flat.direction, Direction::Flat);
    }

    #[test]
    fn test_direction_boundaries_are_inclusive() {
        let mut cfg = Config::default();
        cfg.caps.max_influence_single_wallet = 1.0;

        let at_up = vec![wallet_score("0xa", 100.0, Side::Yes, 0.25)];
        assert_eq!(
            aggregate_market_signal(&at_up, None, &cfg).direction,
            Direction::Up
        );

        let at_down = vec![wallet_score("0xa", 100.0, Side::No, 0.25)];
        assert_eq!(
            aggregate_market_signal(&at_down, None, &cfg).direction,
            Direction::Down
        );

        let between = vec![wallet_score("0xa", 100.0, Side::Yes, 0.1)];
        assert_eq!(
            aggregate_market_signal(&between, None, &cfg).direction,
            Direction::Flat
        );
    }

    #[test]
    fn test_asymmetric_thresholds_are_honored() {
        let mut cfg = Config::default();
        cfg.caps.max_influence_single_wallet = 1.0;
        cfg.market_signal.up_threshold = 0.5;
        cfg.market_signal.down_threshold = -0.1;

        let yes = vec![wallet_score("0xa", 100.0, Side::Yes, 0.3)];
        assert_eq!(
            aggregate_market_signal(&yes, None, &cfg).direction,
            Direction::Flat
        );

        let no = vec![wallet_score("0xa", 100.0, Side::No, 0.1)];
        assert_eq!(
            aggregate_market_signal(&no, None, &cfg).direction,
            Direction::Down
        );
    }

    #[test]
    fn test_zero_total_stake_yields_zero_signal() {
        let cfg = Config::default();
        let scores = vec![
            wallet_score("0xa", 0.0, Side::Yes, 0.9),
            wallet_score("0xb", 0.0, Side::No, 0.9),
        ];
        let signal = aggregate_market_signal(&scores, None, &cfg);
        assert_eq!(signal.holder_signal, 0.0);
        assert_eq!(signal.direction, Direction::Flat);
        assert_eq!(signal.total_stake_usd, 0.0);
    }
}
