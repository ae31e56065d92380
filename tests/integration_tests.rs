//! Integration tests for the scoring pipeline.
//!
//! These tests run the pure pipeline end to end: raw wallet history in,
//! feature vectors and wallet scores through, market signal out.

use chrono::{Duration, Utc};
use edge_core::config::Config;
use edge_core::features::compute_features;
use edge_core::scoring::{aggregate_market_signal, compute_wallet_scores, WalletObservation};
use edge_core::types::{ClosedPosition, Direction, FeatureVector, Side};

/// Resolved earnings positions with constant risked stake and symmetric
/// win/loss swings, plus one unrelated market that must not count.
fn earnings_history(wins: usize, losses: usize, stake: f64) -> Vec<ClosedPosition> {
    let mut positions = Vec::with_capacity(wins + losses + 1);
    for i in 0..wins + losses {
        let won = i < wins;
        positions.push(ClosedPosition {
            title: format!("Will company {i} beat Q{} earnings?", i % 4 + 1),
            pnl_usd: if won { stake / 2.0 } else { -stake / 2.0 },
            was_winner: won,
            resolved_at: Some(Utc::now() - Duration::days(30 + i as i64)),
            amount_risked: Some(stake),
        });
    }
    positions.push(ClosedPosition {
        title: "Will BTC close above $100k in March?".to_string(),
        pnl_usd: stake,
        was_winner: true,
        resolved_at: Some(Utc::now() - Duration::days(10)),
        amount_risked: Some(stake),
    });
    positions
}

fn observe(
    address: &str,
    stake: f64,
    side: Side,
    positions: &[ClosedPosition],
    cfg: &Config,
) -> WalletObservation {
    let pattern = cfg.history.title_pattern().unwrap();
    let (features, sample_size) = compute_features(stake, positions, &[], &pattern, cfg);
    WalletObservation {
        address: address.to_string(),
        username: None,
        current_stake_usd: stake,
        side,
        features,
        sample_size,
    }
}

/// Test the full pipeline: two wallets with opposite track records produce
/// a capped, stake-weighted UP signal.
#[test]
fn test_pipeline_from_history_to_signal() {
    let cfg = Config::default();

    // 9/1 record on YES with the larger stake; 2/8 record on NO.
    let strong = observe(
        "0xstrong",
        800.0,
        Side::Yes,
        &earnings_history(9, 1, 100.0),
        &cfg,
    );
    let weak = observe(
        "0xweak",
        200.0,
        Side::No,
        &earnings_history(2, 8, 100.0),
        &cfg,
    );
    // The unrelated BTC market is excluded from the sample.
    assert_eq!(strong.sample_size, 10);
    assert_eq!(weak.sample_size, 10);

    let observations = vec![strong, weak];
    let scores = compute_wallet_scores(&observations, &cfg).unwrap();

    // Shrunk win rates: (10*0.9 + 5*0.5)/15 and (10*0.2 + 5*0.5)/15.
    let strong_score = scores[0].insider_likelihood_score;
    let weak_score = scores[1].insider_likelihood_score;
    assert!(
        (strong_score - 0.7183333333).abs() < 1e-6,
        "got {strong_score}"
    );
    assert!((weak_score - 0.305).abs() < 1e-6, "got {weak_score}");
    assert!(!scores[0].low_sample_flag);

    let signal = aggregate_market_signal(&scores, None, &cfg);
    // Strong wallet's 0.575 contribution is capped at 0.33; the weak NO
    // wallet pulls back 0.061.
    assert!(
        (signal.holder_signal - 0.269).abs() < 1e-6,
        "got {}",
        signal.holder_signal
    );
    assert_eq!(signal.final_score, signal.holder_signal);
    assert_eq!(signal.direction, Direction::Up);
    assert_eq!(signal.wallet_count, 2);
    assert!((signal.total_stake_usd - 1000.0).abs() < 1e-9);
}

/// Test that a wallet with no resolved history scores exactly neutral and
/// is flagged as low-sample.
#[test]
fn test_unknown_wallet_stays_neutral() {
    let cfg = Config::default();
    let fresh = observe("0xfresh", 5_000.0, Side::Yes, &[], &cfg);
    assert_eq!(fresh.sample_size, 0);

    let scores = compute_wallet_scores(&[fresh], &cfg).unwrap();
    assert!((scores[0].insider_likelihood_score - 0.5).abs() < 1e-9);
    assert!(scores[0].low_sample_flag);
    assert!((scores[0].signed_contribution - 2_500.0).abs() < 1e-6);
}

/// Test that the order book direction can move a balanced holder signal
/// over the UP threshold.
#[test]
fn test_price_direction_breaks_balanced_holders() {
    let cfg = Config::default();
    let neutral = |address: &str, side: Side| WalletObservation {
        address: address.to_string(),
        username: None,
        current_stake_usd: 500.0,
        side,
        features: FeatureVector::neutral(0.5),
        sample_size: 20,
    };
    let observations = vec![neutral("0xup", Side::Yes), neutral("0xdown", Side::No)];
    let scores = compute_wallet_scores(&observations, &cfg).unwrap();

    let without_book = aggregate_market_signal(&scores, None, &cfg);
    assert!(without_book.holder_signal.abs() < 1e-9);
    assert_eq!(without_book.direction, Direction::Flat);

    let with_book = aggregate_market_signal(&scores, Some(0.9), &cfg);
    assert!((with_book.final_score - 0.27).abs() < 1e-9);
    assert_eq!(with_book.direction, Direction::Up);
}

/// Test that a live order book feeds the blend through `direction_score`.
#[test]
fn test_order_book_direction_feeds_signal() {
    use edge_core::types::{OrderBook, PriceLevel};
    use rust_decimal::Decimal;

    let cfg = Config::default();
    let book = OrderBook {
        token_id: "yes-token".to_string(),
        bids: vec![PriceLevel {
            price: Decimal::new(58, 2),
            size: Decimal::new(1000, 0),
        }],
        asks: vec![PriceLevel {
            price: Decimal::new(62, 2),
            size: Decimal::new(400, 0),
        }],
    };
    let dir = book.direction_score().unwrap();
    assert!((dir - 0.2).abs() < 1e-9);

    let heavy_yes = WalletObservation {
        address: "0xwhale".to_string(),
        username: None,
        current_stake_usd: 10_000.0,
        side: Side::Yes,
        features: FeatureVector::neutral(0.5),
        sample_size: 30,
    };
    let scores = compute_wallet_scores(&[heavy_yes], &cfg).unwrap();
    let signal = aggregate_market_signal(&scores, Some(dir), &cfg);

    // Sole wallet is capped at 0.33; blend is 0.7*0.33 + 0.3*0.2.
    assert!((signal.final_score - 0.291).abs() < 1e-9);
    assert_eq!(signal.direction, Direction::Up);
}

/// Test that a stricter title pattern narrows the scored sample.
#[test]
fn test_custom_title_pattern_narrows_sample() {
    use regex::Regex;

    let cfg = Config::default();
    let mut positions = earnings_history(3, 2, 50.0);
    positions.push(ClosedPosition {
        title: "TSLA EPS above $3.10?".to_string(),
        pnl_usd: 25.0,
        was_winner: true,
        resolved_at: Some(Utc::now() - Duration::days(3)),
        amount_risked: Some(50.0),
    });
    positions.push(ClosedPosition {
        title: "MSFT EPS beat?".to_string(),
        pnl_usd: -25.0,
        was_winner: false,
        resolved_at: Some(Utc::now() - Duration::days(4)),
        amount_risked: Some(50.0),
    });

    let eps_only = Regex::new(r"(?i)\beps\b").unwrap();
    let (_, sample_size) = compute_features(100.0, &positions, &[], &eps_only, &cfg);
    assert_eq!(sample_size, 2);

    let default_pattern = cfg.history.title_pattern().unwrap();
    let (_, broad_sample) = compute_features(100.0, &positions, &[], &default_pattern, &cfg);
    assert_eq!(broad_sample, 7);
}

/// Test that invalid configurations are rejected before any scoring runs.
#[test]
fn test_invalid_config_is_rejected() {
    let mut inverted = Config::default();
    inverted.scoring.score_floor = 0.8;
    inverted.scoring.score_ceiling = 0.2;
    assert!(inverted.validate().is_err());

    let mut zero_weights = Config::default();
    zero_weights.weights.win_rate = 0.0;
    zero_weights.weights.pnl_per_usd = 0.0;
    zero_weights.weights.timing_edge = 0.0;
    zero_weights.weights.conviction_z = 0.0;
    zero_weights.weights.consistency = 0.0;
    assert!(zero_weights.validate().is_err());

    let fresh = WalletObservation {
        address: "0xaaa".to_string(),
        username: None,
        current_stake_usd: 100.0,
        side: Side::Yes,
        features: FeatureVector::neutral(0.5),
        sample_size: 0,
    };
    assert!(compute_wallet_scores(&[fresh], &zero_weights).is_err());
}

/// Test the serialized signal keeps its reporting contract.
#[test]
fn test_signal_serialization_contract() {
    let cfg = Config::default();
    let whale = WalletObservation {
        address: "0xwhale".to_string(),
        username: Some("whale".to_string()),
        current_stake_usd: 1_000.0,
        side: Side::Yes,
        features: FeatureVector::neutral(0.5),
        sample_size: 12,
    };
    let scores = compute_wallet_scores(&[whale], &cfg).unwrap();
    let signal = aggregate_market_signal(&scores, Some(0.4), &cfg);

    let value = serde_json::to_value(&signal).unwrap();
    assert_eq!(value["direction"], "UP");
    assert!(value["holder_signal"].is_number());
    assert!(value["dir_score"].is_number());
    assert!(value["final_score"].is_number());
    assert_eq!(value["wallet_count"], 1);

    let wallet = serde_json::to_value(&scores[0]).unwrap();
    assert_eq!(wallet["current_side"], "YES");
    assert_eq!(wallet["sample_size"], 12);
    assert_eq!(wallet["low_sample_flag"], false);
}
