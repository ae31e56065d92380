//! Holder, history and scoring output types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Which outcome a holder is long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// Signed direction: +1 for YES, -1 for NO.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Yes => 1.0,
            Side::No => -1.0,
        }
    }

    /// Outcome index 1 is the affirmative outcome on the holders endpoint.
    pub fn from_outcome_index(index: i64) -> Self {
        if index == 1 {
            Side::Yes
        } else {
            Side::No
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// A current position holder in the target market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holder {
    pub address: String,
    pub username: Option<String>,
    pub outcome_index: i64,
    pub amount_usd: f64,
}

impl Holder {
    pub fn side(&self) -> Side {
        Side::from_outcome_index(self.outcome_index)
    }
}

/// One historical trade by a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: Option<DateTime<Utc>>,
    pub side: Option<String>,
    pub price: f64,
    pub size: f64,
    pub amount_usd: f64,
    pub market_title: Option<String>,
}

/// A resolved position from a wallet's trading history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub title: String,
    pub pnl_usd: f64,
    pub was_winner: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub amount_risked: Option<f64>,
}

impl ClosedPosition {
    /// USD the wallet had at risk. The data API omits or zeroes the risked
    /// amount on some position shapes; |pnl| is the fallback proxy.
    pub fn stake_usd(&self) -> f64 {
        match self.amount_risked {
            Some(risked) if risked != 0.0 => risked.abs(),
            _ => self.pnl_usd.abs(),
        }
    }
}

/// The five behavioral features, each in [0, 1] with 0.5 neutral.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureVector {
    pub win_rate: f64,
    pub pnl_per_usd: f64,
    pub timing_edge: f64,
    pub conviction_z: f64,
    pub consistency: f64,
}

impl FeatureVector {
    /// The vector an empty history produces: the win rate sits at the
    /// configured prior, everything else at the 0.5 midpoint.
    pub fn neutral(prior: f64) -> Self {
        Self {
            win_rate: prior,
            pnl_per_usd: 0.5,
            timing_edge: 0.5,
            conviction_z: 0.5,
            consistency: 0.5,
        }
    }
}

/// Scored output for one wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletScore {
    pub address: String,
    pub username: Option<String>,
    pub current_stake_usd: f64,
    pub current_side: Side,
    pub features: FeatureVector,
    /// Weighted feature blend, clipped to the configured score bounds.
    pub insider_likelihood_score: f64,
    /// USD-scaled directional weight (`score * stake * side`), used for
    /// export and ranking. The market aggregation recomputes contributions
    /// on stake *fractions* and caps those separately.
    pub signed_contribution: f64,
    pub sample_size: usize,
    pub low_sample_flag: bool,
}

/// Final direction call for the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
            Direction::Flat => write!(f, "FLAT"),
        }
    }
}

/// Aggregate market-level signal, computed once per run from the full
/// score set and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSignal {
    /// Capped, stake-weighted sum of signed wallet contributions in [-1, 1].
    pub holder_signal: f64,
    /// Price-implied direction, when an order book mid was available.
    pub dir_score: Option<f64>,
    pub final_score: f64,
    pub direction: Direction,
    pub wallet_count: usize,
    pub total_stake_usd: f64,
}

impl MarketSignal {
    /// The signal an empty scoring batch produces.
    pub fn empty() -> Self {
        Self {
            holder_signal: 0.0,
            dir_score: None,
            final_score: 0.0,
            direction: Direction::Flat,
            wallet_count: 0,
            total_stake_usd: 0.0,
        }
    }
}

/// Provenance snapshot written alongside every run's outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub market_slug: Option<String>,
    pub condition_id: String,
    pub market_title: String,
    pub run_timestamp: DateTime<Utc>,
    pub holders_analyzed: usize,
    pub holders_scored: usize,
    pub holders_low_sample: usize,
    /// The exact configuration the run used, for reproducibility.
    pub config: Config,
}
