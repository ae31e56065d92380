use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Full scanner configuration.
///
/// Loaded once at startup, validated immediately, then passed by reference
/// into every computation. Nothing in the library reads configuration from
/// ambient state after this point, so two runs with equal inputs and equal
/// `Config` values produce identical outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub history: HistoryConfig,
    pub weights: Weights,
    pub filters: FilterConfig,
    pub caps: CapsConfig,
    pub scoring: ScoringConfig,
    pub market_signal: MarketSignalConfig,
}

/// Which resolved positions count as history, and how much of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Pattern a position's market title must match to enter the sample.
    pub earnings_title_regex: String,
    /// Lookback window, in ~90-day quarters, for closed positions.
    pub lookback_quarters: u32,
    /// Sample count below which a wallet is flagged low-sample and its
    /// win-rate/pnl features shrink toward the prior.
    pub min_sample: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            earnings_title_regex: r"(?i)(earnings|EPS|quarterly)".to_string(),
            lookback_quarters: 16,
            min_sample: 5,
        }
    }
}

impl HistoryConfig {
    /// Compile the earnings-title pattern. Called once at startup; the
    /// compiled regex is passed down rather than recompiled per wallet.
    pub fn title_pattern(&self) -> Result<Regex> {
        Regex::new(&self.earnings_title_regex).map_err(|e| {
            Error::config(format!(
                "invalid earnings_title_regex {:?}: {e}",
                self.earnings_title_regex
            ))
        })
    }
}

/// Per-feature blend weights. Raw values; `normalized()` rescales them to
/// sum to 1.0 and rejects negative or all-zero configurations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub win_rate: f64,
    pub pnl_per_usd: f64,
    pub timing_edge: f64,
    pub conviction_z: f64,
    pub consistency: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            win_rate: 0.35,
            pnl_per_usd: 0.25,
            timing_edge: 0.20,
            conviction_z: 0.15,
            consistency: 0.05,
        }
    }
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.win_rate + self.pnl_per_usd + self.timing_edge + self.conviction_z + self.consistency
    }

    pub fn normalized(&self) -> Result<Weights> {
        let entries = [
            self.win_rate,
            self.pnl_per_usd,
            self.timing_edge,
            self.conviction_z,
            self.consistency,
        ];
        if entries.iter().any(|w| *w < 0.0) {
            return Err(Error::config("feature weights must be non-negative"));
        }
        let total: f64 = entries.iter().sum();
        if total == 0.0 {
            return Err(Error::config("feature weights must not all be zero"));
        }
        Ok(Weights {
            win_rate: self.win_rate / total,
            pnl_per_usd: self.pnl_per_usd / total,
            timing_edge: self.timing_edge / total,
            conviction_z: self.conviction_z / total,
            consistency: self.consistency / total,
        })
    }
}

/// Holder-level noise filters applied before feature extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Wallets with no live stake and less closed-position volume than this
    /// are skipped.
    pub ignore_low_activity_usd: f64,
    /// Wallets with no live stake and fewer trades than this are skipped.
    pub ignore_total_trades_lt: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ignore_low_activity_usd: 250.0,
            ignore_total_trades_lt: 10,
        }
    }
}

/// Tail clipping and influence caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsConfig {
    /// Winsorization percentile in (0, 1]; 0.95 clips the bottom and top
    /// 2.5% of the ratio distribution.
    pub feature_clip_pct: f64,
    /// Upper bound, in (0, 1], on the magnitude of any single wallet's
    /// signed contribution to the holder signal.
    pub max_influence_single_wallet: f64,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            feature_clip_pct: 0.95,
            max_influence_single_wallet: 0.33,
        }
    }
}

/// Shrinkage prior and final score bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub shrinkage_prior: f64,
    pub score_floor: f64,
    pub score_ceiling: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            shrinkage_prior: 0.50,
            score_floor: 0.0,
            score_ceiling: 1.0,
        }
    }
}

/// Blend weights and decision boundaries for the market-level signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSignalConfig {
    /// Blend a price-implied direction into the final score when an order
    /// book mid price is available.
    pub use_dir_from_price: bool,
    pub dir_weight: f64,
    pub holder_weight: f64,
    /// Final scores at or above this map to UP.
    pub up_threshold: f64,
    /// Final scores at or below this map to DOWN.
    pub down_threshold: f64,
}

impl Default for MarketSignalConfig {
    fn default() -> Self {
        Self {
            use_dir_from_price: true,
            dir_weight: 0.30,
            holder_weight: 0.70,
            up_threshold: 0.25,
            down_threshold: -0.25,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file plus `EDGE_`-prefixed
    /// environment overrides (e.g. `EDGE_SCORING__SHRINKAGE_PRIOR=0.6`),
    /// then validate. Missing sections fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(config::Environment::with_prefix("EDGE").separator("__"));

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that could otherwise fail mid-computation.
    /// Everything past this point treats the configuration as trusted.
    pub fn validate(&self) -> Result<()> {
        self.weights.normalized()?;
        self.history.title_pattern()?;

        let s = &self.scoring;
        if !(0.0..=1.0).contains(&s.shrinkage_prior) {
            return Err(Error::config(format!(
                "shrinkage_prior must be in [0, 1], got {}",
                s.shrinkage_prior
            )));
        }
        if s.score_floor > s.score_ceiling {
            return Err(Error::config(format!(
                "score_floor {} exceeds score_ceiling {}",
                s.score_floor, s.score_ceiling
            )));
        }

        let c = &self.caps;
        if !(c.feature_clip_pct > 0.0 && c.feature_clip_pct <= 1.0) {
            return Err(Error::config(format!(
                "feature_clip_pct must be in (0, 1], got {}",
                c.feature_clip_pct
            )));
        }
        if !(c.max_influence_single_wallet > 0.0 && c.max_influence_single_wallet <= 1.0) {
            return Err(Error::config(format!(
                "max_influence_single_wallet must be in (0, 1], got {}",
                c.max_influence_single_wallet
            )));
        }

        let m = &self.market_signal;
        if m.dir_weight < 0.0 || m.holder_weight < 0.0 {
            return Err(Error::config(
                "dir_weight and holder_weight must be non-negative",
            ));
        }
        if m.down_threshold > m.up_threshold {
            return Err(Error::config(format!(
                "down_threshold {} exceeds up_threshold {}",
                m.down_threshold, m.up_threshold
            )));
        }

        if self.filters.ignore_low_activity_usd < 0.0 {
            return Err(Error::config("ignore_low_activity_usd must be non-negative"));
        }

        Ok(())
    }
}
