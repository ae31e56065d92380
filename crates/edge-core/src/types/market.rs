//! Market metadata and order book types.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stats::clip;

/// A resolved view of one Polymarket market, normalized from the several
/// shapes the Gamma API returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub condition_id: String,
    pub question: String,
    pub slug: Option<String>,
    /// Scheduled end of trading. Markets that omit it get a far-future
    /// placeholder so lookback math stays defined.
    pub end_date: DateTime<Utc>,
    pub yes_token_id: Option<String>,
    pub no_token_id: Option<String>,
}

/// A single price level in the order book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book snapshot for one outcome token.
///
/// Level ordering is not assumed; best bid/ask are found by scanning, since
/// the book endpoint has been observed returning both orderings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub token_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }

    /// Mid price from best bid/ask. A book missing either side has no mid:
    /// a lone quote is not a price consensus and must not feed the
    /// direction blend.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Price-implied direction in [-1, +1] for the YES outcome: a mid of
    /// 0.5 reads as no lean, 1.0 as fully priced-in UP.
    pub fn direction_score(&self) -> Option<f64> {
        let mid = self.mid_price()?.to_f64()?;
        Some(clip((mid - 0.5) * 2.0, -1.0, 1.0))
    }
}
