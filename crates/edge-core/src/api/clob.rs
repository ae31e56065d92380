//! CLOB client: order book snapshots for outcome tokens.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::types::{OrderBook, PriceLevel};

use super::{build_url, default_http_client, get_with_retry};

/// Client for `clob.polymarket.com`.
pub struct ClobClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ClobClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://clob.polymarket.com";

    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            http_client: default_http_client(),
        }
    }

    /// Snapshot of the book for one outcome token.
    pub async fn order_book(&self, token_id: &str) -> Result<OrderBook> {
        let url = build_url(&self.base_url, "/book", &[("token_id", token_id)])?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let raw: RawOrderBook = response.json().await?;
        Ok(raw.into_order_book(token_id))
    }
}

/// Book payload with string-encoded decimals, as the CLOB serves them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawOrderBook {
    #[serde(alias = "assetId")]
    asset_id: Option<String>,
    bids: Vec<RawLevel>,
    asks: Vec<RawLevel>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawLevel {
    price: String,
    size: String,
}

impl RawOrderBook {
    fn into_order_book(self, requested_token: &str) -> OrderBook {
        OrderBook {
            token_id: self
                .asset_id
                .unwrap_or_else(|| requested_token.to_string()),
            bids: parse_levels(self.bids, "bid"),
            asks: parse_levels(self.asks, "ask"),
        }
    }
}

fn parse_levels(levels: Vec<RawLevel>, side: &str) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|level| {
            match (level.price.parse::<Decimal>(), level.size.parse::<Decimal>()) {
                (Ok(price), Ok(size)) => Some(PriceLevel { price, size }),
                _ => {
                    warn!(
                        side = side,
                        price = %level.price,
                        size = %level.size,
                        "Skipping unparseable book level"
                    );
                    None
                }
            }
        })
        .collect()
}
