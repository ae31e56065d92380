//! Data API client: holders, trade history, and closed positions.
//!
//! Records come back with inconsistent field names and timestamp encodings
//! across endpoint generations. Each record is deserialized individually so
//! one malformed entry never sinks a whole response; skipped records are
//! logged and dropped.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::{ClosedPosition, Holder, Trade};

use super::{build_url, default_http_client, get_with_retry, parse_datetime_str};

/// Client for `data-api.polymarket.com`.
pub struct DataApiClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl DataApiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://data-api.polymarket.com";

    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            http_client: default_http_client(),
        }
    }

    /// Current holders of a market, largest first as the API returns them.
    /// The endpoint groups holders by outcome token; groups are flattened
    /// since each record carries its own outcome index.
    pub async fn holders(&self, condition_id: &str, limit: usize) -> Result<Vec<Holder>> {
        let limit_text = limit.to_string();
        let url = build_url(
            &self.base_url,
            "/holders",
            &[("market", condition_id), ("limit", &limit_text)],
        )?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let value: serde_json::Value = response.json().await?;
        Ok(flatten_holders(value))
    }

    /// Trade history, filterable by market and/or wallet.
    pub async fn trades(
        &self,
        market: Option<&str>,
        user: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Trade>> {
        let limit_text = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![("limit", &limit_text)];
        if let Some(market) = market {
            params.push(("market", market));
        }
        if let Some(user) = user {
            params.push(("user", user));
        }
        let url = build_url(&self.base_url, "/trades", &params)?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let value: serde_json::Value = response.json().await?;
        Ok(list_items(value).into_iter().filter_map(parse_trade).collect())
    }

    /// Resolved positions for a wallet, optionally narrowed by a title
    /// substring the API applies server-side.
    pub async fn closed_positions(
        &self,
        user: &str,
        title_filter: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ClosedPosition>> {
        let limit_text = limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![("user", user), ("limit", &limit_text)];
        if let Some(title) = title_filter {
            params.push(("title", title));
        }
        let url = build_url(&self.base_url, "/closed-positions", &params)?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let value: serde_json::Value = response.json().await?;
        Ok(list_items(value)
            .into_iter()
            .filter_map(parse_closed_position)
            .collect())
    }
}

/// The list endpoints sometimes wrap their payload in a `{"data": [...]}`
/// envelope. Anything that is not a list after unwrapping is dropped with a
/// warning.
fn list_items(value: serde_json::Value) -> Vec<serde_json::Value> {
    let unwrapped = match value {
        serde_json::Value::Object(mut fields) if fields.contains_key("data") => {
            fields.remove("data").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    };
    match unwrapped {
        serde_json::Value::Array(items) => items,
        _ => {
            warn!("Unexpected response shape for a list endpoint");
            Vec::new()
        }
    }
}

/// Accepts both response shapes: a list of `{token, holders: [...]}` groups
/// or a flat list of holder records.
fn flatten_holders(value: serde_json::Value) -> Vec<Holder> {
    let mut holders = Vec::new();
    for group in list_items(value) {
        match group {
            serde_json::Value::Object(mut fields) if fields.contains_key("holders") => {
                if let Some(serde_json::Value::Array(items)) = fields.remove("holders") {
                    holders.extend(items.into_iter().filter_map(parse_holder));
                }
            }
            item => holders.extend(parse_holder(item)),
        }
    }
    holders
}

fn parse_holder(item: serde_json::Value) -> Option<Holder> {
    match serde_json::from_value::<RawHolder>(item) {
        Ok(raw) => {
            let holder = raw.into_holder();
            if holder.is_none() {
                debug!("Skipping holder record without a wallet address");
            }
            holder
        }
        Err(e) => {
            warn!(error = %e, "Skipping unparseable holder record");
            None
        }
    }
}

fn parse_trade(item: serde_json::Value) -> Option<Trade> {
    match serde_json::from_value::<RawTrade>(item) {
        Ok(raw) => Some(raw.into_trade()),
        Err(e) => {
            warn!(error = %e, "Skipping unparseable trade record");
            None
        }
    }
}

fn parse_closed_position(item: serde_json::Value) -> Option<ClosedPosition> {
    match serde_json::from_value::<RawClosedPosition>(item) {
        Ok(raw) => Some(raw.into_closed_position()),
        Err(e) => {
            warn!(error = %e, "Skipping unparseable closed-position record");
            None
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHolder {
    #[serde(alias = "proxyWallet")]
    proxy_wallet: Option<String>,
    user: Option<String>,
    address: Option<String>,
    #[serde(alias = "userAddress")]
    user_address: Option<String>,
    name: Option<String>,
    username: Option<String>,
    pseudonym: Option<String>,
    #[serde(alias = "outcomeIndex")]
    outcome_index: Option<i64>,
    outcome: Option<serde_json::Value>,
    #[serde(alias = "amountUSD")]
    amount_usd: Option<f64>,
    #[serde(alias = "valueUSD")]
    value_usd: Option<f64>,
    amount: Option<f64>,
}

impl RawHolder {
    /// `None` when no field yields a wallet address; a holder without an
    /// address cannot be looked up and is useless downstream.
    fn into_holder(self) -> Option<Holder> {
        let address = self
            .proxy_wallet
            .or(self.user)
            .or(self.address)
            .or(self.user_address)?;
        let outcome_index = self
            .outcome_index
            .or_else(|| coerce_outcome_index(self.outcome.as_ref()))
            .unwrap_or(1);
        Some(Holder {
            address,
            username: self.name.or(self.username).or(self.pseudonym),
            outcome_index,
            amount_usd: self.amount_usd.or(self.value_usd).or(self.amount).unwrap_or(0.0),
        })
    }
}

/// Older holder records carry `outcome` as a number, a numeric string, or
/// the outcome label itself.
fn coerce_outcome_index(outcome: Option<&serde_json::Value>) -> Option<i64> {
    let outcome = outcome?;
    if let Some(n) = outcome.as_i64() {
        return Some(n);
    }
    let text = outcome.as_str()?;
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    match text.to_ascii_lowercase().as_str() {
        "yes" => Some(1),
        "no" => Some(0),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawTrade {
    timestamp: Option<TimestampValue>,
    ts: Option<TimestampValue>,
    time: Option<TimestampValue>,
    side: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    price: Option<f64>,
    #[serde(alias = "fillPrice")]
    fill_price: Option<f64>,
    amount: Option<f64>,
    size: Option<f64>,
    quantity: Option<f64>,
    #[serde(alias = "amountUSD")]
    amount_usd: Option<f64>,
    title: Option<String>,
    #[serde(alias = "marketTitle")]
    market_title: Option<String>,
}

impl RawTrade {
    fn into_trade(self) -> Trade {
        let price = self.price.or(self.fill_price).unwrap_or(0.0);
        let size = self.amount.or(self.size).or(self.quantity).unwrap_or(0.0);
        Trade {
            timestamp: self
                .timestamp
                .or(self.ts)
                .or(self.time)
                .as_ref()
                .and_then(TimestampValue::to_datetime),
            side: self.side.or(self.kind),
            price,
            size,
            amount_usd: self.amount_usd.unwrap_or(size * price),
            market_title: self.title.or(self.market_title),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClosedPosition {
    title: Option<String>,
    #[serde(alias = "marketTitle")]
    market_title: Option<String>,
    question: Option<String>,
    #[serde(alias = "pnlUsd", alias = "pnlUSD")]
    pnl_usd: Option<f64>,
    pnl: Option<f64>,
    #[serde(alias = "wasWinner")]
    was_winner: Option<bool>,
    won: Option<bool>,
    #[serde(alias = "resolvedAt")]
    resolved_at: Option<TimestampValue>,
    #[serde(alias = "closedAt")]
    closed_at: Option<TimestampValue>,
    #[serde(alias = "amountRisked")]
    amount_risked: Option<f64>,
    investment: Option<f64>,
}

impl RawClosedPosition {
    fn into_closed_position(self) -> ClosedPosition {
        let pnl_usd = self.pnl_usd.or(self.pnl).unwrap_or(0.0);
        let resolved_at = self
            .resolved_at
            .or(self.closed_at)
            .as_ref()
            .and_then(TimestampValue::to_datetime);
        ClosedPosition {
            title: self.title.or(self.market_title).or(self.question).unwrap_or_default(),
            pnl_usd,
            was_winner: self.was_winner.or(self.won).unwrap_or(pnl_usd > 0.0),
            resolved_at,
            amount_risked: self.amount_risked.or(self.investment),
        }
    }
}

/// Timestamps arrive as epoch integers, epoch floats, numeric strings, or
/// RFC 3339 strings depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum TimestampValue {
    Unix(i64),
    Float(f64),
    Text(String),
}

impl TimestampValue {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TimestampValue::Unix(raw) => from_unix(*raw),
            TimestampValue::Float(raw) => from_unix(*raw as i64),
            TimestampValue::Text(text) => parse_datetime_str(text)
                .or_else(|| text.parse::<i64>().ok().and_then(from_unix)),
        }
    }
}

/// Epoch values above ~Nov 2286 in seconds are taken as milliseconds.
fn from_unix(raw: i64) -> Option<DateTime<Utc>> {
    if raw > 10_000_000_000 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}
