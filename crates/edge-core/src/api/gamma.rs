//! Gamma API client: market metadata and public search.
//!
//! Gamma serves the same market under several shapes depending on the
//! endpoint and the market's age, so parsing works through prioritized
//! field fallbacks rather than a single canonical schema.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::types::Market;

use super::{build_url, default_http_client, get_with_retry, parse_datetime_str};

/// Client for `gamma-api.polymarket.com`.
pub struct GammaClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl GammaClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://gamma-api.polymarket.com";

    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string()),
            http_client: default_http_client(),
        }
    }

    /// Fetch a market by its URL slug.
    pub async fn market_by_slug(&self, slug: &str) -> Result<Market> {
        let url = build_url(&self.base_url, &format!("/markets/slug/{slug}"), &[])?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let raw: GammaMarket = response.json().await?;
        raw.into_market()
    }

    /// Fetch a market by condition id. The endpoint answers with a list for
    /// some ids and a bare object for others.
    pub async fn market_by_condition_id(&self, condition_id: &str) -> Result<Market> {
        let url = build_url(&self.base_url, "/markets", &[("condition_id", condition_id)])?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let value: serde_json::Value = response.json().await?;

        let raw: GammaMarket = match value {
            serde_json::Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(Error::InvalidMarket(format!(
                        "no market with condition id {condition_id}"
                    )));
                }
                serde_json::from_value(items.remove(0))?
            }
            other => serde_json::from_value(other)?,
        };
        raw.into_market()
    }

    /// Full-text market search; feeds the earnings-label lookup.
    pub async fn public_search(&self, query: &str) -> Result<Vec<SearchMarket>> {
        let url = build_url(&self.base_url, "/public-search", &[("q", query)])?;
        let response = get_with_retry(&self.http_client, &url).await?;
        let results: SearchResponse = response.json().await?;
        Ok(results.markets)
    }

    /// Fetch the raw market detail payload for one slug, keeping the
    /// resolution-related fields the typed [`Market`] drops.
    pub async fn market_details_by_slug(&self, slug: &str) -> Result<MarketDetails> {
        let url = build_url(&self.base_url, &format!("/markets/slug/{slug}"), &[])?;
        let response = get_with_retry(&self.http_client, &url).await?;
        Ok(response.json().await?)
    }

    /// Resolve user input — a pasted polymarket.com URL, a bare slug, or a
    /// condition id — into a market, trying each interpretation in order.
    pub async fn resolve_market(&self, input: &str) -> Result<Market> {
        if input.contains("polymarket.com") || input.starts_with("http") {
            if let Some(slug) = extract_slug(input) {
                debug!(slug = %slug, "Resolving market from URL slug");
                match self.market_by_slug(&slug).await {
                    Ok(market) => return Ok(market),
                    Err(e) => warn!(slug = %slug, error = %e, "Slug from URL did not resolve"),
                }
            }
        }

        match self.market_by_slug(input).await {
            Ok(market) => return Ok(market),
            Err(e) => debug!(input = %input, error = %e, "Input did not resolve as a slug"),
        }

        match self.market_by_condition_id(input).await {
            Ok(market) => Ok(market),
            Err(e) => {
                warn!(input = %input, error = %e, "Condition id lookup failed");
                Err(Error::InvalidMarket(format!(
                    "could not resolve a market from {input:?}"
                )))
            }
        }
    }
}

/// Pull the slug out of a pasted market or event URL
/// (`polymarket.com/event/<slug>` or `/market/<slug>`).
fn extract_slug(input: &str) -> Option<String> {
    let normalized = if input.starts_with("http") {
        input.to_string()
    } else {
        format!("https://{input}")
    };
    let url = Url::parse(&normalized).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let idx = segments
        .iter()
        .position(|s| *s == "event" || *s == "market")?;
    segments.get(idx + 1).map(|s| s.to_string())
}

/// Raw market payload; every field optional so one odd market never fails
/// a whole response.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GammaMarket {
    #[serde(alias = "conditionId")]
    condition_id: Option<String>,
    id: Option<String>,
    question: Option<String>,
    title: Option<String>,
    description: Option<String>,
    slug: Option<String>,
    #[serde(alias = "endDate")]
    end_date: Option<String>,
    #[serde(alias = "endTime")]
    end_time: Option<String>,
    tokens: Option<Vec<GammaToken>>,
    #[serde(alias = "clobTokenIds")]
    clob_token_ids: Option<serde_json::Value>,
    #[serde(alias = "yesTokenId")]
    yes_token_id: Option<String>,
    #[serde(alias = "noTokenId")]
    no_token_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GammaToken {
    #[serde(alias = "tokenId")]
    token_id: Option<String>,
    outcome: Option<String>,
}

impl GammaMarket {
    fn into_market(self) -> Result<Market> {
        let condition_id = self
            .condition_id
            .or(self.id)
            .ok_or_else(|| Error::InvalidMarket("market payload has no condition id".into()))?;

        let question = self
            .question
            .or(self.title)
            .or(self.description)
            .unwrap_or_else(|| "Unknown market".to_string());

        let end_date = match self
            .end_date
            .or(self.end_time)
            .as_deref()
            .and_then(parse_datetime_str)
        {
            Some(dt) => dt,
            None => {
                warn!(
                    condition_id = %condition_id,
                    "Market has no parseable end date, using far-future placeholder"
                );
                far_future()
            }
        };

        // The `tokens` array arrives (NO, YES) ordered; `clobTokenIds`
        // arrives (YES, NO), sometimes as a JSON-encoded string.
        let mut yes_token_id = None;
        let mut no_token_id = None;
        if let Some(tokens) = &self.tokens {
            yes_token_id = tokens.get(1).and_then(|t| t.token_id.clone());
            no_token_id = tokens.first().and_then(|t| t.token_id.clone());
        }
        if yes_token_id.is_none() {
            if let Some(ids) = clob_token_ids(self.clob_token_ids.as_ref()) {
                yes_token_id = ids.first().cloned();
                no_token_id = no_token_id.or_else(|| ids.get(1).cloned());
            }
        }
        let yes_token_id = yes_token_id.or(self.yes_token_id);
        let no_token_id = no_token_id.or(self.no_token_id);

        Ok(Market {
            condition_id,
            question,
            slug: self.slug,
            end_date,
            yes_token_id,
            no_token_id,
        })
    }
}

/// `clobTokenIds` is either a real array or a JSON array serialized into a
/// string.
pub(crate) fn clob_token_ids(value: Option<&serde_json::Value>) -> Option<Vec<String>> {
    match value? {
        serde_json::Value::String(s) => serde_json::from_str(s).ok(),
        serde_json::Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    }
}

fn far_future() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2099, 12, 31, 0, 0, 0)
        .single()
        .expect("valid placeholder date")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    markets: Vec<SearchMarket>,
}

/// One hit from `/public-search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchMarket {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub title: Option<String>,
    pub question: Option<String>,
}

impl SearchMarket {
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref().or(self.question.as_deref())
    }
}

/// Market detail payload with the resolution fields preserved. `outcome`
/// and `resolution` are polymorphic across market generations, so they stay
/// raw JSON for the caller's extraction chain.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketDetails {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub question: Option<String>,
    pub title: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(alias = "clobTokenIds")]
    pub clob_token_ids: Option<serde_json::Value>,
    pub resolved: Option<bool>,
    #[serde(alias = "isResolved")]
    pub is_resolved: Option<bool>,
    pub outcome: Option<serde_json::Value>,
    #[serde(alias = "resolutionText")]
    pub resolution_text: Option<String>,
    pub resolution: Option<serde_json::Value>,
    pub event: Option<EventDetails>,
    #[serde(alias = "sourceUrl")]
    pub source_url: Option<String>,
    pub source: Option<String>,
}

impl MarketDetails {
    pub fn title_text(&self) -> Option<&str> {
        self.question.as_deref().or(self.title.as_deref())
    }

    /// YES outcome token: `clobTokenIds[0]`.
    pub fn yes_token_id(&self) -> Option<String> {
        clob_token_ids(self.clob_token_ids.as_ref()).and_then(|ids| ids.first().cloned())
    }
}

/// Nested event object on newer market payloads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventDetails {
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(alias = "resolutionText")]
    pub resolution_text: Option<String>,
    #[serde(alias = "sourceUrl")]
    pub source_url: Option<String>,
}
