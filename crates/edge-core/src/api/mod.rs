//! HTTP clients for the Polymarket public APIs.
//!
//! Three read-only clients (Gamma for market metadata, Data-API for holder
//! and history data, CLOB for order books) share one retry policy and one
//! timestamp-normalization helper. Every GET goes through
//! [`get_with_retry`]; malformed records inside otherwise-valid responses
//! are dropped with a warning by the individual clients, never bubbled up.

pub mod clob;
pub mod data_api;
pub mod gamma;

pub use clob::ClobClient;
pub use data_api::DataApiClient;
pub use gamma::{GammaClient, MarketDetails, SearchMarket};

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

/// Maximum retry attempts for API calls.
const MAX_RETRIES: u32 = 3;

pub(crate) fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to build HTTP client")
}

/// Join `base` and `path` and append percent-encoded query parameters.
pub(crate) fn build_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut url = Url::parse(base)
        .and_then(|u| u.join(path))
        .map_err(|e| Error::api(format!("invalid URL {base}{path}: {e}"), None))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.into())
}

/// Execute an HTTP GET with retry and exponential backoff.
///
/// Retries on 5xx server errors and 429 rate-limit responses (with a longer
/// backoff for 429) and on transport errors. All other 4xx errors fail
/// immediately.
pub(crate) async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
) -> Result<reqwest::Response> {
    let mut last_error = None;

    for attempt in 0..MAX_RETRIES {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response)
                if response.status().as_u16() == 429 || response.status().is_server_error() =>
            {
                let status = response.status();
                let rate_limited = status.as_u16() == 429;
                warn!(
                    attempt = attempt + 1,
                    status = %status,
                    url = url,
                    rate_limited,
                    "Retryable API error, backing off"
                );
                last_error = Some(Error::api(
                    format!(
                        "{}: {status}",
                        if rate_limited {
                            "Rate limited"
                        } else {
                            "Server error"
                        }
                    ),
                    Some(status.as_u16()),
                ));

                // Longer backoff for 429 to respect rate limits
                if attempt + 1 < MAX_RETRIES {
                    let backoff = if rate_limited {
                        Duration::from_millis(2000 * 2u64.pow(attempt))
                    } else {
                        Duration::from_millis(500 * 2u64.pow(attempt))
                    };
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }
            Ok(response) => {
                // Client error (4xx except 429) — don't retry
                return Err(Error::api(
                    format!("API error: {}", response.status()),
                    Some(response.status().as_u16()),
                ));
            }
            Err(e) => {
                warn!(
                    attempt = attempt + 1,
                    error = %e,
                    url = url,
                    "HTTP request failed, backing off"
                );
                last_error = Some(Error::Http(e));
            }
        }

        if attempt + 1 < MAX_RETRIES {
            tokio::time::sleep(Duration::from_millis(500 * 2u64.pow(attempt))).await;
        }
    }

    Err(last_error.unwrap_or_else(|| Error::api("Max retries exceeded", None)))
}

/// Parse the timestamp spellings the public APIs emit: RFC 3339, naive
/// ISO-8601 with or without fractional seconds, and bare dates.
pub(crate) fn parse_datetime_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| Utc.from_utc_datetime(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime_str("2025-04-30T20:00:00Z").is_some());
        assert!(parse_datetime_str("2025-04-30T20:00:00.123Z").is_some());
        assert!(parse_datetime_str("2025-04-30T20:00:00-05:00").is_some());
        assert!(parse_datetime_str("2025-04-30T20:00:00").is_some());
        assert!(parse_datetime_str("2025-04-30").is_some());
        assert!(parse_datetime_str("not a date").is_none());
    }

    #[test]
    fn test_parse_datetime_normalizes_offsets_to_utc() {
        let dt = parse_datetime_str("2025-04-30T20:00:00-04:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_build_url_encodes_query() {
        let url = build_url(
            "https://gamma-api.polymarket.com",
            "/public-search",
            &[("q", "AAPL earnings beat")],
        )
        .unwrap();
        assert_eq!(
            url,
            "https://gamma-api.polymarket.com/public-search?q=AAPL+earnings+beat"
        );
    }

    #[test]
    fn test_build_url_without_params() {
        let url = build_url("https://clob.polymarket.com", "/book", &[]).unwrap();
        assert_eq!(url, "https://clob.polymarket.com/book");
    }

    #[test]
    fn test_client_rejects_unparseable_base_url() {
        // Fails at URL construction, before any request is issued.
        let client = DataApiClient::new(Some("not a url".to_string()));
        let result = tokio_test::block_on(client.holders("0xcondition", 10));
        assert!(matches!(result, Err(Error::Api { .. })));
    }
}
