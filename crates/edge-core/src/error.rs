use thiserror::Error;

/// Errors surfaced by the edge-core library.
///
/// Degenerate numeric inputs (empty samples, zero spread, zero weights on a
/// wallet) are never errors; the stats and feature layers absorb them into
/// documented neutral outputs. Errors here are reserved for transport
/// failures, unusable API payloads and invalid configuration, and invalid
/// configuration is always caught at load time rather than mid-run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("API error ({status:?}): {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Market not found or unusable: {0}")]
    InvalidMarket(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn api(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Api {
            message: message.into(),
            status,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
