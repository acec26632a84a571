//! Error types for the wallet ranking system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Request for {address} timed out after {after_secs}s")]
    Timeout { address: String, after_secs: u64 },

    #[error("Scoring weights must be non-negative and sum to 1.0 (got {sum})")]
    InvalidWeights { sum: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
