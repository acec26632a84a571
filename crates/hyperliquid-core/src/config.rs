//! Configuration management for the wallet ranking system.

use crate::types::HistoryWindow;
use crate::{Error, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub hyperliquid: HyperliquidConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HyperliquidConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub history_window: HistoryWindow,
}

impl HyperliquidConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.hyperliquid.xyz/info";
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            api_url: Self::DEFAULT_API_URL.to_string(),
            timeout_secs: 20,
            max_retries: 3,
            retry_base_delay_ms: 500,
            history_window: HistoryWindow::Month,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub enriched_file: String,
    pub ranked_file: String,
}

impl OutputConfig {
    pub fn enriched_path(&self) -> PathBuf {
        self.dir.join(&self.enriched_file)
    }

    pub fn ranked_path(&self) -> PathBuf {
        self.dir.join(&self.ranked_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            enriched_file: "wallet_analysis.csv".to_string(),
            ranked_file: "wallet_analysis_ranked.csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = HyperliquidConfig::default();
        let history_window = match env::var("HISTORY_WINDOW") {
            Ok(raw) => raw
                .parse()
                .map_err(|message: String| Error::Config { message })?,
            Err(_) => defaults.history_window,
        };

        Ok(Self {
            hyperliquid: HyperliquidConfig {
                api_url: env::var("HYPERLIQUID_API_URL").unwrap_or(defaults.api_url),
                timeout_secs: env::var("HYPERLIQUID_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout_secs),
                max_retries: env::var("HYPERLIQUID_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.max_retries),
                retry_base_delay_ms: env::var("HYPERLIQUID_RETRY_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.retry_base_delay_ms),
                history_window,
            },
            output: OutputConfig {
                dir: env::var("OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(".")),
                ..Default::default()
            },
        })
    }

    /// Load configuration from a file, with `HYPERRANK_*` environment
    /// variables layered on top (`HYPERRANK_HYPERLIQUID__API_URL`).
    pub fn from_file(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("HYPERRANK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
