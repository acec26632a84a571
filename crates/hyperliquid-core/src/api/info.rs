//! Hyperliquid info API client.
//!
//! Serves the history and position collaborators from three read-only
//! endpoints: `portfolio`, `userFillsByTime` and `clearinghouseState`.

use super::source::{HistorySource, PositionSource};
use crate::config::HyperliquidConfig;
use crate::types::{
    AccountValuePoint, HistoryFetch, HistoryWindow, PnlPoint, PositionSnapshot, TradeEvent,
    TradeSide, WalletAddress, WalletHistory,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

/// Client for the Hyperliquid `/info` endpoint.
pub struct HyperliquidClient {
    api_url: String,
    window: HistoryWindow,
    max_retries: u32,
    retry_base_delay: StdDuration,
    http_client: reqwest::Client,
}

impl HyperliquidClient {
    /// Maximum fills returned by a single `userFillsByTime` call.
    pub const FILLS_PAGE_CAP: usize = 2000;

    /// Upper bound on attempts per request.
    pub const MAX_ATTEMPTS: u32 = 10;

    pub fn new(config: &HyperliquidConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .connect_timeout(StdDuration::from_secs(10))
            .build()?;

        Ok(Self {
            api_url: config.api_url.clone(),
            window: config.history_window,
            max_retries: config.max_retries.clamp(1, Self::MAX_ATTEMPTS),
            retry_base_delay: StdDuration::from_millis(config.retry_base_delay_ms),
            http_client,
        })
    }

    pub fn window(&self) -> HistoryWindow {
        self.window
    }

    /// POST a request body with retry and exponential backoff.
    ///
    /// Retries on 5xx server errors and 429 rate-limit responses (with a longer
    /// backoff for 429). All other 4xx errors fail immediately.
    async fn post_with_retry(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            match self.http_client.post(&self.api_url).json(body).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().as_u16() == 429 || response.status().is_server_error() =>
                {
                    let status = response.status();
                    let is_rate_limited = status.as_u16() == 429;
                    warn!(
                        attempt = attempt + 1,
                        status = %status,
                        request_type = %body["type"],
                        rate_limited = is_rate_limited,
                        "Retryable API error, backing off"
                    );
                    last_error = Some(Error::Api {
                        message: format!(
                            "{}: {}",
                            if is_rate_limited {
                                "Rate limited"
                            } else {
                                "Server error"
                            },
                            status
                        ),
                        status: Some(status.as_u16()),
                    });

                    if attempt + 1 < self.max_retries {
                        let factor = if is_rate_limited { 4 } else { 1 };
                        let backoff = self.retry_base_delay * factor * 2u32.saturating_pow(attempt);
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
                Ok(response) => {
                    return Err(Error::Api {
                        message: format!("API error: {}", response.status()),
                        status: Some(response.status().as_u16()),
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        request_type = %body["type"],
                        "HTTP request failed, backing off"
                    );
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(self.retry_base_delay * 2u32.saturating_pow(attempt)).await;
            }
        }

        Err(last_error.unwrap_or(Error::Api {
            message: "Max retries exceeded".to_string(),
            status: None,
        }))
    }

    /// Fetch the configured window of the portfolio history.
    pub async fn portfolio(&self, address: &WalletAddress) -> Result<Option<PortfolioPeriod>> {
        let body = serde_json::json!({ "type": "portfolio", "user": address.canonical() });
        let response = self.post_with_retry(&body).await?;
        let periods: Option<Vec<(String, PortfolioPeriod)>> = response.json().await?;
        Ok(select_period(periods.unwrap_or_default(), self.window))
    }

    /// Fetch fills from `start` onwards, capped at [`Self::FILLS_PAGE_CAP`].
    pub async fn user_fills_by_time(
        &self,
        address: &WalletAddress,
        start: DateTime<Utc>,
    ) -> Result<Vec<RawFill>> {
        let body = serde_json::json!({
            "type": "userFillsByTime",
            "user": address.canonical(),
            "startTime": start.timestamp_millis(),
            "aggregateByTime": false,
        });
        let response = self.post_with_retry(&body).await?;
        let fills: Option<Vec<RawFill>> = response.json().await?;
        Ok(fills.unwrap_or_default())
    }

    /// Fetch margin summary and open positions.
    pub async fn clearinghouse_state(
        &self,
        address: &WalletAddress,
    ) -> Result<Option<ClearinghouseState>> {
        let body = serde_json::json!({ "type": "clearinghouseState", "user": address.canonical() });
        let response = self.post_with_retry(&body).await?;
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl HistorySource for HyperliquidClient {
    async fn fetch_history(&self, address: &WalletAddress) -> Result<HistoryFetch> {
        let Some(period) = self.portfolio(address).await? else {
            debug!(address = %address, window = ?self.window, "No portfolio window");
            return Ok(HistoryFetch::NoData);
        };

        let history = build_history(&period, Vec::new());
        let Some(start) = history.account_values.first().map(|p| p.timestamp) else {
            return Ok(HistoryFetch::NoData);
        };

        let fills = self.user_fills_by_time(address, start).await?;
        Ok(HistoryFetch::Data(build_history(&period, fills)))
    }
}

#[async_trait::async_trait]
impl PositionSource for HyperliquidClient {
    async fn fetch_positions(&self, address: &WalletAddress) -> Result<Option<PositionSnapshot>> {
        Ok(self
            .clearinghouse_state(address)
            .await?
            .map(|state| build_snapshot(&state, Utc::now())))
    }
}

/// One window of the `portfolio` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioPeriod {
    #[serde(rename = "accountValueHistory", default)]
    pub account_value_history: Vec<RawPoint>,
    /// Cumulative PnL since the window start.
    #[serde(rename = "pnlHistory", default)]
    pub pnl_history: Vec<RawPoint>,
}

/// `[timestamp_ms, "decimal"]` pair.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint(pub i64, pub String);

impl RawPoint {
    fn parse(&self) -> Option<(DateTime<Utc>, f64)> {
        let timestamp = DateTime::from_timestamp_millis(self.0)?;
        let value = self.1.parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some((timestamp, value))
    }
}

/// A fill from `userFillsByTime`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFill {
    pub coin: String,
    pub px: Decimal,
    pub sz: Decimal,
    /// `B` for buys, `A` for sells.
    pub side: String,
    pub time: i64,
    #[serde(rename = "closedPnl", default)]
    pub closed_pnl: Decimal,
    #[serde(default)]
    pub fee: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClearinghouseState {
    #[serde(rename = "marginSummary", default)]
    pub margin_summary: Option<MarginSummary>,
    #[serde(rename = "assetPositions", default)]
    pub asset_positions: Option<Vec<AssetPosition>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarginSummary {
    #[serde(rename = "accountValue", default)]
    pub account_value: Option<Decimal>,
    #[serde(rename = "totalMarginUsed", default)]
    pub total_margin_used: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPosition {
    #[serde(default)]
    pub position: Option<RawPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPosition {
    #[serde(default)]
    pub coin: Option<String>,
    #[serde(rename = "unrealizedPnl", default)]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(rename = "positionValue", default)]
    pub position_value: Option<Decimal>,
}

fn select_period(
    periods: Vec<(String, PortfolioPeriod)>,
    window: HistoryWindow,
) -> Option<PortfolioPeriod> {
    periods
        .into_iter()
        .find(|(key, _)| key == window.portfolio_key())
        .map(|(_, period)| period)
}

/// Convert a raw portfolio window and fills into a [`WalletHistory`].
///
/// Points with unparseable timestamps or values are dropped; output series
/// are sorted oldest first.
pub fn build_history(period: &PortfolioPeriod, fills: Vec<RawFill>) -> WalletHistory {
    let mut account_values: Vec<AccountValuePoint> = period
        .account_value_history
        .iter()
        .filter_map(RawPoint::parse)
        .map(|(timestamp, value)| AccountValuePoint { timestamp, value })
        .collect();
    account_values.sort_by_key(|p| p.timestamp);

    let mut cumulative_pnl: Vec<PnlPoint> = period
        .pnl_history
        .iter()
        .filter_map(RawPoint::parse)
        .map(|(timestamp, cumulative_pnl)| PnlPoint {
            timestamp,
            cumulative_pnl,
        })
        .collect();
    cumulative_pnl.sort_by_key(|p| p.timestamp);

    let truncated = fills.len() >= HyperliquidClient::FILLS_PAGE_CAP;
    let trades = fills
        .into_iter()
        .filter_map(|fill| {
            let timestamp = DateTime::from_timestamp_millis(fill.time)?;
            let side = match fill.side.as_str() {
                "B" => TradeSide::Buy,
                _ => TradeSide::Sell,
            };
            Some(TradeEvent {
                timestamp,
                coin: fill.coin,
                side,
                price: fill.px,
                size: fill.sz,
                closed_pnl: fill.closed_pnl,
                fee: fill.fee,
            })
        })
        .collect();

    WalletHistory {
        account_values,
        cumulative_pnl,
        trades,
        truncated,
    }
}

/// Summarize a clearinghouse state into a [`PositionSnapshot`].
pub fn build_snapshot(state: &ClearinghouseState, fetched_at: DateTime<Utc>) -> PositionSnapshot {
    let (account_value, total_margin_used) = state
        .margin_summary
        .as_ref()
        .map(|m| {
            (
                m.account_value.unwrap_or(Decimal::ZERO),
                m.total_margin_used.unwrap_or(Decimal::ZERO),
            )
        })
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    let positions = state.asset_positions.as_deref().unwrap_or_default();
    let mut unrealized_pnl = Decimal::ZERO;
    let mut total_notional = Decimal::ZERO;
    for position in positions.iter().filter_map(|p| p.position.as_ref()) {
        unrealized_pnl += position.unrealized_pnl.unwrap_or(Decimal::ZERO);
        total_notional += position.position_value.unwrap_or(Decimal::ZERO).abs();
    }

    PositionSnapshot {
        num_positions: u32::try_from(positions.len()).unwrap_or(u32::MAX),
        unrealized_pnl,
        account_value,
        total_margin_used,
        total_notional,
        fetched_at,
    }
}
