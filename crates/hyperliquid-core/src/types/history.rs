//! Trading history returned by the history API.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// History window served by the portfolio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryWindow {
    Day,
    Week,
    #[default]
    Month,
    AllTime,
}

impl HistoryWindow {
    pub fn to_days(&self) -> Option<i64> {
        match self {
            HistoryWindow::Day => Some(1),
            HistoryWindow::Week => Some(7),
            HistoryWindow::Month => Some(30),
            HistoryWindow::AllTime => None,
        }
    }

    /// Key of the perpetuals series in the portfolio response.
    pub fn portfolio_key(&self) -> &'static str {
        match self {
            HistoryWindow::Day => "perpDay",
            HistoryWindow::Week => "perpWeek",
            HistoryWindow::Month => "perpMonth",
            HistoryWindow::AllTime => "perpAllTime",
        }
    }
}

impl std::str::FromStr for HistoryWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(HistoryWindow::Day),
            "week" => Ok(HistoryWindow::Week),
            "month" => Ok(HistoryWindow::Month),
            "all_time" | "alltime" | "all" => Ok(HistoryWindow::AllTime),
            other => Err(format!("unknown history window: {other}")),
        }
    }
}

/// Account value at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountValuePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl AccountValuePoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Cumulative PnL since the start of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    pub timestamp: DateTime<Utc>,
    pub cumulative_pnl: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A single fill from the wallet's trade log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub timestamp: DateTime<Utc>,
    pub coin: String,
    pub side: TradeSide,
    pub price: Decimal,
    pub size: Decimal,
    pub closed_pnl: Decimal,
    pub fee: Decimal,
}

/// Account-value series plus trade log for one wallet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletHistory {
    /// Ordered oldest first.
    pub account_values: Vec<AccountValuePoint>,
    /// Same-dated cumulative PnL series, when the source provides one.
    pub cumulative_pnl: Vec<PnlPoint>,
    pub trades: Vec<TradeEvent>,
    /// The trade log was cut off by the API page cap.
    pub truncated: bool,
}

impl WalletHistory {
    pub fn from_account_values(points: Vec<AccountValuePoint>) -> Self {
        Self {
            account_values: points,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_values.is_empty() && self.trades.is_empty()
    }

    /// Earliest timestamp across the series and the trade log.
    pub fn earliest_timestamp(&self) -> Option<DateTime<Utc>> {
        let first_point = self.account_values.iter().map(|p| p.timestamp).min();
        let first_trade = self.trades.iter().map(|t| t.timestamp).min();
        match (first_point, first_trade) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Result of a history lookup.
#[derive(Debug, Clone)]
pub enum HistoryFetch {
    Data(WalletHistory),
    /// The API explicitly had nothing for this address.
    NoData,
}
