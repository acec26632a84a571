//! Performance metrics computed from a wallet's trading history.

use serde::{Deserialize, Serialize};

/// Whether a wallet's history was usable for metric computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    /// Enough points to compute every metric.
    Sufficient,
    /// The API returned no series, or too few samples.
    Insufficient,
    /// The fetch failed or timed out after retries.
    FetchFailed,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryStatus::Sufficient => "sufficient",
            HistoryStatus::Insufficient => "insufficient",
            HistoryStatus::FetchFailed => "fetch_failed",
        }
    }
}

/// Historical performance of a single wallet.
///
/// `None` means the metric is undefined for this history; it is never
/// coerced to zero because zero is a valid (bad) value for most of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Annualized Sharpe ratio (365-day basis).
    pub sharpe_ratio: Option<f64>,
    /// Annualized Sortino ratio. `None` with no downside periods.
    pub sortino_ratio: Option<f64>,
    /// Annualized standard deviation of daily returns.
    pub volatility: Option<f64>,
    /// Largest peak-to-trough decline, in [0, 1].
    pub max_drawdown: Option<f64>,
    /// Fraction of return periods with a positive return.
    pub win_rate: Option<f64>,
    /// Cumulative return over the window, in percent.
    pub cum_pnl_pct: Option<f64>,
    pub trader_age_days: u32,
    pub total_trades: u64,
    /// Number of daily returns that fed Sharpe and win rate.
    pub return_samples: usize,
    /// Periods excluded as deposits or withdrawals.
    pub suspected_transfers: usize,
    pub history_status: HistoryStatus,
    /// The trade log hit the API page cap.
    pub history_truncated: bool,
}

impl PerformanceMetrics {
    /// Metrics for a wallet without usable history.
    pub fn undefined(status: HistoryStatus) -> Self {
        Self {
            sharpe_ratio: None,
            sortino_ratio: None,
            volatility: None,
            max_drawdown: None,
            win_rate: None,
            cum_pnl_pct: None,
            trader_age_days: 0,
            total_trades: 0,
            return_samples: 0,
            suspected_transfers: 0,
            history_status: status,
            history_truncated: false,
        }
    }

    pub fn has_history(&self) -> bool {
        self.history_status == HistoryStatus::Sufficient
    }

    /// Average trades per day, treating accounts younger than a day as one day old.
    pub fn trades_per_day(&self) -> f64 {
        self.total_trades as f64 / f64::from(self.trader_age_days.max(1))
    }

    /// Trader age in years, rounded to two decimals.
    pub fn trader_age_years(&self) -> f64 {
        (f64::from(self.trader_age_days) / 365.25 * 100.0).round() / 100.0
    }
}
