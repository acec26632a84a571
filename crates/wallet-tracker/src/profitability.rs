//! Profitability analysis for wallet performance metrics.

use chrono::{DateTime, Utc};
use hyperliquid_core::types::{
    HistoryFetch, HistoryStatus, PerformanceMetrics, WalletHistory,
};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use std::collections::HashMap;
use tracing::debug;

/// Standard deviations below this are treated as zero variance.
const MIN_STD_DEV: f64 = 1e-12;

/// Tuning for the metrics computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Annual risk-free rate, subtracted from the mean daily return.
    pub risk_free_rate: f64,
    /// A period whose equity change differs from its reported PnL by more
    /// than this fraction of the day's closing equity is treated as a transfer.
    pub transfer_tolerance: f64,
    /// Drop suspected transfer periods from the return series.
    pub exclude_transfers: bool,
    /// More suspected transfers than this makes the history unusable.
    pub max_transfers: Option<usize>,
    /// Returns needed before Sharpe and volatility are defined.
    pub min_return_samples: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            transfer_tolerance: 0.10,
            exclude_transfers: true,
            max_transfers: Some(5),
            min_return_samples: 2,
        }
    }
}

/// Period-over-period returns with transfer periods removed.
#[derive(Debug, Clone, Default)]
struct ReturnSeries {
    returns: Vec<f64>,
    suspected_transfers: usize,
}

/// Computes [`PerformanceMetrics`] from a wallet's history.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine {
    config: MetricsConfig,
}

impl MetricsEngine {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Metrics for a fetch result; `NoData` yields undefined metrics.
    pub fn compute_fetch(&self, fetch: &HistoryFetch, now: DateTime<Utc>) -> PerformanceMetrics {
        match fetch {
            HistoryFetch::Data(history) => self.compute(history, now),
            HistoryFetch::NoData => PerformanceMetrics::undefined(HistoryStatus::Insufficient),
        }
    }

    /// Compute every metric for one wallet as of `now`.
    pub fn compute(&self, history: &WalletHistory, now: DateTime<Utc>) -> PerformanceMetrics {
        let values: Vec<f64> = history.account_values.iter().map(|p| p.value).collect();
        if values.is_empty() {
            // A trade log alone says nothing about performance
            let mut metrics = PerformanceMetrics::undefined(HistoryStatus::Insufficient);
            metrics.history_truncated = history.truncated;
            return metrics;
        }

        let series = self.daily_returns(history);
        if self
            .config
            .max_transfers
            .is_some_and(|max| series.suspected_transfers > max)
        {
            debug!(
                transfers = series.suspected_transfers,
                "Too many suspected transfers, history unusable"
            );
            let mut metrics = PerformanceMetrics::undefined(HistoryStatus::Insufficient);
            metrics.trader_age_days = Self::calculate_trader_age_days(history, now);
            metrics.total_trades = history.trades.len() as u64;
            metrics.return_samples = series.returns.len();
            metrics.suspected_transfers = series.suspected_transfers;
            metrics.history_truncated = history.truncated;
            return metrics;
        }

        let status = if series.returns.len() < self.min_samples() {
            HistoryStatus::Insufficient
        } else {
            HistoryStatus::Sufficient
        };

        let metrics = PerformanceMetrics {
            sharpe_ratio: self.calculate_sharpe_ratio(&series.returns),
            sortino_ratio: self.calculate_sortino_ratio(&series.returns),
            volatility: self.calculate_volatility(&series.returns),
            max_drawdown: Self::calculate_max_drawdown(&values),
            win_rate: Self::calculate_win_rate(&series.returns),
            cum_pnl_pct: Self::calculate_cum_pnl_pct(&values),
            trader_age_days: Self::calculate_trader_age_days(history, now),
            total_trades: history.trades.len() as u64,
            return_samples: series.returns.len(),
            suspected_transfers: series.suspected_transfers,
            history_status: status,
            history_truncated: history.truncated,
        };

        debug!(
            points = values.len(),
            returns = metrics.return_samples,
            transfers = metrics.suspected_transfers,
            trades = metrics.total_trades,
            sharpe = ?metrics.sharpe_ratio,
            "Computed wallet metrics"
        );

        metrics
    }

    fn min_samples(&self) -> usize {
        self.config.min_return_samples.max(2)
    }

    fn daily_returns(&self, history: &WalletHistory) -> ReturnSeries {
        let points = &history.account_values;
        if points.len() < 2 {
            return ReturnSeries::default();
        }

        let pnl_by_time: HashMap<DateTime<Utc>, f64> = history
            .cumulative_pnl
            .iter()
            .map(|p| (p.timestamp, p.cumulative_pnl))
            .collect();

        let mut series = ReturnSeries::default();
        for pair in points.windows(2) {
            let (prev, curr) = (&pair[0], &pair[1]);
            if prev.value == 0.0 {
                continue;
            }

            let equity_change = curr.value - prev.value;
            if let (Some(pnl_prev), Some(pnl_curr)) = (
                pnl_by_time.get(&prev.timestamp),
                pnl_by_time.get(&curr.timestamp),
            ) {
                let mismatch = (equity_change - (pnl_curr - pnl_prev)).abs();
                if mismatch > self.config.transfer_tolerance * curr.value.abs() {
                    series.suspected_transfers += 1;
                    if self.config.exclude_transfers {
                        continue;
                    }
                }
            }

            series.returns.push(equity_change / prev.value);
        }

        series
    }

    /// Annualized mean/std ratio; `None` for zero variance or too few samples.
    fn calculate_sharpe_ratio(&self, returns: &[f64]) -> Option<f64> {
        if returns.len() < self.min_samples() {
            return None;
        }

        let data = Data::new(returns.to_vec());
        let mean_return = data.mean()?;
        let std_dev = data.std_dev()?;

        if !std_dev.is_finite() || std_dev < MIN_STD_DEV {
            return None;
        }

        // Perpetuals trade every day of the year
        let daily_rf = self.config.risk_free_rate / 365.0;
        let excess_return = mean_return - daily_rf;

        Some((excess_return / std_dev) * (365.0_f64).sqrt())
    }

    fn calculate_sortino_ratio(&self, returns: &[f64]) -> Option<f64> {
        if returns.len() < self.min_samples() {
            return None;
        }

        let downside: Vec<f64> = returns
            .iter()
            .filter(|&&r| r < 0.0)
            .map(|&r| r * r)
            .collect();

        if downside.is_empty() {
            return None;
        }

        let downside_dev = (downside.iter().sum::<f64>() / downside.len() as f64).sqrt();
        if downside_dev < MIN_STD_DEV {
            return None;
        }

        let mean_return = Data::new(returns.to_vec()).mean()?;
        let daily_rf = self.config.risk_free_rate / 365.0;

        Some(((mean_return - daily_rf) / downside_dev) * (365.0_f64).sqrt())
    }

    fn calculate_volatility(&self, returns: &[f64]) -> Option<f64> {
        if returns.len() < self.min_samples() {
            return None;
        }

        let std_dev = Data::new(returns.to_vec()).std_dev()?;
        if !std_dev.is_finite() || std_dev < MIN_STD_DEV {
            return None;
        }

        Some(std_dev * (365.0_f64).sqrt())
    }

    /// Largest running-peak decline as a fraction of the peak.
    pub fn calculate_max_drawdown(values: &[f64]) -> Option<f64> {
        let first = *values.first()?;

        let mut peak = first;
        let mut max_drawdown: f64 = 0.0;

        for &value in values {
            if value > peak {
                peak = value;
            } else if peak > 0.0 {
                let drawdown = (peak - value) / peak;
                max_drawdown = max_drawdown.max(drawdown);
            }
        }

        Some(max_drawdown.clamp(0.0, 1.0))
    }

    /// Fraction of periods with a strictly positive return.
    pub fn calculate_win_rate(returns: &[f64]) -> Option<f64> {
        if returns.is_empty() {
            return None;
        }
        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        Some(wins as f64 / returns.len() as f64)
    }

    pub fn calculate_cum_pnl_pct(values: &[f64]) -> Option<f64> {
        let (first, last) = (*values.first()?, *values.last()?);
        if first == 0.0 {
            return None;
        }
        Some((last - first) / first * 100.0)
    }

    /// Whole days since the earliest trade or series point.
    fn calculate_trader_age_days(history: &WalletHistory, now: DateTime<Utc>) -> u32 {
        history
            .earliest_timestamp()
            .map(|first| (now - first).num_days().max(0))
            .and_then(|days| u32::try_from(days).ok())
            .unwrap_or(0)
    }
}
