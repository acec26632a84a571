//! Hyper-scraper detection: flags wallets whose trade frequency points at
//! automated high-frequency software rather than a human trader.

use super::PerformanceMetrics;
use serde::{Deserialize, Serialize};

/// Trade-frequency thresholds for hyper-scraper detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BotThresholds {
    /// Average trades per day above which a wallet is flagged.
    pub max_trades_per_day: f64,
    /// Accounts younger than this many days are checked for bursts.
    pub new_account_age_days: u32,
    /// Trade count above which a young account is flagged.
    pub new_account_max_trades: u64,
}

impl Default for BotThresholds {
    fn default() -> Self {
        Self {
            max_trades_per_day: 50.0,
            new_account_age_days: 30,
            new_account_max_trades: 500,
        }
    }
}

/// Individual rule that fired for a wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HyperScraperSignal {
    HighTradeRate { trades_per_day: f64 },
    NewAccountBurst { age_days: u32, trades: u64 },
}

/// Classifies enriched metrics as human or automated trading.
#[derive(Debug, Clone, Default)]
pub struct HyperScraperDetector {
    thresholds: BotThresholds,
}

impl HyperScraperDetector {
    pub fn new(thresholds: BotThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &BotThresholds {
        &self.thresholds
    }

    /// `true` when any rule fires.
    pub fn classify(&self, metrics: &PerformanceMetrics) -> bool {
        let high_rate = metrics.trades_per_day() > self.thresholds.max_trades_per_day;
        let burst = metrics.trader_age_days < self.thresholds.new_account_age_days
            && metrics.total_trades > self.thresholds.new_account_max_trades;
        high_rate || burst
    }

    /// Every rule that fired, in evaluation order.
    pub fn signals(&self, metrics: &PerformanceMetrics) -> Vec<HyperScraperSignal> {
        let mut signals = Vec::new();

        let trades_per_day = metrics.trades_per_day();
        if trades_per_day > self.thresholds.max_trades_per_day {
            signals.push(HyperScraperSignal::HighTradeRate { trades_per_day });
        }

        if metrics.trader_age_days < self.thresholds.new_account_age_days
            && metrics.total_trades > self.thresholds.new_account_max_trades
        {
            signals.push(HyperScraperSignal::NewAccountBurst {
                age_days: metrics.trader_age_days,
                trades: metrics.total_trades,
            });
        }

        signals
    }
}
