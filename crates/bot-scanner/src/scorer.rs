//! Text reports for analyzed wallets.

use hyperliquid_core::types::{EnrichedWallet, HyperScraperDetector, HyperScraperSignal};

/// Generate a detailed analysis report for a wallet.
pub fn generate_report(wallet: &EnrichedWallet, detector: &HyperScraperDetector) -> String {
    let metrics = &wallet.metrics;
    let mut report = String::new();

    report.push_str("=== Wallet Analysis Report ===\n");
    report.push_str(&format!("Address: {}\n", wallet.address().display()));
    report.push_str(&format!("History: {}\n", metrics.history_status.as_str()));

    report.push_str("\n--- Trading Activity ---\n");
    report.push_str(&format!("Total Trades: {}\n", metrics.total_trades));
    if metrics.history_truncated {
        report.push_str("  (trade log truncated at the API page cap)\n");
    }
    report.push_str(&format!(
        "Trader Age: {} days ({:.2} years)\n",
        metrics.trader_age_days,
        metrics.trader_age_years()
    ));
    report.push_str(&format!("Trades per Day: {:.1}\n", metrics.trades_per_day()));

    report.push_str("\n--- Performance ---\n");
    match metrics.sharpe_ratio {
        Some(sharpe) => {
            let quality = if sharpe > 3.0 {
                "Exceptional"
            } else if sharpe > 1.5 {
                "Strong"
            } else if sharpe > 0.0 {
                "Weak"
            } else {
                "Losing"
            };
            report.push_str(&format!("Sharpe Ratio: {:.2} - {}\n", sharpe, quality));
        }
        None => report.push_str("Sharpe Ratio: undefined\n"),
    }
    if let Some(sortino) = metrics.sortino_ratio {
        report.push_str(&format!("Sortino Ratio: {:.2}\n", sortino));
    }
    if let Some(dd) = metrics.max_drawdown {
        report.push_str(&format!("Max Drawdown: {:.1}%\n", dd * 100.0));
    }
    if let Some(wr) = metrics.win_rate {
        report.push_str(&format!("Win Rate: {:.1}% of days\n", wr * 100.0));
    }
    if let Some(pnl) = metrics.cum_pnl_pct {
        report.push_str(&format!("Cumulative PnL: {:+.2}%\n", pnl));
    }
    if metrics.suspected_transfers > 0 {
        report.push_str(&format!(
            "Transfer Days Excluded: {}\n",
            metrics.suspected_transfers
        ));
    }

    if let Some(position) = &wallet.position {
        report.push_str("\n--- Open Positions ---\n");
        report.push_str(&format!("Positions: {}\n", position.num_positions));
        report.push_str(&format!("Account Value: ${}\n", position.account_value));
        report.push_str(&format!("Unrealized PnL: ${}\n", position.unrealized_pnl));
        match position.exposure_pct() {
            Some(exposure) => report.push_str(&format!("Margin Exposure: {:.1}%\n", exposure)),
            None => report.push_str("Margin Exposure: undefined\n"),
        }
    }

    report.push_str("\n--- Classification ---\n");
    report.push_str(&format!(
        "Classification: {}\n",
        if wallet.is_hyper_scraper() {
            "Hyper Scraper"
        } else {
            "Likely Human"
        }
    ));

    let signals = detector.signals(&wallet.metrics);
    if !signals.is_empty() {
        report.push_str("\nTriggered Signals:\n");
        for signal in &signals {
            let line = match signal {
                HyperScraperSignal::HighTradeRate { trades_per_day } => {
                    format!("High trade rate: {:.1} trades/day", trades_per_day)
                }
                HyperScraperSignal::NewAccountBurst { age_days, trades } => {
                    format!("New account burst: {} trades in {} days", trades, age_days)
                }
            };
            report.push_str(&format!("  - {}\n", line));
        }
    }

    report.push_str("\n=============================\n");

    report
}

/// Order wallets by trade frequency, most bot-like first.
pub fn rank_wallets(wallets: &[EnrichedWallet]) -> Vec<&EnrichedWallet> {
    let mut ranked: Vec<_> = wallets.iter().collect();
    ranked.sort_by(|a, b| {
        b.metrics
            .trades_per_day()
            .total_cmp(&a.metrics.trades_per_day())
            .then_with(|| a.address().cmp(b.address()))
    });
    ranked
}

/// Compact summary table for several wallets.
pub fn trade_rate_table(wallets: &[&EnrichedWallet]) -> String {
    let mut table = String::from("=== Trade Rate Summary ===\n");
    for wallet in wallets {
        table.push_str(&format!(
            "{:<44} {:>10.1}/day {}\n",
            wallet.address().display(),
            wallet.metrics.trades_per_day(),
            if wallet.is_hyper_scraper() { "BOT" } else { "" }
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hyperliquid_core::types::{
        HistoryStatus, PerformanceMetrics, PositionSnapshot, WalletAddress, WalletRecord,
    };
    use rust_decimal::Decimal;

    fn wallet(digit: char, trades: u64, age_days: u32, sharpe: Option<f64>) -> EnrichedWallet {
        let raw = format!("0x{}", digit.to_string().repeat(40));
        let record = WalletRecord::new(WalletAddress::parse(&raw).unwrap(), "test", Utc::now());
        let mut metrics = PerformanceMetrics::undefined(HistoryStatus::Sufficient);
        metrics.total_trades = trades;
        metrics.trader_age_days = age_days;
        metrics.sharpe_ratio = sharpe;
        metrics.max_drawdown = Some(0.12);
        metrics.win_rate = Some(0.58);
        EnrichedWallet::new(record, metrics, &HyperScraperDetector::default())
    }

    #[test]
    fn test_generate_report_bot_wallet() {
        let detector = HyperScraperDetector::default();
        let report = generate_report(&wallet('a', 2000, 10, Some(4.2)), &detector);

        assert!(report.contains("Hyper Scraper"));
        assert!(report.contains("High trade rate: 200.0 trades/day"));
        assert!(report.contains("New account burst: 2000 trades in 10 days"));
        assert!(report.contains("Exceptional"));
    }

    #[test]
    fn test_generate_report_human_wallet() {
        let detector = HyperScraperDetector::default();
        let position = PositionSnapshot {
            num_positions: 2,
            unrealized_pnl: Decimal::new(1250, 1),
            account_value: Decimal::ZERO,
            total_margin_used: Decimal::ZERO,
            total_notional: Decimal::ZERO,
            fetched_at: Utc::now(),
        };
        let human = wallet('b', 40, 400, None).with_position(Some(position));
        let report = generate_report(&human, &detector);

        assert!(report.contains("Likely Human"));
        assert!(report.contains("Sharpe Ratio: undefined"));
        assert!(report.contains("Margin Exposure: undefined"));
        assert!(!report.contains("Triggered Signals"));
    }

    #[test]
    fn test_rank_wallets() {
        let wallets = vec![
            wallet('1', 30, 30, Some(2.0)),
            wallet('2', 3000, 30, Some(2.0)),
            wallet('3', 300, 30, Some(2.0)),
        ];
        let ranked = rank_wallets(&wallets);

        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].metrics.trades_per_day() >= ranked[1].metrics.trades_per_day());
        assert!(ranked[0].is_hyper_scraper());

        let table = trade_rate_table(&ranked);
        assert_eq!(table.lines().count(), 4);
        assert!(table.lines().nth(1).unwrap().ends_with("BOT"));
    }
}
