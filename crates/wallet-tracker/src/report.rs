//! Flat CSV input and output for the pipeline.

use anyhow::{Context, Result};
use hyperliquid_core::types::EnrichedWallet;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::discovery::SourceObservation;
use crate::ranking::RankedWallet;

pub const ENRICHED_COLUMNS: [&str; 17] = [
    "address",
    "sources",
    "first_seen_at",
    "history_status",
    "sharpe_ratio",
    "max_drawdown",
    "win_rate",
    "cum_pnl_pct",
    "trader_age_days",
    "trader_age_years",
    "total_trades",
    "num_positions",
    "unrealized_pnl",
    "account_value",
    "exposure_pct",
    "total_margin_used",
    "is_hyper_scraper",
];

pub const RANKED_EXTRA_COLUMNS: [&str; 5] = [
    "sharpe_normalized",
    "drawdown_normalized",
    "winrate_normalized",
    "performance_score",
    "rank",
];

/// One row of the enriched table. Undefined metrics serialize as empty cells.
#[derive(Debug, Serialize)]
struct EnrichedRow<'a> {
    address: &'a str,
    sources: String,
    first_seen_at: String,
    history_status: &'static str,
    sharpe_ratio: Option<f64>,
    max_drawdown: Option<f64>,
    win_rate: Option<f64>,
    cum_pnl_pct: Option<f64>,
    trader_age_days: u32,
    trader_age_years: f64,
    total_trades: u64,
    num_positions: Option<u32>,
    unrealized_pnl: Option<Decimal>,
    account_value: Option<Decimal>,
    exposure_pct: Option<f64>,
    total_margin_used: Option<Decimal>,
    is_hyper_scraper: bool,
}

impl<'a> EnrichedRow<'a> {
    fn new(wallet: &'a EnrichedWallet) -> Self {
        let metrics = &wallet.metrics;
        let position = wallet.position.as_ref();
        Self {
            address: wallet.address().display(),
            sources: wallet.record.sources().join(";"),
            first_seen_at: wallet.record.first_seen_at().to_rfc3339(),
            history_status: metrics.history_status.as_str(),
            sharpe_ratio: metrics.sharpe_ratio,
            max_drawdown: metrics.max_drawdown,
            win_rate: metrics.win_rate,
            cum_pnl_pct: metrics.cum_pnl_pct,
            trader_age_days: metrics.trader_age_days,
            trader_age_years: metrics.trader_age_years(),
            total_trades: metrics.total_trades,
            num_positions: position.map(|p| p.num_positions),
            unrealized_pnl: position.map(|p| p.unrealized_pnl),
            account_value: position.map(|p| p.account_value),
            exposure_pct: position.and_then(|p| p.exposure_pct()),
            total_margin_used: position.map(|p| p.total_margin_used),
            is_hyper_scraper: wallet.is_hyper_scraper(),
        }
    }
}

// The csv serializer cannot flatten nested structs, so the ranked row
// repeats the enriched columns.
#[derive(Debug, Serialize)]
struct RankedRow<'a> {
    address: &'a str,
    sources: String,
    first_seen_at: String,
    history_status: &'static str,
    sharpe_ratio: Option<f64>,
    max_drawdown: Option<f64>,
    win_rate: Option<f64>,
    cum_pnl_pct: Option<f64>,
    trader_age_days: u32,
    trader_age_years: f64,
    total_trades: u64,
    num_positions: Option<u32>,
    unrealized_pnl: Option<Decimal>,
    account_value: Option<Decimal>,
    exposure_pct: Option<f64>,
    total_margin_used: Option<Decimal>,
    is_hyper_scraper: bool,
    sharpe_normalized: f64,
    drawdown_normalized: f64,
    winrate_normalized: f64,
    performance_score: f64,
    rank: usize,
}

impl<'a> RankedRow<'a> {
    fn new(ranked: &'a RankedWallet) -> Self {
        let base = EnrichedRow::new(&ranked.wallet);
        Self {
            address: base.address,
            sources: base.sources,
            first_seen_at: base.first_seen_at,
            history_status: base.history_status,
            sharpe_ratio: base.sharpe_ratio,
            max_drawdown: base.max_drawdown,
            win_rate: base.win_rate,
            cum_pnl_pct: base.cum_pnl_pct,
            trader_age_days: base.trader_age_days,
            trader_age_years: base.trader_age_years,
            total_trades: base.total_trades,
            num_positions: base.num_positions,
            unrealized_pnl: base.unrealized_pnl,
            account_value: base.account_value,
            exposure_pct: base.exposure_pct,
            total_margin_used: base.total_margin_used,
            is_hyper_scraper: base.is_hyper_scraper,
            sharpe_normalized: ranked.sharpe_normalized,
            drawdown_normalized: ranked.drawdown_normalized,
            winrate_normalized: ranked.winrate_normalized,
            performance_score: ranked.performance_score,
            rank: ranked.rank,
        }
    }
}

/// Scraper output row (`address,source,scraped_at`).
#[derive(Debug, Deserialize)]
struct ObservationRow {
    address: String,
    source: String,
    #[serde(alias = "observed_at", alias = "timestamp")]
    scraped_at: String,
}

/// Write the enriched table. The header is written even for an empty table.
pub fn write_enriched<W: Write>(writer: W, wallets: &[EnrichedWallet]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(ENRICHED_COLUMNS)?;
    for wallet in wallets {
        csv.serialize(EnrichedRow::new(wallet))?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the ranked table: enriched columns plus score and rank.
pub fn write_ranked<W: Write>(writer: W, ranked: &[RankedWallet]) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(ENRICHED_COLUMNS.iter().chain(RANKED_EXTRA_COLUMNS.iter()))?;
    for row in ranked {
        csv.serialize(RankedRow::new(row))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_enriched_table(path: &Path, wallets: &[EnrichedWallet]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_enriched(file, wallets)?;
    info!(path = %path.display(), rows = wallets.len(), "Wrote enriched table");
    Ok(())
}

pub fn write_ranked_table(path: &Path, ranked: &[RankedWallet]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_ranked(file, ranked)?;
    info!(path = %path.display(), rows = ranked.len(), "Wrote ranked table");
    Ok(())
}

/// Read scraper observations. Rows that fail to parse are logged and skipped.
pub fn read_observations_from<R: Read>(reader: R) -> Result<Vec<SourceObservation>> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut observations = Vec::new();
    for (line, row) in csv.deserialize::<ObservationRow>().enumerate() {
        match row {
            Ok(row) => observations.push(SourceObservation::new(row.address, row.source, row.scraped_at)),
            Err(e) => warn!(row = line + 1, error = %e, "Skipping unreadable observation row"),
        }
    }
    Ok(observations)
}

pub fn read_observations(path: &Path) -> Result<Vec<SourceObservation>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let observations = read_observations_from(file)?;
    info!(path = %path.display(), rows = observations.len(), "Read source observations");
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use hyperliquid_core::types::{
        HistoryStatus, HyperScraperDetector, PerformanceMetrics, PositionSnapshot, WalletAddress,
        WalletRecord,
    };

    const ADDR: &str = "0xAbCdEf0123456789aBcDeF0123456789AbCdEf01";

    fn enriched(with_position: bool) -> EnrichedWallet {
        let seen = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut record = WalletRecord::new(WalletAddress::parse(ADDR).unwrap(), "hyperdash", seen);
        record.observe("coinglass", seen);

        let mut metrics = PerformanceMetrics::undefined(HistoryStatus::Sufficient);
        metrics.sharpe_ratio = Some(2.5);
        metrics.max_drawdown = Some(0.1);
        metrics.win_rate = Some(0.6);
        metrics.trader_age_days = 400;
        metrics.total_trades = 120;

        let position = with_position.then(|| PositionSnapshot {
            num_positions: 2,
            unrealized_pnl: Decimal::new(-155, 1),
            account_value: Decimal::ZERO,
            total_margin_used: Decimal::ZERO,
            total_notional: Decimal::ZERO,
            fetched_at: seen,
        });

        EnrichedWallet::new(record, metrics, &HyperScraperDetector::default()).with_position(position)
    }

    fn to_string(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_empty_tables_have_headers() {
        let mut buf = Vec::new();
        write_enriched(&mut buf, &[]).unwrap();
        assert_eq!(to_string(buf).trim_end(), ENRICHED_COLUMNS.join(","));

        let mut buf = Vec::new();
        write_ranked(&mut buf, &[]).unwrap();
        let header = to_string(buf);
        assert!(header.trim_end().ends_with("performance_score,rank"));
        assert_eq!(header.lines().count(), 1);
    }

    #[test]
    fn test_undefined_metrics_are_empty_cells() {
        let mut buf = Vec::new();
        write_enriched(&mut buf, &[enriched(false)]).unwrap();
        let out = to_string(buf);
        let row = out.lines().nth(1).unwrap();

        assert_eq!(
            row,
            format!(
                "{ADDR},hyperdash;coinglass,2024-03-01T00:00:00+00:00,sufficient,2.5,0.1,0.6,,400,1.1,120,,,,,,false"
            )
        );
    }

    #[test]
    fn test_position_columns_and_undefined_exposure() {
        let mut buf = Vec::new();
        write_enriched(&mut buf, &[enriched(true)]).unwrap();
        let out = to_string(buf);
        let row = out.lines().nth(1).unwrap();
        // num_positions, unrealized_pnl, account_value, exposure_pct, total_margin_used
        assert!(row.ends_with(",2,-15.5,0,,0,false"), "{row}");
    }

    #[test]
    fn test_ranked_row_appends_score_columns() {
        let ranked = RankedWallet {
            wallet: enriched(false),
            sharpe_normalized: 0.0,
            drawdown_normalized: 1.0,
            winrate_normalized: 0.0,
            performance_score: 0.3,
            rank: 1,
        };
        let mut buf = Vec::new();
        write_ranked(&mut buf, &[ranked]).unwrap();
        let out = to_string(buf);
        let row = out.lines().nth(1).unwrap();
        assert!(row.ends_with(",false,0.0,1.0,0.0,0.3,1"), "{row}");
        assert_eq!(row.split(',').count(), 22);
    }

    #[test]
    fn test_read_observations_skips_bad_rows() {
        let input = "address,source,scraped_at\n\
                     0x1111111111111111111111111111111111111111,hyperdash,2024-03-01T00:00:00Z\n\
                     0x2222222222222222222222222222222222222222,coinglass\n\
                     0x3333333333333333333333333333333333333333 , hyperdash , 2024-03-02\n";
        let observations = read_observations_from(input.as_bytes()).unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[1].source, "hyperdash");
        assert_eq!(observations[1].observed_at, "2024-03-02");
    }

    #[test]
    fn test_table_files_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet_analysis.csv");

        write_enriched_table(&path, &[enriched(false), enriched(true)]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 3);

        let obs_path = dir.path().join("observations.csv");
        std::fs::write(
            &obs_path,
            "address,source,scraped_at\n0x1111111111111111111111111111111111111111,hyperdash,2024-03-01\n",
        )
        .unwrap();
        assert_eq!(read_observations(&obs_path).unwrap().len(), 1);
        assert!(read_observations(&dir.path().join("missing.csv")).is_err());
    }
}
