//! Bot Scanner
//!
//! Analyzes individual Hyperliquid wallets: performance metrics, position
//! snapshot and hyper-scraper classification.

mod scorer;

use anyhow::Result;
use chrono::Utc;
use hyperliquid_core::api::{HistorySource, HyperliquidClient, PositionSource};
use hyperliquid_core::config::Config;
use hyperliquid_core::types::{EnrichedWallet, HyperScraperDetector, WalletAddress, WalletRecord};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet_tracker::MetricsEngine;

const SOURCE_ID: &str = "bot-scanner";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        anyhow::bail!("Usage: bot-scanner <address> [<address>...]");
    }

    // Load configuration
    let config = Config::from_env()?;
    let client = HyperliquidClient::new(&config.hyperliquid)?;
    let detector = HyperScraperDetector::default();

    info!(wallets = args.len(), window = ?client.window(), "Starting Bot Scanner");

    let mut analyzed = Vec::new();
    for raw in &args {
        match analyze_wallet(&client, &detector, raw).await {
            Ok(wallet) => {
                println!("{}", scorer::generate_report(&wallet, &detector));
                analyzed.push(wallet);
            }
            Err(e) => warn!(address = %raw, error = %e, "Wallet analysis failed"),
        }
    }

    if analyzed.len() > 1 {
        println!("{}", scorer::trade_rate_table(&scorer::rank_wallets(&analyzed)));
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bot_scanner=info,wallet_tracker=info,hyperliquid_core=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Fetch and score a single wallet.
async fn analyze_wallet(
    client: &HyperliquidClient,
    detector: &HyperScraperDetector,
    raw: &str,
) -> Result<EnrichedWallet> {
    let address = WalletAddress::parse(raw)?;
    info!(address = %address, "Analyzing wallet");

    let fetch = client.fetch_history(&address).await?;
    let now = Utc::now();
    let metrics = MetricsEngine::default().compute_fetch(&fetch, now);

    // The snapshot is informational; a failure here should not hide the metrics
    let position = match client.fetch_positions(&address).await {
        Ok(position) => position,
        Err(e) => {
            warn!(address = %address, error = %e, "Position snapshot unavailable");
            None
        }
    };

    let record = WalletRecord::new(address, SOURCE_ID, now);
    Ok(EnrichedWallet::new(record, metrics, detector).with_position(position))
}
