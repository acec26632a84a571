//! Wallet Ranker
//!
//! Batch run over scraped wallet observations: merge, enrich from the
//! Hyperliquid info API, rank, and write the enriched and ranked tables.

use anyhow::Result;
use clap::Parser;
use hyperliquid_core::api::HyperliquidClient;
use hyperliquid_core::config::Config;
use hyperliquid_core::types::HistoryStatus;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wallet_tracker::report::read_observations;
use wallet_tracker::{Enricher, Pipeline, PipelineConfig, PositionScope, Ranker};

#[derive(Parser, Debug)]
#[command(name = "wallet-ranker")]
#[command(about = "Merge, enrich and rank scraped Hyperliquid wallets")]
struct Args {
    /// Source observation CSV (address,source,scraped_at); repeat for several sources
    #[arg(long, required = true)]
    input: Vec<PathBuf>,

    /// Directory for the output tables (overrides OUTPUT_DIR)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Optional TOML/YAML/JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum Sharpe ratio to be ranked
    #[arg(long)]
    min_sharpe: Option<f64>,

    /// Maximum drawdown (0-1) to be ranked
    #[arg(long)]
    max_drawdown: Option<f64>,

    /// Keep wallets flagged as hyper scrapers in the ranking
    #[arg(long)]
    include_hyper_scrapers: bool,

    /// Position snapshots: all, ranked or none
    #[arg(long, default_value = "ranked")]
    fetch_positions: PositionScope,

    /// How many top-ranked wallets get a snapshot with `--fetch-positions ranked`
    #[arg(long, default_value_t = PositionScope::DEFAULT_RANKED_LIMIT)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(dir) = args.output_dir.clone() {
        config.output.dir = dir;
    }

    let mut pipeline_config = PipelineConfig::from_env();
    if let Some(min) = args.min_sharpe {
        pipeline_config.ranking.min_sharpe = min;
    }
    if let Some(max) = args.max_drawdown {
        pipeline_config.ranking.max_drawdown = max;
    }
    if args.include_hyper_scrapers {
        pipeline_config.ranking.exclude_hyper_scrapers = false;
    }
    pipeline_config.positions = match args.fetch_positions {
        PositionScope::Ranked { .. } => PositionScope::Ranked { limit: args.limit },
        scope => scope,
    };

    let mut observations = Vec::new();
    for path in &args.input {
        observations.extend(read_observations(path)?);
    }

    info!(
        inputs = args.input.len(),
        observations = observations.len(),
        api_url = %config.hyperliquid.api_url,
        window = ?config.hyperliquid.history_window,
        "Starting Wallet Ranker"
    );

    let client = Arc::new(HyperliquidClient::new(&config.hyperliquid)?);
    let enricher =
        Enricher::new(client.clone(), pipeline_config.enrichment.clone()).with_positions(client);
    let ranker = Ranker::new(pipeline_config.ranking.clone())?;
    let pipeline = Pipeline::new(enricher, ranker, pipeline_config.positions);

    let report = pipeline.run(observations).await;
    report.write_tables(&config.output)?;

    println!("Run {}", report.run_id);
    println!(
        "  Wallets: {} ({} skipped observations, {} duplicates)",
        report.enriched.len(),
        report.merge.skipped.len(),
        report.merge.duplicates
    );
    println!(
        "  History: {} sufficient, {} insufficient, {} fetch failed",
        report.count_status(HistoryStatus::Sufficient),
        report.count_status(HistoryStatus::Insufficient),
        report.count_status(HistoryStatus::FetchFailed)
    );
    println!("  Hyper scrapers: {}", report.hyper_scrapers());
    println!("  Ranked: {}", report.ranking.ranked.len());
    for (reason, count) in &report.ranking.summary.rejected {
        println!("    filtered {}: {}", reason.as_str(), count);
    }
    println!("  Enriched table: {}", config.output.enriched_path().display());
    println!("  Ranked table:   {}", config.output.ranked_path().display());

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wallet_ranker=info,wallet_tracker=info,hyperliquid_core=info".into());
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
