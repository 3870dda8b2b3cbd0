mod config;
mod error;
mod indicator;
mod model;
mod report;
mod screener;
mod source;
mod universe;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use model::Period;
use screener::{NEAR_HIGH_THRESHOLD, NEAR_LOW_THRESHOLD, ScreenOptions};
use source::MarketDataSource;
use source::cache::CachedSource;
use source::yahoo::YahooSource;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("universe error")]
    Universe,
    #[display("screener error")]
    Screener,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PriceFilter {
    /// Show every processed stock.
    All,
    /// Stocks trading within 5% of their 52-week high.
    NearHigh,
    /// Stocks trading within 5% of their 52-week low.
    NearLow,
}

#[derive(Parser)]
#[command(name = "stock-screener", about = "Nifty 500 stock screening dashboard")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// History window for the detail view (1mo, 3mo, 6mo, 1y, 2y, 5y);
    /// overrides the config file
    #[arg(short, long)]
    period: Option<String>,

    /// Price filter applied to the summary table
    #[arg(long, value_enum, default_value = "all")]
    filter: PriceFilter,

    /// Keep only stocks whose symbol or name contains this text
    #[arg(long)]
    search: Option<String>,

    /// Print the indicator summary for one symbol after the table
    #[arg(long)]
    detail: Option<String>,

    /// Skip live quotes and use the last historical close everywhere
    #[arg(long)]
    no_live: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    let period = match &cli.period {
        Some(s) => Period::from_str(s).ok_or_else(|| {
            Report::new(AppError::Config).attach(format!("unknown period \"{s}\""))
        })?,
        // Validated at config load
        None => config.screener.period().unwrap_or(Period::Year1),
    };

    // ── Universe ──────────────────────────────────────────────────────────────
    let universe = universe::load(Path::new(&config.screener.universe_file))
        .change_context(AppError::Universe)?;
    info!(symbols = universe.len(), "universe loaded");

    // ── Data source ───────────────────────────────────────────────────────────
    let inner: Arc<dyn MarketDataSource> = match &config.source.base_url {
        Some(url) => Arc::new(YahooSource::with_base_url(url)),
        None => Arc::new(YahooSource::new()),
    };
    let source: Arc<dyn MarketDataSource> = Arc::new(CachedSource::new(
        inner,
        Duration::from_secs(config.screener.cache_ttl_secs),
    ));

    // ── Screener run ──────────────────────────────────────────────────────────
    // Ctrl+C cancels the in-flight run instead of killing mid-request.
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, cancelling run");
            cancel_on_signal.cancel();
        }
    });

    let options = ScreenOptions {
        concurrency: config.screener.concurrency,
        include_live_prices: config.screener.include_live_prices && !cli.no_live,
    };

    let outcome = screener::run(&universe, Arc::clone(&source), &options, &cancel)
        .await
        .change_context(AppError::Screener)?;

    // ── Report ────────────────────────────────────────────────────────────────
    let mut rows = match cli.filter {
        PriceFilter::All => outcome.rows.clone(),
        PriceFilter::NearHigh => screener::filter_near_52week_high(&outcome.rows, NEAR_HIGH_THRESHOLD),
        PriceFilter::NearLow => screener::filter_near_52week_low(&outcome.rows, NEAR_LOW_THRESHOLD),
    };
    if let Some(query) = &cli.search {
        rows = screener::search(&rows, query);
    }

    println!("{}", report::render_overview(&outcome));
    println!("{}", report::render_table(&rows));

    if let Some(symbol) = &cli.detail {
        let bars = screener::detailed_series(source.as_ref(), symbol, period).await;
        let indicators = indicator::all_indicators(&bars);
        println!("{}", report::render_detail(symbol, &bars, &indicators));
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
