mod analysis;
mod brief;
mod config;
mod decision;
mod error;
mod fetch;
mod indicator;
mod model;
mod notifier;
mod pattern;
mod ranking;
mod storage;
mod trading;

use std::path::Path;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use fetch::krx::KrxFetcher;
use fetch::naver::NaverFetcher;
use fetch::{ListingFetcher, PriceFetcher};
use notifier::Notifier;
use notifier::discord::DiscordNotifier;
use notifier::terminal::TerminalNotifier;
use storage::Storage;
use storage::sqlite::SqliteStorage;
use trading::Broker;
use trading::kis::KisBroker;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("storage error")]
    Storage,
    #[display("fetch error")]
    Fetch,
    #[display("trading error")]
    Trading,
    #[display("brief error")]
    Brief,
}

#[derive(Parser)]
#[command(name = "stock-scout", about = "Double-bottom scanner for KRX stocks")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download the KRX listing and register all symbols
    Init,
    /// Fetch daily quotes; no codes means every registered symbol
    Crawl {
        /// Symbol codes to crawl (e.g. 005930)
        codes: Vec<String>,
    },
    /// Compute indicators and classify double bottoms
    Analyze,
    /// Rank candidates, plan orders and send the morning brief
    Brief,
    /// Sync the listing, crawl, analyze and brief in one pass
    Run,
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

    let data_dir = &config.general.data_dir;
    std::fs::create_dir_all(data_dir)
        .change_context(AppError::Storage)
        .attach_with(|| format!("data_dir: {data_dir}"))?;

    let db_path = format!("{data_dir}/stock-scout.db");
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::open(Path::new(&db_path))
            .await
            .change_context(AppError::Storage)?,
    );

    match cli.command {
        Command::Init => sync_listing(storage.as_ref()).await,
        Command::Crawl { codes } => crawl_prices(Arc::clone(&storage), &config, &codes).await,
        Command::Analyze => run_analysis(Arc::clone(&storage), &config).await,
        Command::Brief => run_brief(storage.as_ref(), &config).await,
        Command::Run => {
            sync_listing(storage.as_ref()).await?;
            crawl_prices(Arc::clone(&storage), &config, &[]).await?;
            run_analysis(Arc::clone(&storage), &config).await?;
            run_brief(storage.as_ref(), &config).await
        }
    }
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

async fn sync_listing(storage: &dyn Storage) -> Result<(), Report<AppError>> {
    let fetcher = KrxFetcher::new();
    let symbols = fetcher
        .fetch_listing()
        .await
        .change_context(AppError::Fetch)?;

    storage
        .upsert_symbols(&symbols)
        .await
        .change_context(AppError::Storage)?;

    info!(symbols = symbols.len(), "listing synchronized");
    Ok(())
}

/// Fetch daily quotes for every registered symbol, `concurrency` symbols at
/// a time. The fetcher's internal rate limiter keeps the request rate
/// bounded regardless of concurrency. Per-symbol failures are logged and
/// the batch continues.
async fn crawl_prices(
    storage: Arc<dyn Storage>,
    config: &AppConfig,
    codes: &[String],
) -> Result<(), Report<AppError>> {
    let mut stocks = storage
        .list_stocks()
        .await
        .change_context(AppError::Storage)?;
    if !codes.is_empty() {
        stocks.retain(|s| codes.contains(&s.code));
    }
    if stocks.is_empty() {
        warn!("no symbols to crawl; run `init` first or check the given codes");
        return Ok(());
    }

    let fetcher: Arc<dyn PriceFetcher> = Arc::new(NaverFetcher::new());
    let pages = config.fetch.price_pages;
    let semaphore = Arc::new(Semaphore::new(config.general.concurrency.max(1)));
    let mut handles = Vec::with_capacity(stocks.len());

    info!(symbols = stocks.len(), pages, "price crawl started");

    for stock in stocks {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let fetcher = Arc::clone(&fetcher);
        let storage = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            let ok = crawl_symbol(
                fetcher.as_ref(),
                storage.as_ref(),
                &stock.code,
                stock.name.is_empty(),
                pages,
            )
            .await;
            drop(permit);
            ok
        }));
    }

    let mut crawled = 0usize;
    let mut failed = 0usize;
    for handle in handles {
        match handle.await {
            Ok(true) => crawled += 1,
            _ => failed += 1,
        }
    }

    info!(crawled, failed, "price crawl finished");
    Ok(())
}

async fn crawl_symbol(
    fetcher: &dyn PriceFetcher,
    storage: &dyn Storage,
    code: &str,
    name_missing: bool,
    pages: usize,
) -> bool {
    let bars = match fetcher.fetch_daily_bars(code, pages).await {
        Ok(bars) => bars,
        Err(e) => {
            warn!(code, error = ?e, "quote fetch failed (continuing)");
            return false;
        }
    };

    match storage.upsert_daily_prices(code, &bars).await {
        Ok(inserted) => {
            info!(code, fetched = bars.len(), inserted, "quotes stored");
        }
        Err(e) => {
            warn!(code, error = ?e, "quote store failed (continuing)");
            return false;
        }
    }

    // Listing rows occasionally arrive without a usable name.
    if name_missing {
        match fetcher.fetch_stock_name(code).await {
            Ok(name) => {
                if let Err(e) = storage.update_stock_name(code, &name).await {
                    warn!(code, error = ?e, "name update failed");
                }
            }
            Err(e) => warn!(code, error = ?e, "name resolution failed"),
        }
    }

    true
}

async fn run_analysis(
    storage: Arc<dyn Storage>,
    config: &AppConfig,
) -> Result<(), Report<AppError>> {
    analysis::analyze_all(storage, &config.pattern, config.general.concurrency)
        .await
        .change_context(AppError::Storage)?;
    Ok(())
}

async fn run_brief(storage: &dyn Storage, config: &AppConfig) -> Result<(), Report<AppError>> {
    let broker: Option<Box<dyn Broker>> = match KisBroker::from_env() {
        Ok(broker) => Some(Box::new(broker)),
        Err(e) if config.trading.enabled => {
            return Err(e.change_context(AppError::Trading));
        }
        Err(e) => {
            info!(reason = %e.current_context(), "no broker configured, brief is advisory");
            None
        }
    };

    let notifier: Box<dyn Notifier> = match config.notification.kind.as_str() {
        "discord" => Box::new(DiscordNotifier::new(config.notification.webhook_url.clone())),
        _ => Box::new(TerminalNotifier),
    };

    brief::run_brief(storage, broker.as_deref(), notifier.as_ref(), config)
        .await
        .change_context(AppError::Brief)?;
    Ok(())
}
