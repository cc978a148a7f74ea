use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uptick_core::ingest::provider::{HttpJsonMarketData, MarketDataClient};
use uptick_core::screen::{ScreenOptions, ScreenOutcome, Screener};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "uptick_worker")]
struct Args {
    /// Budget in currency units; each entry's share count is sized against
    /// the full amount.
    #[arg(long, default_value_t = 100_000.0)]
    budget: f64,

    /// Minimum predicted gain fraction for a candidate to be kept.
    #[arg(long, default_value_t = 0.02)]
    threshold: f64,

    /// Number of top-ranked candidates considered before thresholding.
    #[arg(long, default_value_t = 40)]
    top_n: usize,

    /// Seed for the deterministic train/held-out partition.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Symbol universe file, one ticker per line.
    #[arg(long, default_value = "data/sp500.txt")]
    universe_file: PathBuf,

    /// Market as-of date (YYYY-MM-DD). Defaults to the latest US trading day.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Screen only the first N universe symbols.
    #[arg(long)]
    max_symbols: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = uptick_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let as_of_date =
        uptick_core::time::us_market::resolve_as_of_date(args.as_of_date.as_deref(), chrono::Utc::now())?;

    let mut symbols = universe::load_universe(&args.universe_file)?;
    if let Some(max) = args.max_symbols {
        symbols.truncate(max);
    }

    let client =
        HttpJsonMarketData::from_settings(&settings).context("market data provider setup failed")?;

    let opts = ScreenOptions {
        budget: args.budget,
        threshold: args.threshold,
        top_n: args.top_n,
        seed: args.seed,
        ..ScreenOptions::default()
    }
    .with_env_overrides();

    tracing::info!(
        %as_of_date,
        universe = symbols.len(),
        budget = opts.budget,
        threshold = opts.threshold,
        top_n = opts.top_n,
        provider = client.provider_name(),
        "starting screening run"
    );

    let screener = Screener::new(&client, opts);
    let outcome = match screener.run(&symbols, as_of_date).await {
        Ok(outcome) => outcome,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(%as_of_date, error = %err, "screening run failed");
            return Err(err);
        }
    };

    tracing::info!(
        %as_of_date,
        processed = outcome.processed,
        skipped = outcome.skipped,
        recommended = outcome.entries.len(),
        "screening run finished"
    );

    print_report(&outcome);
    Ok(())
}

fn print_report(outcome: &ScreenOutcome) {
    if outcome.entries.is_empty() {
        println!("No stocks met the criteria for buying.");
        return;
    }

    println!("Stocks to buy:");
    for entry in &outcome.entries {
        println!(
            "Stock: {}, Quantity: {}, Predicted Price: {:.2}, MSE: {:.2}",
            entry.symbol, entry.quantity, entry.predicted_price, entry.mse
        );
    }
}

fn init_sentry(settings: &uptick_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
