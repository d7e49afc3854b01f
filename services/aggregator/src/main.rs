//! Pricegrid aggregator binary.
//!
//! Wires the exchange registry, the token and time-series stores, the
//! symbol resolver and the poller together, then runs the polling pipeline
//! until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adapter_service::{ExchangeAdapter, RestExchangeAdapter};
use aggregator_service::outlier::{OutlierConfig, OutlierDetector};
use aggregator_service::poller::{Poller, PollerConfig};
use aggregator_service::resolver::{SymbolResolver, CACHE_REFRESH_INTERVAL};
use aggregator_service::sink::SinkQueue;
use aggregator_service::storage::{
    ClickHouseSeriesStore, PgTokenStore, SeriesStore, TokenStore,
};
use config::{load_registry, ServiceSettings};

/// Queue bound for raw ticker rows, roughly one tick of every venue.
const TICKER_QUEUE_CAPACITY: usize = 100_000;
const VWAP_QUEUE_CAPACITY: usize = 10_000;
const HEALTH_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, Parser)]
#[command(name = "pricegrid", about = "Cross-exchange price aggregator")]
struct Args {
    /// Exchange registry document.
    #[arg(long, default_value = "config/exchanges.json")]
    exchanges: PathBuf,

    /// Optional service settings file (TOML); environment variables
    /// override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run a symbol-discovery sweep before the first poll cycle.
    #[arg(long)]
    discover: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let settings =
        ServiceSettings::load(args.config.as_deref()).context("loading service settings")?;

    if !settings.service_mode.runs_poller() {
        info!("service mode is api-only; the polling pipeline is not hosted here");
        return Ok(());
    }

    let descriptors = load_registry(&args.exchanges)?;
    let adapters: Vec<Arc<dyn ExchangeAdapter>> = descriptors
        .into_iter()
        .map(|d| RestExchangeAdapter::new(d).map(|a| Arc::new(a) as Arc<dyn ExchangeAdapter>))
        .collect::<adapter_service::Result<_>>()
        .context("building exchange adapters")?;

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&settings.database_url)
        .await
        .context("connecting to the token store")?;
    let tokens: Arc<dyn TokenStore> = Arc::new(PgTokenStore::new(pool));

    let series: Arc<dyn SeriesStore> = Arc::new(ClickHouseSeriesStore::new(
        &settings.clickhouse_url,
        &settings.clickhouse_database,
        &settings.clickhouse_user,
        &settings.clickhouse_password,
    ));

    let resolver = Arc::new(SymbolResolver::new(Arc::clone(&tokens)));
    resolver
        .refresh()
        .await
        .context("initial symbol cache load")?;

    let cancel = CancellationToken::new();
    let refresh_task = Arc::clone(&resolver)
        .spawn_refresh_task(cancel.child_token(), CACHE_REFRESH_INTERVAL);

    let ticker_sink = SinkQueue::new("tickers", TICKER_QUEUE_CAPACITY);
    let vwap_sink = SinkQueue::new("vwap", VWAP_QUEUE_CAPACITY);
    let health_sink = SinkQueue::new("health", HEALTH_QUEUE_CAPACITY);

    let writers = vec![
        {
            let series = Arc::clone(&series);
            ticker_sink.spawn_writer(cancel.child_token(), move |batch| {
                let series = Arc::clone(&series);
                async move { series.write_tickers(&batch).await }
            })
        },
        {
            let series = Arc::clone(&series);
            vwap_sink.spawn_writer(cancel.child_token(), move |batch| {
                let series = Arc::clone(&series);
                async move { series.write_vwap(&batch).await }
            })
        },
        {
            let series = Arc::clone(&series);
            health_sink.spawn_writer(cancel.child_token(), move |batch| {
                let series = Arc::clone(&series);
                async move { series.write_health(&batch).await }
            })
        },
    ];

    let poller = Poller::new(
        adapters,
        Arc::clone(&resolver),
        OutlierDetector::new(OutlierConfig {
            deviation_threshold: settings.outlier_deviation_threshold,
            std_dev_multiplier: settings.outlier_std_dev_multiplier,
        }),
        series,
        tokens,
        ticker_sink,
        vwap_sink,
        health_sink,
        PollerConfig {
            cadence: settings.cadence(),
            deadline: settings.deadline(),
            outlier_window: settings.outlier_window(),
        },
    );

    if args.discover {
        poller.discover_symbols().await;
    }

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    poller.run(cancel.child_token()).await;

    // Give the sink writers their drain grace, then leave.
    cancel.cancel();
    for writer in writers {
        if tokio::time::timeout(Duration::from_secs(6), writer)
            .await
            .is_err()
        {
            warn!("sink writer did not drain within the grace period");
        }
    }
    refresh_task.abort();
    info!("shutdown complete");
    Ok(())
}
