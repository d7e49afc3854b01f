//! Cadence scheduler and poll-cycle orchestration.
//!
//! Every tick fans out one fetch task per schedulable adapter, joins them
//! under the per-call deadline, then runs the merged batch through the
//! resolver, the sinks and the VWAP engine. Ticks never overlap: the
//! interval skips missed ticks and the per-call deadline stays below the
//! cadence. Adapter errors are counted and logged; nothing propagates out
//! of a cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use adapter_service::{AdapterError, ExchangeAdapter, RateLimiter};
use types::{CanonicalTicker, ExchangeId, HealthEvent, MappingMethod, PriceOutlier};

use crate::outlier::OutlierDetector;
use crate::resolver::SymbolResolver;
use crate::sink::SinkQueue;
use crate::storage::{HealthRow, SeriesStore, TickerRow, TokenStore, VwapRow};
use crate::vwap::VwapEngine;

/// Unhealthy adapters are retried every this many ticks.
const UNHEALTHY_RETRY_EVERY: u64 = 3;

/// Extra slack on the outer join timeout so the adapter's own request
/// timeout fires first and records the failure in its health counters.
const JOIN_TIMEOUT_SLACK: Duration = Duration::from_millis(250);

/// Poller tunables.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Tick cadence.
    pub cadence: Duration,
    /// Per-adapter call deadline; strictly below the cadence.
    pub deadline: Duration,
    /// Look-back window handed to the outlier scan.
    pub outlier_window: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(15),
            deadline: Duration::from_secs(10),
            outlier_window: Duration::from_secs(60),
        }
    }
}

/// Cadence scheduler over a set of exchange adapters.
pub struct Poller {
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    resolver: Arc<SymbolResolver>,
    engine: VwapEngine,
    detector: Arc<OutlierDetector>,
    series: Arc<dyn SeriesStore>,
    tokens: Arc<dyn TokenStore>,
    ticker_sink: SinkQueue<TickerRow>,
    vwap_sink: SinkQueue<VwapRow>,
    health_sink: SinkQueue<HealthRow>,
    limiter: RateLimiter,
    config: PollerConfig,
    /// Ticks each unhealthy adapter has sat out, for the every-third retry.
    unhealthy_ticks: Mutex<HashMap<ExchangeId, u64>>,
    /// Guards against overlapping outlier scans when the store is slow.
    scan_in_flight: Arc<AtomicBool>,
}

impl Poller {
    /// Wire up a poller. Exchange weights for the VWAP engine and rate
    /// budgets come from the adapters' descriptors.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        resolver: Arc<SymbolResolver>,
        detector: OutlierDetector,
        series: Arc<dyn SeriesStore>,
        tokens: Arc<dyn TokenStore>,
        ticker_sink: SinkQueue<TickerRow>,
        vwap_sink: SinkQueue<VwapRow>,
        health_sink: SinkQueue<HealthRow>,
        config: PollerConfig,
    ) -> Self {
        let weights = adapters
            .iter()
            .map(|a| (a.descriptor().id.clone(), a.descriptor().weight))
            .collect();
        let mut limiter = RateLimiter::new();
        for adapter in &adapters {
            limiter.configure_exchange(
                adapter.descriptor().id.clone(),
                adapter.descriptor().rate_limit_per_minute,
            );
        }

        Self {
            adapters,
            resolver,
            engine: VwapEngine::new(weights),
            detector: Arc::new(detector),
            series,
            tokens,
            ticker_sink,
            vwap_sink,
            health_sink,
            limiter,
            config,
            unhealthy_ticks: Mutex::new(HashMap::new()),
            scan_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One-off discovery sweep: fetch each venue's symbol list and backfill
    /// pair mappings for everything already resolvable, warming the caches
    /// before the first cadence tick.
    pub async fn discover_symbols(&self) {
        for adapter in &self.adapters {
            let exchange_id = adapter.descriptor().id.clone();
            match adapter.fetch_symbols(self.config.deadline).await {
                Ok(symbols) => {
                    let total = symbols.len();
                    for symbol in symbols.iter().filter(|s| s.is_active) {
                        self.resolver.resolve_discovered(&exchange_id, symbol).await;
                    }
                    info!(exchange = %exchange_id, symbols = total, "symbol discovery complete");
                }
                Err(e) => {
                    warn!(exchange = %exchange_id, error = %e, "symbol discovery failed");
                }
            }
        }
    }

    /// Run the cadence loop until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.cadence);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut tick: u64 = 0;

        info!(
            cadence_secs = self.config.cadence.as_secs(),
            deadline_secs = self.config.deadline.as_secs(),
            adapters = self.adapters.len(),
            "poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    tick += 1;
                    self.run_cycle(tick, &cancel).await;
                }
            }
        }
        info!("poller stopped");
    }

    /// Execute one poll cycle. Public for deterministic driving in tests.
    pub async fn run_cycle(&self, tick: u64, cancel: &CancellationToken) {
        let cycle_started = Instant::now();
        let scheduled = self.schedulable_adapters();
        let scheduled_count = scheduled.len();
        let skipped = self.adapters.len() - scheduled_count;

        let outcomes = self.fan_out(scheduled, cancel).await;
        if cancel.is_cancelled() {
            return;
        }

        let mut merged: Vec<CanonicalTicker> = Vec::new();
        let mut health_rows = Vec::with_capacity(outcomes.len());
        let mut failures = 0usize;
        for (exchange_id, elapsed, outcome) in outcomes {
            let event = match &outcome {
                Ok(tickers) => HealthEvent {
                    timestamp: Utc::now(),
                    exchange_id: exchange_id.clone(),
                    response_time_ms: elapsed.as_millis() as u64,
                    success: true,
                    error_message: None,
                    http_status_code: None,
                    symbols_fetched: tickers.len() as u32,
                },
                Err(e) => {
                    failures += 1;
                    debug!(exchange = %exchange_id, error = %e, "adapter fetch failed");
                    HealthEvent {
                        timestamp: Utc::now(),
                        exchange_id: exchange_id.clone(),
                        response_time_ms: elapsed.as_millis() as u64,
                        success: false,
                        error_message: Some(e.to_string()),
                        http_status_code: e.http_status(),
                        symbols_fetched: 0,
                    }
                }
            };
            health_rows.push(HealthRow::from(&event));
            if let Ok(tickers) = outcome {
                merged.extend(tickers);
            }
        }
        self.health_sink.push_many(health_rows);

        let fetched = merged.len();
        let mut resolved = 0usize;
        for ticker in &mut merged {
            self.resolver.resolve(ticker).await;
            if ticker.is_resolved() {
                resolved += 1;
            }
        }

        // Raw telemetry keeps everything, resolved or not.
        self.ticker_sink
            .push_many(merged.iter().map(TickerRow::from));

        let vwap_results = self.engine.compute(&merged, Utc::now());
        let vwap_count = vwap_results.len();
        self.vwap_sink
            .push_many(vwap_results.iter().map(VwapRow::from));

        self.spawn_outlier_scan(cancel.child_token());

        info!(
            tick,
            polled = scheduled_count,
            skipped,
            failures,
            fetched,
            resolved,
            unresolved = fetched - resolved,
            vwap_pairs = vwap_count,
            elapsed_ms = cycle_started.elapsed().as_millis() as u64,
            "poll cycle complete"
        );
    }

    /// Pick this tick's adapters: healthy ones subject to their rate
    /// budget; unhealthy ones only every third tick.
    fn schedulable_adapters(&self) -> Vec<Arc<dyn ExchangeAdapter>> {
        let mut scheduled = Vec::with_capacity(self.adapters.len());
        let mut unhealthy_ticks = self.unhealthy_ticks.lock();

        for adapter in &self.adapters {
            let id = adapter.descriptor().id.clone();
            if adapter.health().is_healthy {
                unhealthy_ticks.remove(&id);
            } else {
                let sat_out = unhealthy_ticks.entry(id.clone()).or_insert(0);
                *sat_out += 1;
                if *sat_out % UNHEALTHY_RETRY_EVERY != 0 {
                    debug!(exchange = %id, "skipping unhealthy adapter");
                    continue;
                }
                debug!(exchange = %id, "retrying unhealthy adapter");
            }

            if !self.limiter.check(&id) {
                debug!(exchange = %id, "skipping adapter to honor rate budget");
                continue;
            }
            scheduled.push(Arc::clone(adapter));
        }
        scheduled
    }

    /// Fan out one fetch task per adapter and join them all; each task is
    /// bounded by the deadline and aborts on cancellation.
    async fn fan_out(
        &self,
        scheduled: Vec<Arc<dyn ExchangeAdapter>>,
        cancel: &CancellationToken,
    ) -> Vec<(ExchangeId, Duration, Result<Vec<CanonicalTicker>, AdapterError>)> {
        let mut tasks = JoinSet::new();
        for adapter in scheduled {
            let cancel = cancel.clone();
            let deadline = self.config.deadline;
            tasks.spawn(async move {
                let exchange_id = adapter.descriptor().id.clone();
                let started = Instant::now();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => None,
                    fetched = tokio::time::timeout(
                        deadline + JOIN_TIMEOUT_SLACK,
                        adapter.fetch_all_tickers(deadline),
                    ) => Some(fetched.unwrap_or(Err(AdapterError::Timeout {
                        exchange: exchange_id.clone(),
                        timeout_ms: deadline.as_millis() as u64,
                    }))),
                };
                outcome.map(|o| (exchange_id, started.elapsed(), o))
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {} // cancelled mid-flight
                Err(e) => warn!(error = %e, "adapter task panicked"),
            }
        }
        outcomes
    }

    /// Kick off the windowed outlier scan off the hot path. Failures are
    /// logged and never block the next cycle; if the previous scan is still
    /// running this tick's scan is skipped.
    fn spawn_outlier_scan(&self, cancel: CancellationToken) {
        if self.scan_in_flight.swap(true, Ordering::AcqRel) {
            warn!("previous outlier scan still running, skipping this tick");
            return;
        }

        let series = Arc::clone(&self.series);
        let tokens = Arc::clone(&self.tokens);
        let resolver = Arc::clone(&self.resolver);
        let detector = Arc::clone(&self.detector);
        let window = self.config.outlier_window;
        let in_flight = Arc::clone(&self.scan_in_flight);

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = run_outlier_scan(series, tokens, resolver, detector, window) => {}
            }
            in_flight.store(false, Ordering::Release);
        });
    }
}

/// Scan the look-back window and persist qualifying outliers: a flagged
/// entry is only written when its pair mapping was auto-backfilled
/// (`symbol` method); deviations on verified mappings are market
/// conditions, not mis-mappings.
pub async fn run_outlier_scan(
    series: Arc<dyn SeriesStore>,
    tokens: Arc<dyn TokenStore>,
    resolver: Arc<SymbolResolver>,
    detector: Arc<OutlierDetector>,
    window: Duration,
) {
    let samples = match series.latest_pair_prices(window).await {
        Ok(samples) => samples,
        Err(e) => {
            warn!(error = %e, "outlier scan query failed");
            return;
        }
    };

    let candidates = detector.detect(&samples);
    if candidates.is_empty() {
        return;
    }

    let mut persisted = 0usize;
    for candidate in &candidates {
        let method = resolver.mapping_method_for(
            &candidate.exchange_id,
            candidate.base_token_id,
            candidate.quote_token_id,
        );
        if method != Some(MappingMethod::Symbol) {
            continue;
        }

        let outlier = PriceOutlier {
            exchange_id: candidate.exchange_id.clone(),
            base_token_id: candidate.base_token_id,
            quote_token_id: candidate.quote_token_id,
            exchange_price: rust_decimal::Decimal::try_from(candidate.exchange_price)
                .unwrap_or_default(),
            average_price: rust_decimal::Decimal::try_from(candidate.average_price)
                .unwrap_or_default(),
            deviation_percent: candidate.deviation_percent,
            std_deviations: candidate.std_deviations,
            mapping_method: MappingMethod::Symbol,
            detected_at: Utc::now(),
            is_resolved: false,
        };
        match tokens.insert_outlier(&outlier).await {
            Ok(()) => persisted += 1,
            Err(e) => warn!(
                exchange = %candidate.exchange_id,
                error = %e,
                "outlier persistence failed"
            ),
        }
    }

    info!(
        flagged = candidates.len(),
        persisted, "outlier scan complete"
    );
}
