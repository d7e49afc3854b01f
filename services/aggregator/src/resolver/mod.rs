//! Symbol resolution: `(exchange, symbol)` to stable token ids.
//!
//! Lookup order per ticker: trading-pair mapping, then per-leg symbol
//! mappings, then normalized-symbol match against the token table. Any
//! successful fallback backfills the missing mapping as low-confidence
//! (`symbol`, 0.5, needs verification) so the next cycle takes the fast
//! path.
//!
//! All three caches live behind one reader-writer lock. The lock is never
//! held across I/O: reads snapshot what they need, the refresh task builds
//! a complete replacement off-lock and only takes the writer for the swap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use adapter_service::normalization_candidates;
use types::{
    CanonicalTicker, ExchangeId, ExchangeSymbol, MappingMethod, SymbolMapping, TokenId,
    TradingPairMapping, UNRESOLVED_TOKEN,
};

use crate::storage::{StoreError, TokenStore};

/// How often the caches are rebuilt from the authoritative store.
pub const CACHE_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Cached pair entry, with the mapping method kept for the outlier gate.
#[derive(Debug, Clone, Copy)]
struct PairEntry {
    base: TokenId,
    quote: TokenId,
    method: MappingMethod,
}

#[derive(Default)]
struct ResolverCaches {
    /// `(exchange, exchange_symbol) -> token_id`
    symbol: HashMap<(ExchangeId, String), TokenId>,
    /// `(exchange, pair_symbol) -> (base, quote, method)`
    pair: HashMap<(ExchangeId, String), PairEntry>,
    /// `normalized_symbol -> token_id`
    normalized: HashMap<String, TokenId>,
    /// Reverse index for the outlier detector's method gate.
    method_by_ids: HashMap<(ExchangeId, TokenId, TokenId), MappingMethod>,
}

/// Outcome of resolving one leg, remembering whether a symbol-mapping
/// backfill is owed.
#[derive(Clone)]
struct LegResolution {
    token_id: TokenId,
    backfill: Option<SymbolMapping>,
}

/// Maps venue symbols to token ids with caching and backfill-on-miss.
pub struct SymbolResolver {
    store: Arc<dyn TokenStore>,
    caches: RwLock<ResolverCaches>,
}

impl SymbolResolver {
    /// Resolver with empty caches; call [`refresh`](Self::refresh) before
    /// the first cycle.
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            caches: RwLock::new(ResolverCaches::default()),
        }
    }

    /// Rebuild all caches from the store. On failure the previous caches
    /// stay intact.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let tokens = self.store.load_tokens().await?;
        let symbol_mappings = self.store.load_symbol_mappings().await?;
        let pair_mappings = self.store.load_pair_mappings().await?;

        let mut fresh = ResolverCaches::default();
        for token in &tokens {
            fresh
                .normalized
                .insert(token.symbol.to_uppercase(), token.token_id);
        }
        for m in &symbol_mappings {
            fresh
                .symbol
                .insert((m.exchange_id.clone(), m.exchange_symbol.clone()), m.token_id);
        }
        for p in &pair_mappings {
            fresh.pair.insert(
                (p.exchange_id.clone(), p.exchange_pair_symbol.clone()),
                PairEntry {
                    base: p.base_token_id,
                    quote: p.quote_token_id,
                    method: p.mapping_method,
                },
            );
            fresh.method_by_ids.insert(
                (p.exchange_id.clone(), p.base_token_id, p.quote_token_id),
                p.mapping_method,
            );
        }

        let (tokens_n, symbols_n, pairs_n) =
            (tokens.len(), symbol_mappings.len(), pair_mappings.len());
        *self.caches.write() = fresh;
        info!(
            tokens = tokens_n,
            symbol_mappings = symbols_n,
            pair_mappings = pairs_n,
            "symbol caches refreshed"
        );
        Ok(())
    }

    /// Spawn the periodic cache refresh; failures are logged and the stale
    /// cache keeps serving.
    pub fn spawn_refresh_task(
        self: Arc<Self>,
        cancel: CancellationToken,
        every: Duration,
    ) -> JoinHandle<()> {
        let resolver = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // immediate first tick consumed
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = resolver.refresh().await {
                            warn!(error = %e, "cache refresh failed, keeping previous caches");
                        }
                    }
                }
            }
        })
    }

    /// Resolve one ticker's token ids in place. Unresolvable tickers keep
    /// `(0, 0)` and are excluded from VWAP downstream.
    pub async fn resolve(&self, ticker: &mut CanonicalTicker) {
        if ticker.base_symbol.is_empty() || ticker.quote_symbol.is_empty() {
            return;
        }

        // Fast path: the pair mapping is cached.
        {
            let caches = self.caches.read();
            if let Some(entry) = caches
                .pair
                .get(&(ticker.exchange_id.clone(), ticker.raw_symbol.clone()))
            {
                ticker.base_token_id = entry.base;
                ticker.quote_token_id = entry.quote;
                return;
            }
        }

        // Per-leg resolution (cache reads only; the guard is dropped before
        // any store call below).
        let (base_leg, quote_leg) = {
            let caches = self.caches.read();
            (
                self.resolve_leg(&caches, &ticker.exchange_id, &ticker.base_symbol),
                self.resolve_leg(&caches, &ticker.exchange_id, &ticker.quote_symbol),
            )
        };

        let (Some(base_leg), Some(quote_leg)) = (base_leg, quote_leg) else {
            debug!(
                exchange = %ticker.exchange_id,
                symbol = %ticker.raw_symbol,
                "symbol unresolved"
            );
            return;
        };

        ticker.base_token_id = base_leg.token_id;
        ticker.quote_token_id = quote_leg.token_id;

        self.backfill(
            &ticker.exchange_id,
            &ticker.raw_symbol,
            base_leg,
            quote_leg,
            Some(ticker.volume_24h),
        )
        .await;
    }

    /// Resolve a discovered symbol (startup sweep), backfilling the pair
    /// mapping when both legs are known.
    pub async fn resolve_discovered(&self, exchange_id: &ExchangeId, symbol: &ExchangeSymbol) {
        {
            let caches = self.caches.read();
            if caches
                .pair
                .contains_key(&(exchange_id.clone(), symbol.symbol.clone()))
            {
                return;
            }
        }

        let (base_leg, quote_leg) = {
            let caches = self.caches.read();
            (
                self.resolve_leg(&caches, exchange_id, &symbol.base_asset),
                self.resolve_leg(&caches, exchange_id, &symbol.quote_asset),
            )
        };
        if let (Some(base_leg), Some(quote_leg)) = (base_leg, quote_leg) {
            self.backfill(exchange_id, &symbol.symbol, base_leg, quote_leg, None)
                .await;
        }
    }

    /// One leg: symbol-mapping cache first, then normalized candidates
    /// against the token table.
    fn resolve_leg(
        &self,
        caches: &ResolverCaches,
        exchange_id: &ExchangeId,
        leg_symbol: &str,
    ) -> Option<LegResolution> {
        if let Some(&token_id) = caches
            .symbol
            .get(&(exchange_id.clone(), leg_symbol.to_string()))
        {
            return Some(LegResolution {
                token_id,
                backfill: None,
            });
        }

        for candidate in normalization_candidates(leg_symbol) {
            if let Some(&token_id) = caches.normalized.get(&candidate) {
                return Some(LegResolution {
                    token_id,
                    backfill: Some(SymbolMapping::backfilled(
                        token_id,
                        exchange_id.clone(),
                        leg_symbol.to_string(),
                        candidate,
                    )),
                });
            }
        }
        None
    }

    /// Persist backfills, then update the caches under one writer lock so a
    /// concurrent reader never sees a half-applied mapping.
    async fn backfill(
        &self,
        exchange_id: &ExchangeId,
        pair_symbol: &str,
        base_leg: LegResolution,
        quote_leg: LegResolution,
        volume: Option<rust_decimal::Decimal>,
    ) {
        for leg in [&base_leg, &quote_leg] {
            if let Some(mapping) = &leg.backfill {
                if let Err(e) = self.store.upsert_symbol_mapping(mapping).await {
                    warn!(
                        exchange = %exchange_id,
                        symbol = %mapping.exchange_symbol,
                        error = %e,
                        "symbol mapping backfill failed"
                    );
                    return;
                }
            }
        }

        let mut pair = TradingPairMapping::backfilled(
            base_leg.token_id,
            quote_leg.token_id,
            exchange_id.clone(),
            pair_symbol.to_string(),
        );
        pair.last_volume_24h = volume;
        if let Err(e) = self.store.upsert_pair_mapping(&pair).await {
            warn!(
                exchange = %exchange_id,
                symbol = %pair_symbol,
                error = %e,
                "pair mapping backfill failed"
            );
            return;
        }

        let mut caches = self.caches.write();
        for leg in [&base_leg, &quote_leg] {
            if let Some(mapping) = &leg.backfill {
                caches.symbol.insert(
                    (exchange_id.clone(), mapping.exchange_symbol.clone()),
                    mapping.token_id,
                );
            }
        }
        caches.pair.insert(
            (exchange_id.clone(), pair_symbol.to_string()),
            PairEntry {
                base: base_leg.token_id,
                quote: quote_leg.token_id,
                method: MappingMethod::Symbol,
            },
        );
        caches.method_by_ids.insert(
            (exchange_id.clone(), base_leg.token_id, quote_leg.token_id),
            MappingMethod::Symbol,
        );
    }

    /// Register an operator-provided symbol mapping: upsert, then update
    /// the caches atomically. Idempotent.
    pub async fn add_symbol_mapping(
        &self,
        token_id: TokenId,
        exchange_id: ExchangeId,
        exchange_symbol: String,
        normalized_symbol: String,
    ) -> Result<(), StoreError> {
        let mapping = SymbolMapping {
            token_id,
            exchange_id: exchange_id.clone(),
            exchange_symbol: exchange_symbol.clone(),
            normalized_symbol,
            mapping_method: MappingMethod::Manual,
            confidence_score: rust_decimal::Decimal::ONE,
            needs_verification: false,
            verified_by: None,
            verified_at: None,
        };
        self.store.upsert_symbol_mapping(&mapping).await?;
        self.caches
            .write()
            .symbol
            .insert((exchange_id, exchange_symbol), token_id);
        Ok(())
    }

    /// Register an operator-provided trading pair. Idempotent.
    pub async fn add_trading_pair(
        &self,
        base_token_id: TokenId,
        quote_token_id: TokenId,
        exchange_id: ExchangeId,
        pair_symbol: String,
    ) -> Result<(), StoreError> {
        let mapping = TradingPairMapping {
            base_token_id,
            quote_token_id,
            exchange_id: exchange_id.clone(),
            exchange_pair_symbol: pair_symbol.clone(),
            mapping_method: MappingMethod::Manual,
            confidence_score: rust_decimal::Decimal::ONE,
            needs_verification: false,
            last_volume_24h: None,
        };
        self.store.upsert_pair_mapping(&mapping).await?;

        let mut caches = self.caches.write();
        caches.pair.insert(
            (exchange_id.clone(), pair_symbol),
            PairEntry {
                base: base_token_id,
                quote: quote_token_id,
                method: MappingMethod::Manual,
            },
        );
        caches.method_by_ids.insert(
            (exchange_id, base_token_id, quote_token_id),
            MappingMethod::Manual,
        );
        Ok(())
    }

    /// Mapping method behind a resolved pair, for the outlier gate.
    pub fn mapping_method_for(
        &self,
        exchange_id: &ExchangeId,
        base_token_id: TokenId,
        quote_token_id: TokenId,
    ) -> Option<MappingMethod> {
        self.caches
            .read()
            .method_by_ids
            .get(&(exchange_id.clone(), base_token_id, quote_token_id))
            .copied()
    }

    /// Whether a pair symbol currently hits the fast path.
    pub fn is_pair_cached(&self, exchange_id: &ExchangeId, pair_symbol: &str) -> bool {
        self.caches
            .read()
            .pair
            .contains_key(&(exchange_id.clone(), pair_symbol.to_string()))
    }
}

/// `(0, 0)` marker check for callers that count unresolved tickers.
pub fn is_unresolved(ticker: &CanonicalTicker) -> bool {
    ticker.base_token_id == UNRESOLVED_TOKEN || ticker.quote_token_id == UNRESOLVED_TOKEN
}
