//! Cross-exchange VWAP computation.
//!
//! Stateless per invocation: the engine receives one cycle's resolved
//! tickers and returns one result per `(base, quote)` pair that at least
//! two distinct exchanges reported. All arithmetic stays in `Decimal`;
//! the only rounding is the final 8-decimal half-even quantization.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use types::{CanonicalTicker, ExchangeId, TokenId, VwapResult};

/// Decimal places of the emitted VWAP price.
const VWAP_SCALE: u32 = 8;

/// Tunables for the per-group algorithm.
#[derive(Debug, Clone)]
pub struct VwapConfig {
    /// Relative distance from the group mean beyond which an entry is
    /// trimmed (fraction of the mean).
    pub trim_threshold: Decimal,
    /// Minimum distinct exchanges for a group to emit a result.
    pub min_exchanges: usize,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            trim_threshold: Decimal::new(1, 1), // 10%
            min_exchanges: 2,
        }
    }
}

/// Volume-weighted average price engine.
pub struct VwapEngine {
    config: VwapConfig,
    weights: HashMap<ExchangeId, Decimal>,
}

impl VwapEngine {
    /// Engine with default thresholds and the given per-exchange weights.
    pub fn new(weights: HashMap<ExchangeId, Decimal>) -> Self {
        Self::with_config(weights, VwapConfig::default())
    }

    /// Engine with explicit thresholds.
    pub fn with_config(weights: HashMap<ExchangeId, Decimal>, config: VwapConfig) -> Self {
        Self { config, weights }
    }

    fn weight_for(&self, exchange: &ExchangeId) -> Decimal {
        self.weights.get(exchange).copied().unwrap_or(Decimal::ONE)
    }

    /// Compute one VWAP per pair from this cycle's tickers.
    ///
    /// Output order is deterministic (ascending by token-id pair), and the
    /// same input batch always produces identical output.
    pub fn compute(&self, tickers: &[CanonicalTicker], now: DateTime<Utc>) -> Vec<VwapResult> {
        let mut groups: BTreeMap<(TokenId, TokenId), Vec<&CanonicalTicker>> = BTreeMap::new();
        for ticker in tickers {
            if ticker.is_vwap_eligible() {
                groups
                    .entry((ticker.base_token_id, ticker.quote_token_id))
                    .or_default()
                    .push(ticker);
            }
        }

        groups
            .into_iter()
            .filter_map(|((base, quote), members)| self.combine_group(base, quote, members, now))
            .collect()
    }

    fn combine_group(
        &self,
        base: TokenId,
        quote: TokenId,
        members: Vec<&CanonicalTicker>,
        now: DateTime<Utc>,
    ) -> Option<VwapResult> {
        // One entry per exchange: duplicates keep the larger volume.
        let mut per_exchange: BTreeMap<&ExchangeId, &CanonicalTicker> = BTreeMap::new();
        for ticker in members {
            per_exchange
                .entry(&ticker.exchange_id)
                .and_modify(|kept| {
                    if ticker.volume_24h > kept.volume_24h {
                        *kept = ticker;
                    }
                })
                .or_insert(ticker);
        }

        if per_exchange.len() < self.config.min_exchanges {
            return None;
        }

        let deduped: Vec<&CanonicalTicker> = per_exchange.into_values().collect();
        let total_volume: Decimal = deduped.iter().map(|t| t.volume_24h).sum();

        let kept = self.trim_outliers(&deduped);

        let mut weighted_sum = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        let mut unweighted_sum = Decimal::ZERO;
        let mut unweighted_volume = Decimal::ZERO;
        for ticker in &kept {
            let weight = self.weight_for(&ticker.exchange_id);
            weighted_sum += ticker.price * ticker.volume_24h * weight;
            total_weight += ticker.volume_24h * weight;
            unweighted_sum += ticker.price * ticker.volume_24h;
            unweighted_volume += ticker.volume_24h;
        }

        let vwap = if !total_weight.is_zero() {
            weighted_sum / total_weight
        } else if !unweighted_volume.is_zero() {
            unweighted_sum / unweighted_volume
        } else {
            return None;
        };

        let contributing: Vec<ExchangeId> =
            kept.iter().map(|t| t.exchange_id.clone()).collect();

        Some(VwapResult {
            base_token_id: base,
            quote_token_id: quote,
            timestamp: now,
            vwap_price: vwap.round_dp_with_strategy(VWAP_SCALE, RoundingStrategy::MidpointNearestEven),
            total_volume,
            exchange_count: contributing.len() as u32,
            contributing_exchanges: contributing,
        })
    }

    /// Drop entries farther than `trim_threshold * mean` from the arithmetic
    /// mean, but only for groups of 3+; revert if more than half would go.
    fn trim_outliers<'t>(&self, entries: &[&'t CanonicalTicker]) -> Vec<&'t CanonicalTicker> {
        if entries.len() < 3 {
            return entries.to_vec();
        }

        let count = Decimal::from(entries.len());
        let mean: Decimal = entries.iter().map(|t| t.price).sum::<Decimal>() / count;
        let threshold = self.config.trim_threshold * mean;

        let kept: Vec<&CanonicalTicker> = entries
            .iter()
            .copied()
            .filter(|t| (t.price - mean).abs() <= threshold)
            .collect();

        let dropped = entries.len() - kept.len();
        if dropped * 2 > entries.len() {
            entries.to_vec()
        } else {
            kept
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ticker(
        exchange: &str,
        base: TokenId,
        quote: TokenId,
        price: Decimal,
        volume: Decimal,
    ) -> CanonicalTicker {
        CanonicalTicker {
            exchange_id: ExchangeId::new(exchange),
            raw_symbol: "PAIR".into(),
            base_symbol: "BASE".into(),
            quote_symbol: "QUOTE".into(),
            base_token_id: base,
            quote_token_id: quote,
            price,
            volume_24h: volume,
            quote_volume_24h: None,
            high_24h: None,
            low_24h: None,
            price_change_24h: None,
            timestamp: Utc::now(),
        }
    }

    fn engine(weights: &[(&str, Decimal)]) -> VwapEngine {
        VwapEngine::new(
            weights
                .iter()
                .map(|(id, w)| (ExchangeId::new(id), *w))
                .collect(),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn two_exchange_weighted_mean() {
        // A at 50000 vol 10 weight 0.10; B at 50100 vol 20 weight 0.05.
        let engine = engine(&[("a", dec!(0.10)), ("b", dec!(0.05))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(50000), dec!(10)),
            ticker("b", 1, 2, dec!(50100), dec!(20)),
        ];
        let results = engine.compute(&tickers, now());
        assert_eq!(results.len(), 1);

        let r = &results[0];
        assert_eq!(r.vwap_price, dec!(50050));
        assert_eq!(r.exchange_count, 2);
        assert_eq!(r.total_volume, dec!(30));
        assert_eq!(
            r.contributing_exchanges,
            vec![ExchangeId::new("a"), ExchangeId::new("b")]
        );
    }

    #[test]
    fn single_exchange_groups_are_skipped() {
        let engine = engine(&[("a", dec!(0.1))]);
        let tickers = vec![ticker("a", 1, 2, dec!(100), dec!(5))];
        assert!(engine.compute(&tickers, now()).is_empty());
    }

    #[test]
    fn deviating_entry_is_trimmed_in_groups_of_three() {
        // 3000, 3005, 3500: mean 3168.33, threshold 316.83; 3500 goes.
        let engine = engine(&[("a", dec!(0.05)), ("b", dec!(0.05)), ("c", dec!(0.05))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(3000), dec!(10)),
            ticker("b", 1, 2, dec!(3005), dec!(10)),
            ticker("c", 1, 2, dec!(3500), dec!(10)),
        ];
        let results = engine.compute(&tickers, now());
        assert_eq!(results.len(), 1);

        let r = &results[0];
        assert_eq!(r.vwap_price, dec!(3002.5));
        assert_eq!(r.exchange_count, 2);
        // total_volume counts the deduplicated set before trimming.
        assert_eq!(r.total_volume, dec!(30));
        assert!(!r.contributing_exchanges.contains(&ExchangeId::new("c")));
    }

    #[test]
    fn trim_reverts_when_it_would_drop_more_than_half() {
        // Mean of (100, 200, 300) is 200; threshold 20; both 100 and 300
        // deviate, which would drop 2 of 3, so all three must be kept.
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1)), ("c", dec!(0.1))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(100), dec!(1)),
            ticker("b", 1, 2, dec!(200), dec!(1)),
            ticker("c", 1, 2, dec!(300), dec!(1)),
        ];
        let results = engine.compute(&tickers, now());
        assert_eq!(results[0].exchange_count, 3);
        assert_eq!(results[0].vwap_price, dec!(200));
    }

    #[test]
    fn two_exchanges_never_trim() {
        // Wildly different prices, but trim only engages at 3+ entries.
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(100), dec!(1)),
            ticker("b", 1, 2, dec!(1000), dec!(1)),
        ];
        let results = engine.compute(&tickers, now());
        assert_eq!(results[0].exchange_count, 2);
        assert_eq!(results[0].vwap_price, dec!(550));
    }

    #[test]
    fn duplicate_exchange_keeps_larger_volume() {
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(100), dec!(1)),
            ticker("a", 1, 2, dec!(110), dec!(9)),
            ticker("b", 1, 2, dec!(110), dec!(9)),
        ];
        let results = engine.compute(&tickers, now());
        let r = &results[0];
        assert_eq!(r.exchange_count, 2);
        // The vol-1 duplicate is gone: both kept entries price at 110.
        assert_eq!(r.vwap_price, dec!(110));
        assert_eq!(r.total_volume, dec!(18));
    }

    #[test]
    fn invalid_tickers_never_reach_the_combine_step() {
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1))]);
        let mut negative = ticker("a", 1, 2, dec!(-5), dec!(10));
        negative.price = dec!(-5);
        let tickers = vec![
            negative,
            ticker("a", 1, 2, dec!(0), dec!(10)),
            ticker("b", 1, 2, dec!(100), dec!(0)),
            ticker("b", 1, 2, dec!(2000000), dec!(10)),
        ];
        assert!(engine.compute(&tickers, now()).is_empty());
    }

    #[test]
    fn zero_weight_falls_back_to_plain_volume_weighting() {
        let engine = engine(&[("a", dec!(0)), ("b", dec!(0))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(100), dec!(10)),
            ticker("b", 1, 2, dec!(200), dec!(30)),
        ];
        let results = engine.compute(&tickers, now());
        // (100*10 + 200*30) / 40 = 175
        assert_eq!(results[0].vwap_price, dec!(175));
    }

    #[test]
    fn vwap_is_quantized_to_eight_decimals() {
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(1), dec!(1)),
            ticker("b", 1, 2, dec!(2), dec!(2)),
        ];
        let results = engine.compute(&tickers, now());
        // (1*1 + 2*2) / 3 = 5/3 = 1.666...
        let r = &results[0];
        assert_eq!(r.vwap_price, dec!(1.66666667));
        assert_eq!(r.vwap_price.round_dp(8), r.vwap_price);
    }

    #[test]
    fn groups_are_independent_and_ordered() {
        let engine = engine(&[("a", dec!(0.1)), ("b", dec!(0.1))]);
        let tickers = vec![
            ticker("a", 3, 4, dec!(10), dec!(1)),
            ticker("b", 3, 4, dec!(10), dec!(1)),
            ticker("a", 1, 2, dec!(20), dec!(1)),
            ticker("b", 1, 2, dec!(20), dec!(1)),
        ];
        let results = engine.compute(&tickers, now());
        assert_eq!(results.len(), 2);
        assert_eq!(
            (results[0].base_token_id, results[0].quote_token_id),
            (1, 2)
        );
        assert_eq!(
            (results[1].base_token_id, results[1].quote_token_id),
            (3, 4)
        );
    }

    #[test]
    fn identical_input_is_byte_identical_output() {
        let engine = engine(&[("a", dec!(0.07)), ("b", dec!(0.13)), ("c", dec!(0.05))]);
        let tickers = vec![
            ticker("a", 1, 2, dec!(49999.12345678), dec!(17.5)),
            ticker("b", 1, 2, dec!(50001.87654321), dec!(3.25)),
            ticker("c", 1, 2, dec!(50000.5), dec!(8)),
        ];
        let first = engine.compute(&tickers, now());
        let second = engine.compute(&tickers, now());
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
