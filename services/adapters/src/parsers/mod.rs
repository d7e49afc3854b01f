//! Vendor response parsers.
//!
//! Each venue family gets a [`ResponseParser`] implementation; the long tail
//! is handled by [`UnifiedParser`], which probes common payload shapes and
//! scans ordered field-candidate lists instead of growing per-venue code
//! paths. The candidate lists are data, not logic: extend them before
//! writing a new parser.

mod binance;
mod bybit;
mod coinbase;
mod data_wrapped;
mod kraken;
mod symbol_map;
mod unified;

pub use binance::BinanceParser;
pub use bybit::BybitParser;
pub use coinbase::CoinbaseParser;
pub use data_wrapped::DataWrappedParser;
pub use kraken::KrakenParser;
pub use symbol_map::SymbolMapParser;
pub use unified::UnifiedParser;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use crate::error::{AdapterError, Result};
use crate::symbol::parse_symbol_pair;

/// Field candidates for the pair symbol, scanned in order.
pub const SYMBOL_FIELDS: [&str; 7] =
    ["symbol", "Symbol", "pair", "market", "instId", "ticker_id", "id"];
/// Field candidates for the last price; the first positive decimal wins.
pub const PRICE_FIELDS: [&str; 6] =
    ["last", "lastPrice", "last_price", "price", "close", "lastTrade"];
/// Field candidates for 24h base volume.
pub const VOLUME_FIELDS: [&str; 6] =
    ["volume", "vol", "volume_24h", "baseVolume", "base_volume", "vol24h"];
/// Field candidates for 24h quote volume.
pub const QUOTE_VOLUME_FIELDS: [&str; 5] =
    ["quoteVolume", "quote_volume", "volCcy", "volume_usd", "quoteVol"];
/// Field candidates for 24h price change; any decimal is accepted.
pub const CHANGE_FIELDS: [&str; 4] =
    ["priceChange", "price_change", "change", "priceChange24h"];
/// Field candidates for the 24h high.
pub const HIGH_FIELDS: [&str; 5] = ["high", "highPrice", "high_24h", "high24h", "h"];
/// Field candidates for the 24h low.
pub const LOW_FIELDS: [&str; 5] = ["low", "lowPrice", "low_24h", "low24h", "l"];

/// Decodes one vendor response body into canonical records.
///
/// Implementations must be stateless: the same body and descriptor always
/// produce the same output. A structurally unexpected body is a
/// [`AdapterError::Decode`]; individual records that merely lack a positive
/// price are skipped, not errors.
pub trait ResponseParser: Send + Sync {
    /// Parse an all-tickers response.
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>>;

    /// Parse a symbol-discovery response.
    fn parse_symbols(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<ExchangeSymbol>>;
}

static BINANCE: BinanceParser = BinanceParser;
static COINBASE: CoinbaseParser = CoinbaseParser;
static KRAKEN: KrakenParser = KrakenParser;
static BYBIT: BybitParser = BybitParser;
static SYMBOL_MAP: SymbolMapParser = SymbolMapParser;
static DATA_WRAPPED: DataWrappedParser = DataWrappedParser;
static UNIFIED: UnifiedParser = UnifiedParser;

/// Select the parser for a venue slug; unknown venues get the unified parser.
pub fn parser_for(exchange_id: &types::ExchangeId) -> &'static dyn ResponseParser {
    match exchange_id.as_str() {
        "binance" => &BINANCE,
        "coinbase" => &COINBASE,
        "kraken" => &KRAKEN,
        "bybit" => &BYBIT,
        "whitebit" | "coinw" => &SYMBOL_MAP,
        "bitmart" | "kucoin" | "pionex" => &DATA_WRAPPED,
        _ => &UNIFIED,
    }
}

/// Decode the body as JSON or fail with a venue-tagged error.
pub(crate) fn decode_json(body: &[u8], exchange: &ExchangeDescriptor) -> Result<Value> {
    serde_json::from_slice(body).map_err(|e| AdapterError::Decode {
        exchange: exchange.id.clone(),
        error: e.to_string(),
    })
}

/// Parse a JSON value as a decimal: strings (plain or scientific) and
/// numbers both qualify; everything else is not a decimal.
pub(crate) fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<Decimal>().ok().or_else(|| Decimal::from_scientific(s).ok())
        }
        Value::Number(n) => {
            let repr = n.to_string();
            repr.parse::<Decimal>()
                .ok()
                .or_else(|| Decimal::from_scientific(&repr).ok())
        }
        _ => None,
    }
}

/// First candidate field that parses as any decimal.
pub(crate) fn decimal_field(record: &Value, candidates: &[&str]) -> Option<Decimal> {
    candidates
        .iter()
        .filter_map(|key| record.get(key))
        .find_map(value_to_decimal)
}

/// First candidate field that parses as a positive decimal.
pub(crate) fn positive_decimal_field(record: &Value, candidates: &[&str]) -> Option<Decimal> {
    candidates
        .iter()
        .filter_map(|key| record.get(key))
        .filter_map(value_to_decimal)
        .find(|d| *d > Decimal::ZERO)
}

/// First candidate field holding a non-empty string.
pub(crate) fn string_field(record: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|key| record.get(key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// A vendor record reduced to the fields the pipeline cares about, before
/// symbol splitting.
pub(crate) struct RawRecord {
    pub symbol: String,
    pub price: Decimal,
    pub volume: Decimal,
    pub quote_volume: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub change: Option<Decimal>,
    /// Base/quote if the vendor states them explicitly; otherwise derived
    /// from the symbol via `parse_symbol_pair`.
    pub base: Option<String>,
    pub quote: Option<String>,
}

/// Extract a record using the candidate lists. Returns `None` when no
/// symbol or no positive price is present; such records are skipped.
pub(crate) fn extract_record(record: &Value, symbol_hint: Option<&str>) -> Option<RawRecord> {
    let symbol = match symbol_hint {
        Some(s) => s.to_string(),
        None => string_field(record, &SYMBOL_FIELDS)?,
    };
    let price = positive_decimal_field(record, &PRICE_FIELDS)?;

    Some(RawRecord {
        symbol,
        price,
        volume: decimal_field(record, &VOLUME_FIELDS).unwrap_or(Decimal::ZERO),
        quote_volume: decimal_field(record, &QUOTE_VOLUME_FIELDS),
        high: decimal_field(record, &HIGH_FIELDS),
        low: decimal_field(record, &LOW_FIELDS),
        change: decimal_field(record, &CHANGE_FIELDS),
        base: None,
        quote: None,
    })
}

/// Turn a raw record into a canonical ticker, splitting the symbol when the
/// vendor did not state the legs. Non-positive prices never reach this point.
pub(crate) fn finish_record(raw: RawRecord, exchange: &ExchangeDescriptor) -> CanonicalTicker {
    let (base, quote) = match (raw.base, raw.quote) {
        (Some(b), Some(q)) => (b.to_uppercase(), q.to_uppercase()),
        _ => parse_symbol_pair(&raw.symbol, exchange.symbol_format, &exchange.quote_currencies),
    };

    CanonicalTicker {
        exchange_id: exchange.id.clone(),
        raw_symbol: raw.symbol,
        base_symbol: base,
        quote_symbol: quote,
        base_token_id: 0,
        quote_token_id: 0,
        price: raw.price,
        volume_24h: raw.volume,
        quote_volume_24h: raw.quote_volume,
        high_24h: raw.high,
        low_24h: raw.low,
        price_change_24h: raw.change,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::time::Duration;

    use rust_decimal_macros::dec;
    use types::{ExchangeDescriptor, ExchangeId, SymbolFormat};

    pub fn descriptor(id: &str, format: SymbolFormat) -> ExchangeDescriptor {
        ExchangeDescriptor {
            id: ExchangeId::new(id),
            display_name: id.to_string(),
            base_url: format!("https://api.{id}.example"),
            ticker_path: "/tickers".into(),
            symbols_path: "/symbols".into(),
            rate_limit_per_minute: 600,
            request_timeout: Duration::from_secs(5),
            retry_attempts: 3,
            weight: dec!(0.1),
            symbol_format: format,
            quote_currencies: vec![
                "USDT".into(),
                "USDC".into(),
                "USD".into(),
                "EUR".into(),
                "TRY".into(),
                "BTC".into(),
                "ETH".into(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn value_to_decimal_handles_strings_numbers_and_scientific() {
        assert_eq!(value_to_decimal(&json!("50000.25")), Some(dec!(50000.25)));
        assert_eq!(value_to_decimal(&json!(42)), Some(dec!(42)));
        assert_eq!(value_to_decimal(&json!(0.5)), Some(dec!(0.5)));
        assert_eq!(value_to_decimal(&json!("1.2e-5")), Some(dec!(0.000012)));
        assert_eq!(value_to_decimal(&json!(null)), None);
        assert_eq!(value_to_decimal(&json!("n/a")), None);
    }

    #[test]
    fn price_scan_skips_non_positive_candidates() {
        // "last" parses but is zero; "price" provides the first positive hit.
        let record = json!({"last": "0", "price": "3.5"});
        assert_eq!(positive_decimal_field(&record, &PRICE_FIELDS), Some(dec!(3.5)));
    }

    #[test]
    fn candidate_order_is_respected() {
        let record = json!({"lastPrice": "2", "last": "1"});
        assert_eq!(positive_decimal_field(&record, &PRICE_FIELDS), Some(dec!(1)));

        let record = json!({"vol": "7", "volume": "9"});
        assert_eq!(decimal_field(&record, &VOLUME_FIELDS), Some(dec!(9)));
    }

    #[test]
    fn change_accepts_negative_decimals() {
        let record = json!({"priceChange": "-12.5"});
        assert_eq!(decimal_field(&record, &CHANGE_FIELDS), Some(dec!(-12.5)));
    }

    #[test]
    fn records_without_positive_price_are_skipped() {
        assert!(extract_record(&json!({"symbol": "BTCUSDT", "last": "-1"}), None).is_none());
        assert!(extract_record(&json!({"last": "100"}), None).is_none());
    }

    #[test]
    fn unknown_exchange_uses_unified_parser() {
        // Identity check against the static instances is the cheapest proof.
        let unified = parser_for(&types::ExchangeId::new("somedex"));
        let binance = parser_for(&types::ExchangeId::new("binance"));
        assert!(!std::ptr::eq(
            unified as *const dyn ResponseParser as *const (),
            binance as *const dyn ResponseParser as *const ()
        ));
    }
}
