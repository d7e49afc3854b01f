//! Binance-family parser.
//!
//! Ticker payloads are either a top-level array of 24h ticker objects or an
//! `exchangeInfo`-style object with a `symbols` array; both spell fields the
//! same way (`symbol`, `lastPrice`, `volume`, `quoteVolume`, ...). Symbol
//! discovery reads `baseAsset`/`quoteAsset` directly so no splitting
//! heuristics are involved.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, extract_record, finish_record, string_field, ResponseParser};
use crate::error::{AdapterError, Result};

/// Parser for Binance and API-compatible venues.
pub struct BinanceParser;

impl BinanceParser {
    fn ticker_records(value: &Value) -> Option<&Vec<Value>> {
        match value {
            Value::Array(items) => Some(items),
            Value::Object(map) => map.get("symbols").and_then(Value::as_array),
            _ => None,
        }
    }
}

impl ResponseParser for BinanceParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let records = Self::ticker_records(&value).ok_or_else(|| AdapterError::Decode {
            exchange: exchange.id.clone(),
            error: "expected ticker array or object with symbols".into(),
        })?;

        let mut tickers = Vec::with_capacity(records.len());
        for record in records {
            let Some(mut raw) = extract_record(record, None) else {
                continue;
            };
            // exchangeInfo-style entries state the legs outright.
            raw.base = string_field(record, &["baseAsset"]);
            raw.quote = string_field(record, &["quoteAsset"]);
            tickers.push(finish_record(raw, exchange));
        }
        Ok(tickers)
    }

    fn parse_symbols(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<ExchangeSymbol>> {
        let value = decode_json(body, exchange)?;
        let records = value
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::Decode {
                exchange: exchange.id.clone(),
                error: "expected object with symbols array".into(),
            })?;

        let mut symbols = Vec::with_capacity(records.len());
        for record in records {
            let (Some(symbol), Some(base), Some(quote)) = (
                string_field(record, &["symbol"]),
                string_field(record, &["baseAsset"]),
                string_field(record, &["quoteAsset"]),
            ) else {
                continue;
            };
            let is_active = record
                .get("status")
                .and_then(Value::as_str)
                .map(|s| s == "TRADING")
                .unwrap_or(true);
            symbols.push(ExchangeSymbol {
                symbol,
                base_asset: base.to_uppercase(),
                quote_asset: quote.to_uppercase(),
                is_active,
            });
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testutil::descriptor;
    use rust_decimal_macros::dec;
    use types::SymbolFormat;

    const TICKER_ARRAY: &str = r#"[
        {"symbol": "BTCUSDT", "lastPrice": "50000.10", "volume": "1234.5",
         "quoteVolume": "61728395.0", "highPrice": "51000", "lowPrice": "49000",
         "priceChange": "-120.5"},
        {"symbol": "ETHUSDT", "lastPrice": "0", "volume": "99"},
        {"symbol": "SOLUSDT", "lastPrice": "150.25", "volume": "5000"}
    ]"#;

    #[test]
    fn parses_ticker_array_and_drops_non_positive_prices() {
        let ex = descriptor("binance", SymbolFormat::Concatenated);
        let tickers = BinanceParser.parse_tickers(TICKER_ARRAY.as_bytes(), &ex).unwrap();

        assert_eq!(tickers.len(), 2);
        let btc = &tickers[0];
        assert_eq!(btc.raw_symbol, "BTCUSDT");
        assert_eq!(btc.base_symbol, "BTC");
        assert_eq!(btc.quote_symbol, "USDT");
        assert_eq!(btc.price, dec!(50000.10));
        assert_eq!(btc.volume_24h, dec!(1234.5));
        assert_eq!(btc.quote_volume_24h, Some(dec!(61728395.0)));
        assert_eq!(btc.price_change_24h, Some(dec!(-120.5)));
    }

    #[test]
    fn parses_exchange_info_shape_with_stated_legs() {
        let ex = descriptor("binance", SymbolFormat::Concatenated);
        let body = r#"{"symbols": [
            {"symbol": "BTCTRY", "baseAsset": "BTC", "quoteAsset": "TRY",
             "lastPrice": "1650000", "volume": "10"}
        ]}"#;
        let tickers = BinanceParser.parse_tickers(body.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].base_symbol, "BTC");
        assert_eq!(tickers[0].quote_symbol, "TRY");
    }

    #[test]
    fn parses_symbols_with_trading_status() {
        let ex = descriptor("binance", SymbolFormat::Concatenated);
        let body = r#"{"symbols": [
            {"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT", "status": "TRADING"},
            {"symbol": "LUNAUSDT", "baseAsset": "LUNA", "quoteAsset": "USDT", "status": "BREAK"}
        ]}"#;
        let symbols = BinanceParser.parse_symbols(body.as_bytes(), &ex).unwrap();
        assert_eq!(symbols.len(), 2);
        assert!(symbols[0].is_active);
        assert!(!symbols[1].is_active);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let ex = descriptor("binance", SymbolFormat::Concatenated);
        assert!(BinanceParser.parse_tickers(b"not json", &ex).is_err());
        assert!(BinanceParser.parse_tickers(b"{\"weird\": true}", &ex).is_err());
    }
}
