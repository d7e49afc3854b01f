//! Coinbase Exchange parser: arrays of product objects with a nested
//! `stats` block (`last`, `volume`, `high`, `low`).

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{
    decode_json, finish_record, string_field, value_to_decimal, RawRecord, ResponseParser,
};
use crate::error::{AdapterError, Result};
use rust_decimal::Decimal;

/// Parser for Coinbase-style product listings.
pub struct CoinbaseParser;

impl CoinbaseParser {
    fn stat(record: &Value, key: &str) -> Option<Decimal> {
        record.get("stats").and_then(|s| s.get(key)).and_then(value_to_decimal)
    }
}

impl ResponseParser for CoinbaseParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let products = value.as_array().ok_or_else(|| AdapterError::Decode {
            exchange: exchange.id.clone(),
            error: "expected array of products".into(),
        })?;

        let mut tickers = Vec::with_capacity(products.len());
        for product in products {
            let Some(symbol) = string_field(product, &["id", "product_id"]) else {
                continue;
            };
            let Some(price) = Self::stat(product, "last").filter(|p| *p > Decimal::ZERO) else {
                continue;
            };

            let raw = RawRecord {
                symbol,
                price,
                volume: Self::stat(product, "volume").unwrap_or(Decimal::ZERO),
                quote_volume: None,
                high: Self::stat(product, "high"),
                low: Self::stat(product, "low"),
                change: Self::stat(product, "open").map(|open| price - open),
                base: string_field(product, &["base_currency"]),
                quote: string_field(product, &["quote_currency"]),
            };
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
        let products = value.as_array().ok_or_else(|| AdapterError::Decode {
            exchange: exchange.id.clone(),
            error: "expected array of products".into(),
        })?;

        let mut symbols = Vec::with_capacity(products.len());
        for product in products {
            let (Some(symbol), Some(base), Some(quote)) = (
                string_field(product, &["id", "product_id"]),
                string_field(product, &["base_currency"]),
                string_field(product, &["quote_currency"]),
            ) else {
                continue;
            };
            let is_active = product
                .get("status")
                .and_then(Value::as_str)
                .map(|s| s == "online")
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

    const PRODUCTS: &str = r#"[
        {"id": "BTC-USD", "base_currency": "BTC", "quote_currency": "USD",
         "status": "online",
         "stats": {"last": "50000.5", "volume": "320.7", "high": "51200", "low": "49100", "open": "49800"}},
        {"id": "DEAD-USD", "base_currency": "DEAD", "quote_currency": "USD",
         "stats": {"last": "0", "volume": "0"}}
    ]"#;

    #[test]
    fn parses_products_with_nested_stats() {
        let ex = descriptor("coinbase", SymbolFormat::DashSeparated);
        let tickers = CoinbaseParser.parse_tickers(PRODUCTS.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);

        let btc = &tickers[0];
        assert_eq!(btc.base_symbol, "BTC");
        assert_eq!(btc.quote_symbol, "USD");
        assert_eq!(btc.price, dec!(50000.5));
        assert_eq!(btc.volume_24h, dec!(320.7));
        assert_eq!(btc.high_24h, Some(dec!(51200)));
        // Change derived from open.
        assert_eq!(btc.price_change_24h, Some(dec!(200.5)));
    }

    #[test]
    fn parses_symbols_with_online_status() {
        let ex = descriptor("coinbase", SymbolFormat::DashSeparated);
        let body = r#"[
            {"id": "BTC-USD", "base_currency": "BTC", "quote_currency": "USD", "status": "online"},
            {"id": "XYZ-USD", "base_currency": "XYZ", "quote_currency": "USD", "status": "delisted"}
        ]"#;
        let symbols = CoinbaseParser.parse_symbols(body.as_bytes(), &ex).unwrap();
        assert!(symbols[0].is_active);
        assert!(!symbols[1].is_active);
    }

    #[test]
    fn object_body_is_a_decode_error() {
        let ex = descriptor("coinbase", SymbolFormat::DashSeparated);
        assert!(CoinbaseParser.parse_tickers(b"{\"message\": \"error\"}", &ex).is_err());
    }
}
