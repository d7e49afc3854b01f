//! Parser for venues that wrap ticker arrays in a `data` envelope
//! (BitMart, KuCoin, Pionex): `{"data": {"tickers": [...]}}` or
//! `{"data": {"ticker": [...]}}`.

use serde_json::Value;

use types::{CanonicalTicker, ExchangeDescriptor, ExchangeSymbol};

use super::{decode_json, extract_record, finish_record, ResponseParser};
use crate::error::{AdapterError, Result};
use crate::symbol::parse_symbol_pair;

/// Parser for `data.tickers` / `data.ticker` envelopes.
pub struct DataWrappedParser;

impl DataWrappedParser {
    fn records<'v>(value: &'v Value, exchange: &ExchangeDescriptor) -> Result<&'v Vec<Value>> {
        let data = value.get("data").unwrap_or(value);
        data.get("tickers")
            .or_else(|| data.get("ticker"))
            .or(Some(data))
            .and_then(Value::as_array)
            .ok_or_else(|| AdapterError::Decode {
                exchange: exchange.id.clone(),
                error: "expected data.tickers or data.ticker array".into(),
            })
    }
}

impl ResponseParser for DataWrappedParser {
    fn parse_tickers(
        &self,
        body: &[u8],
        exchange: &ExchangeDescriptor,
    ) -> Result<Vec<CanonicalTicker>> {
        let value = decode_json(body, exchange)?;
        let records = Self::records(&value, exchange)?;

        let mut tickers = Vec::with_capacity(records.len());
        for record in records {
            let Some(raw) = extract_record(record, None) else {
                continue;
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
        let tickers = self.parse_tickers(body, exchange)?;
        Ok(tickers
            .into_iter()
            .map(|t| {
                let (base, quote) = parse_symbol_pair(
                    &t.raw_symbol,
                    exchange.symbol_format,
                    &exchange.quote_currencies,
                );
                ExchangeSymbol {
                    symbol: t.raw_symbol,
                    base_asset: base,
                    quote_asset: quote,
                    is_active: true,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::testutil::descriptor;
    use rust_decimal_macros::dec;
    use types::SymbolFormat;

    #[test]
    fn parses_data_tickers_envelope() {
        let ex = descriptor("bitmart", SymbolFormat::UnderscoreSeparated);
        let body = r#"{"code": 1000, "data": {"tickers": [
            {"symbol": "BTC_USDT", "last_price": "50075.9", "base_volume_24h": "0",
             "volume_24h": "210.4", "high_24h": "50800", "low_24h": "49300"}
        ]}}"#;
        let tickers = DataWrappedParser.parse_tickers(body.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].price, dec!(50075.9));
        assert_eq!(tickers[0].volume_24h, dec!(210.4));
        assert_eq!(tickers[0].base_symbol, "BTC");
    }

    #[test]
    fn parses_singular_ticker_envelope() {
        let ex = descriptor("kucoin", SymbolFormat::DashSeparated);
        let body = r#"{"data": {"ticker": [
            {"symbol": "ETH-USDT", "last": "3005.4", "vol": "8000"}
        ]}}"#;
        let tickers = DataWrappedParser.parse_tickers(body.as_bytes(), &ex).unwrap();
        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].base_symbol, "ETH");
        assert_eq!(tickers[0].quote_symbol, "USDT");
    }

    #[test]
    fn missing_envelope_is_a_decode_error() {
        let ex = descriptor("bitmart", SymbolFormat::UnderscoreSeparated);
        assert!(DataWrappedParser.parse_tickers(b"{\"data\": {}}", &ex).is_err());
    }
}
