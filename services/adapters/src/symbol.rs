//! Pair-symbol splitting and token-symbol normalization.
//!
//! Venues spell the same market a half-dozen ways (`BTCUSDT`, `BTC-USDT`,
//! `tBTCUSD`, `XXBTZUSD`, ...). This module turns a venue spelling into an
//! uppercase `(base, quote)` pair and back, and produces the normalization
//! candidates the resolver tries against the token table.

use types::SymbolFormat;

/// Kraken legacy asset-code substitutions, applied before suffix matching.
const KRAKEN_SUBSTITUTIONS: [(&str, &str); 3] =
    [("XXBT", "BTC"), ("ZUSD", "USD"), ("ZEUR", "EUR")];

/// Split a venue pair symbol into uppercase `(base, quote)`.
///
/// Resolution order:
/// 1. separator formats split directly;
/// 2. vendor transforms (Bitfinex `t` prefix, Kraken asset codes);
/// 3. longest-first suffix match against the venue's ordered quote list
///    (quote lists are ordered fiat-first so `BTCTRY` peels `TRY`, not `BTC`);
/// 4. positional fallback: 6 chars split 3/3, longer split at `len - 4`.
///
/// Symbols too short for the fallback return an empty quote; downstream
/// drops those legs from VWAP input.
pub fn parse_symbol_pair(
    raw: &str,
    format: SymbolFormat,
    quote_currencies: &[String],
) -> (String, String) {
    let mut symbol = raw.trim().to_uppercase();

    if let Some(sep) = format.separator() {
        if let Some((base, quote)) = symbol.split_once(sep) {
            return (base.to_string(), quote.to_string());
        }
        // Separator missing from the wire symbol; fall through to suffix
        // matching rather than failing the whole ticker.
    }

    match format {
        SymbolFormat::BitfinexPrefixed => {
            if raw.trim().starts_with('t') && symbol.len() > 1 {
                symbol = symbol[1..].to_string();
            }
        }
        SymbolFormat::KrakenLegacy => {
            for (from, to) in KRAKEN_SUBSTITUTIONS {
                symbol = symbol.replace(from, to);
            }
        }
        _ => {}
    }

    if let Some(pair) = match_quote_suffix(&symbol, quote_currencies) {
        return pair;
    }

    positional_split(&symbol)
}

/// Longest-first suffix match; ties in length resolve to registry order.
fn match_quote_suffix(symbol: &str, quote_currencies: &[String]) -> Option<(String, String)> {
    let mut candidates: Vec<&String> = quote_currencies.iter().collect();
    candidates.sort_by_key(|q| std::cmp::Reverse(q.len()));

    for quote in candidates {
        let quote = quote.to_uppercase();
        if symbol.len() > quote.len() && symbol.ends_with(&quote) {
            let base = symbol[..symbol.len() - quote.len()].to_string();
            return Some((base, quote));
        }
    }
    None
}

fn positional_split(symbol: &str) -> (String, String) {
    match symbol.len() {
        6 => (symbol[..3].to_string(), symbol[3..].to_string()),
        n if n > 4 => (symbol[..n - 4].to_string(), symbol[n - 4..].to_string()),
        _ => (symbol.to_string(), String::new()),
    }
}

/// Join `(base, quote)` back into a venue spelling. Inverse of
/// [`parse_symbol_pair`] for every quote in the venue's quote list.
pub fn format_join(base: &str, quote: &str, format: SymbolFormat) -> String {
    let base = base.to_uppercase();
    let quote = quote.to_uppercase();
    match format {
        SymbolFormat::Concatenated => format!("{base}{quote}"),
        SymbolFormat::DashSeparated => format!("{base}-{quote}"),
        SymbolFormat::UnderscoreSeparated => format!("{base}_{quote}"),
        SymbolFormat::SlashSeparated => format!("{base}/{quote}"),
        SymbolFormat::BitfinexPrefixed => format!("t{base}{quote}"),
        SymbolFormat::KrakenLegacy => {
            let base = kraken_spelling(&base);
            let quote = kraken_spelling(&quote);
            format!("{base}{quote}")
        }
    }
}

fn kraken_spelling(asset: &str) -> String {
    for (legacy, canonical) in KRAKEN_SUBSTITUTIONS {
        if asset == canonical {
            return legacy.to_string();
        }
    }
    asset.to_string()
}

/// Canonicalize a Kraken asset code (`XXBT` -> `BTC`, `ZUSD` -> `USD`).
pub fn kraken_canonical_asset(asset: &str) -> String {
    let upper = asset.to_uppercase();
    for (legacy, canonical) in KRAKEN_SUBSTITUTIONS {
        if upper == legacy {
            return canonical.to_string();
        }
    }
    upper
}

/// Normalization candidates for matching a venue asset symbol against the
/// token table, most-specific first: the exact uppercase form, then with
/// vendor prefixes (`t`, `XX`, `X`) stripped, each with `XBT` aliased to
/// `BTC`.
///
/// The exact form comes first so real tickers that merely start with `X`
/// (`XRP`) are never mangled.
pub fn normalization_candidates(symbol: &str) -> Vec<String> {
    let upper = symbol.trim().to_uppercase();
    let mut raw_forms = vec![upper.clone()];

    if symbol.trim().starts_with('t') && upper.len() > 3 {
        raw_forms.push(upper[1..].to_string());
    }
    // Single-X strip first: it covers XXBT -> XBT -> BTC; the double strip
    // is a last resort since it produces very short, collision-prone forms.
    if let Some(stripped) = upper.strip_prefix('X') {
        if stripped.len() >= 2 {
            raw_forms.push(stripped.to_string());
        }
    }
    if let Some(stripped) = upper.strip_prefix("XX") {
        if stripped.len() >= 2 {
            raw_forms.push(stripped.to_string());
        }
    }

    let mut candidates = Vec::new();
    for form in raw_forms {
        let aliased = if form == "XBT" { "BTC".to_string() } else { form.clone() };
        if !candidates.contains(&form) {
            candidates.push(form);
        }
        if !candidates.contains(&aliased) {
            candidates.push(aliased);
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn quotes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn separator_formats_split_directly() {
        let q = quotes(&["USDT"]);
        assert_eq!(
            parse_symbol_pair("BTC-USDT", SymbolFormat::DashSeparated, &q),
            ("BTC".to_string(), "USDT".to_string())
        );
        assert_eq!(
            parse_symbol_pair("eth_usdc", SymbolFormat::UnderscoreSeparated, &q),
            ("ETH".to_string(), "USDC".to_string())
        );
        assert_eq!(
            parse_symbol_pair("SOL/USD", SymbolFormat::SlashSeparated, &q),
            ("SOL".to_string(), "USD".to_string())
        );
    }

    #[test]
    fn bitfinex_prefix_is_stripped() {
        let q = quotes(&["USD", "USDT"]);
        assert_eq!(
            parse_symbol_pair("tBTCUSD", SymbolFormat::BitfinexPrefixed, &q),
            ("BTC".to_string(), "USD".to_string())
        );
    }

    #[test]
    fn kraken_asset_codes_are_substituted() {
        let q = quotes(&["USD", "EUR"]);
        assert_eq!(
            parse_symbol_pair("XXBTZUSD", SymbolFormat::KrakenLegacy, &q),
            ("BTC".to_string(), "USD".to_string())
        );
        assert_eq!(
            parse_symbol_pair("XETHZEUR", SymbolFormat::KrakenLegacy, &q),
            ("XETH".to_string(), "EUR".to_string())
        );
    }

    #[test]
    fn longest_quote_suffix_wins() {
        // Both USD and USDT are suffixes of "BTCUSDT" candidates; USDT must
        // win regardless of registry order.
        let q = quotes(&["USD", "USDT"]);
        assert_eq!(
            parse_symbol_pair("BTCUSDT", SymbolFormat::Concatenated, &q),
            ("BTC".to_string(), "USDT".to_string())
        );
    }

    #[test]
    fn fiat_first_ordering_resolves_btctry() {
        // TRY and BTC are the same length; fiat-first registry order decides.
        let q = quotes(&["TRY", "USDT", "USDC", "BTC"]);
        assert_eq!(
            parse_symbol_pair("BTCTRY", SymbolFormat::Concatenated, &q),
            ("BTC".to_string(), "TRY".to_string())
        );
    }

    #[test]
    fn positional_fallback_for_unknown_quotes() {
        let q = quotes(&["USDT"]);
        // 6 chars: 3/3 split.
        assert_eq!(
            parse_symbol_pair("ABCXYZ", SymbolFormat::Concatenated, &q),
            ("ABC".to_string(), "XYZ".to_string())
        );
        // Longer: peel the last 4.
        assert_eq!(
            parse_symbol_pair("DOGEEURO", SymbolFormat::Concatenated, &q),
            ("DOGE".to_string(), "EURO".to_string())
        );
        // Too short to split: empty quote, dropped downstream.
        assert_eq!(
            parse_symbol_pair("BTC", SymbolFormat::Concatenated, &q),
            ("BTC".to_string(), String::new())
        );
    }

    #[test]
    fn missing_separator_falls_back_to_suffix_match() {
        let q = quotes(&["USDT"]);
        assert_eq!(
            parse_symbol_pair("BTCUSDT", SymbolFormat::DashSeparated, &q),
            ("BTC".to_string(), "USDT".to_string())
        );
    }

    #[test]
    fn normalization_keeps_exact_form_first() {
        assert_eq!(normalization_candidates("XRP")[0], "XRP");
        assert!(normalization_candidates("XXBT").contains(&"BTC".to_string()));
        assert!(normalization_candidates("XBT").contains(&"BTC".to_string()));
        assert!(normalization_candidates("tBTC").contains(&"BTC".to_string()));
        assert_eq!(normalization_candidates("BTC"), vec!["BTC".to_string()]);
    }

    proptest! {
        // ParseSymbolPair(format_join(base, quote, fmt), fmt) == (base, quote)
        // for every format and every pair whose quote is in the quote list.
        #[test]
        fn join_then_parse_round_trips(
            base in "[A-Z]{2,6}",
            quote_idx in 0usize..4,
            fmt_idx in 0usize..6,
        ) {
            let quote_list = quotes(&["USDT", "USD", "EUR", "TRY"]);
            let quote = quote_list[quote_idx].clone();
            prop_assume!(base != quote);
            // A base ending in the chosen quote is ambiguous by construction
            // in concatenated formats (e.g. base "ABUSD" + quote "USD").
            prop_assume!(!base.ends_with(&quote));
            // Kraken substitutions rewrite these byte sequences wherever they
            // appear, so bases containing them cannot round-trip that format.
            prop_assume!(!base.contains("XBT") && !base.contains("ZUSD") && !base.contains("ZEUR"));

            let formats = [
                SymbolFormat::Concatenated,
                SymbolFormat::DashSeparated,
                SymbolFormat::UnderscoreSeparated,
                SymbolFormat::SlashSeparated,
                SymbolFormat::BitfinexPrefixed,
                SymbolFormat::KrakenLegacy,
            ];
            let fmt = formats[fmt_idx];

            let joined = format_join(&base, &quote, fmt);
            let (parsed_base, parsed_quote) = parse_symbol_pair(&joined, fmt, &quote_list);
            prop_assert_eq!(parsed_base, base);
            prop_assert_eq!(parsed_quote, quote);
        }
    }
}
