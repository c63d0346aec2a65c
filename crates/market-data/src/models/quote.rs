use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decimal_field, u64_field};

/// Point-in-time quote snapshot.
///
/// Every canonical field is present in serialized output; values the
/// upstream provider did not supply are `null`, never zero. Callers must
/// treat absence distinctly from zero.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuoteSnapshot {
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,

    /// Last traded / regular market price
    pub price: Option<Decimal>,

    /// Absolute change since previous close
    pub change: Option<Decimal>,

    /// Percent change since previous close
    pub change_percent: Option<Decimal>,

    /// Trading volume
    pub volume: Option<u64>,

    /// Market capitalization
    pub market_cap: Option<Decimal>,

    /// Trailing price/earnings ratio
    pub pe_ratio: Option<Decimal>,

    /// Dividend yield
    pub dividend_yield: Option<Decimal>,

    /// 52-week high
    pub high_52_week: Option<Decimal>,

    /// 52-week low
    pub low_52_week: Option<Decimal>,

    /// Session open
    pub open: Option<Decimal>,

    /// Previous session close
    pub previous_close: Option<Decimal>,

    /// Session high
    pub day_high: Option<Decimal>,

    /// Session low
    pub day_low: Option<Decimal>,

    /// Moment the snapshot was taken
    pub as_of: DateTime<Utc>,
}

impl QuoteSnapshot {
    /// Map an opaque raw field map to the canonical quote shape.
    ///
    /// Pure mapping: missing raw fields become `None` canonical fields.
    pub fn from_raw(symbol: &str, raw: &Value) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: decimal_field(raw, "regularMarketPrice"),
            change: decimal_field(raw, "regularMarketChange"),
            change_percent: decimal_field(raw, "regularMarketChangePercent"),
            volume: u64_field(raw, "regularMarketVolume").or_else(|| u64_field(raw, "volume")),
            market_cap: decimal_field(raw, "marketCap"),
            pe_ratio: decimal_field(raw, "trailingPE"),
            dividend_yield: decimal_field(raw, "dividendYield"),
            high_52_week: decimal_field(raw, "fiftyTwoWeekHigh"),
            low_52_week: decimal_field(raw, "fiftyTwoWeekLow"),
            open: decimal_field(raw, "regularMarketOpen"),
            previous_close: decimal_field(raw, "regularMarketPreviousClose"),
            day_high: decimal_field(raw, "regularMarketDayHigh").or_else(|| decimal_field(raw, "dayHigh")),
            day_low: decimal_field(raw, "regularMarketDayLow").or_else(|| decimal_field(raw, "dayLow")),
            as_of: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_from_raw_full() {
        let raw = json!({
            "regularMarketPrice": 150.25,
            "regularMarketChange": 1.5,
            "regularMarketChangePercent": 1.01,
            "regularMarketVolume": 42000000,
            "marketCap": 2400000000000.0,
            "trailingPE": 28.5,
            "fiftyTwoWeekHigh": 182.94,
            "fiftyTwoWeekLow": 124.17,
            "regularMarketOpen": 149.0,
            "regularMarketPreviousClose": 148.75,
            "regularMarketDayHigh": 151.0,
            "regularMarketDayLow": 148.5
        });

        let quote = QuoteSnapshot::from_raw("AAPL", &raw);
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, Some(dec!(150.25)));
        assert_eq!(quote.change_percent, Some(dec!(1.01)));
        assert_eq!(quote.volume, Some(42_000_000));
        assert_eq!(quote.day_high, Some(dec!(151.0)));
        // Not in the raw payload, must be None
        assert_eq!(quote.dividend_yield, None);
    }

    #[test]
    fn test_missing_fields_are_null_not_zero() {
        let raw = json!({"regularMarketPrice": 10.0});
        let quote = QuoteSnapshot::from_raw("TEST", &raw);

        assert_eq!(quote.price, Some(dec!(10.0)));
        assert_eq!(quote.change, None);
        assert_eq!(quote.market_cap, None);

        // Serialized output carries the full key set with explicit nulls
        let json = serde_json::to_value(&quote).unwrap();
        assert!(json.get("change").unwrap().is_null());
        assert!(json.get("pe_ratio").unwrap().is_null());
    }

    #[test]
    fn test_volume_fallback_key() {
        let raw = json!({"volume": 1234});
        let quote = QuoteSnapshot::from_raw("TEST", &raw);
        assert_eq!(quote.volume, Some(1234));
    }
}
