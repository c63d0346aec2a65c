use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decimal_field;

/// Fundamental ratios and valuation metrics for one symbol.
///
/// Same null-field policy as [`QuoteSnapshot`](super::QuoteSnapshot): the
/// canonical key set is always complete, unavailable values are `null`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Fundamentals {
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,

    /// Trailing price/earnings
    pub pe_ratio: Option<Decimal>,
    /// Price/book
    pub pb_ratio: Option<Decimal>,
    /// Price/earnings-to-growth
    pub peg_ratio: Option<Decimal>,
    /// Return on equity
    pub roe: Option<Decimal>,
    /// Return on assets
    pub roa: Option<Decimal>,
    /// Debt/equity
    pub debt_to_equity: Option<Decimal>,
    /// Current ratio
    pub current_ratio: Option<Decimal>,
    /// Quick ratio
    pub quick_ratio: Option<Decimal>,
    /// Dividend yield
    pub dividend_yield: Option<Decimal>,
    /// Dividend payout ratio
    pub payout_ratio: Option<Decimal>,
    /// Market capitalization
    pub market_cap: Option<Decimal>,
    /// Enterprise value
    pub enterprise_value: Option<Decimal>,
    /// Year-over-year revenue growth
    pub revenue_growth: Option<Decimal>,
    /// Year-over-year earnings growth
    pub earnings_growth: Option<Decimal>,
    /// Net profit margin
    pub profit_margin: Option<Decimal>,
    /// Operating margin
    pub operating_margin: Option<Decimal>,
    /// Gross margin
    pub gross_margin: Option<Decimal>,
    /// Book value per share
    pub book_value: Option<Decimal>,
    /// Cash per share
    pub cash_per_share: Option<Decimal>,
    /// Beta vs. the market
    pub beta: Option<Decimal>,
    /// Forward price/earnings
    pub forward_pe: Option<Decimal>,
    /// Trailing price/sales
    pub price_to_sales: Option<Decimal>,

    /// Moment the data was fetched
    pub as_of: DateTime<Utc>,
}

impl Fundamentals {
    /// Map an opaque raw field map to the canonical fundamentals shape.
    pub fn from_raw(symbol: &str, raw: &Value) -> Self {
        Self {
            symbol: symbol.to_string(),
            pe_ratio: decimal_field(raw, "trailingPE"),
            pb_ratio: decimal_field(raw, "priceToBook"),
            peg_ratio: decimal_field(raw, "pegRatio"),
            roe: decimal_field(raw, "returnOnEquity"),
            roa: decimal_field(raw, "returnOnAssets"),
            debt_to_equity: decimal_field(raw, "debtToEquity"),
            current_ratio: decimal_field(raw, "currentRatio"),
            quick_ratio: decimal_field(raw, "quickRatio"),
            dividend_yield: decimal_field(raw, "dividendYield"),
            payout_ratio: decimal_field(raw, "payoutRatio"),
            market_cap: decimal_field(raw, "marketCap"),
            enterprise_value: decimal_field(raw, "enterpriseValue"),
            revenue_growth: decimal_field(raw, "revenueGrowth"),
            earnings_growth: decimal_field(raw, "earningsGrowth"),
            profit_margin: decimal_field(raw, "profitMargins"),
            operating_margin: decimal_field(raw, "operatingMargins"),
            gross_margin: decimal_field(raw, "grossMargins"),
            book_value: decimal_field(raw, "bookValue"),
            cash_per_share: decimal_field(raw, "totalCashPerShare"),
            beta: decimal_field(raw, "beta"),
            forward_pe: decimal_field(raw, "forwardPE"),
            price_to_sales: decimal_field(raw, "priceToSalesTrailing12Months"),
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
    fn test_from_raw() {
        let raw = json!({
            "trailingPE": 28.5,
            "priceToBook": 44.6,
            "returnOnEquity": 1.47,
            "debtToEquity": 170.7,
            "profitMargins": 0.253,
            "marketCap": 2.4e12
        });

        let f = Fundamentals::from_raw("AAPL", &raw);
        assert_eq!(f.pe_ratio, Some(dec!(28.5)));
        assert_eq!(f.roe, Some(dec!(1.47)));
        assert_eq!(f.profit_margin, Some(dec!(0.253)));
        assert_eq!(f.peg_ratio, None);
        assert_eq!(f.beta, None);
    }

    #[test]
    fn test_serialized_nulls_present() {
        let f = Fundamentals::from_raw("TEST", &json!({}));
        let json = serde_json::to_value(&f).unwrap();
        assert!(json.get("pe_ratio").unwrap().is_null());
        assert!(json.get("price_to_sales").unwrap().is_null());
    }
}
