//! Search result models for symbol lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::string_field;

/// Result from a ticker/symbol search.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// Symbol/ticker (e.g., "AAPL", "RELIANCE.NS")
    pub symbol: String,

    /// Short display name (e.g., "Apple Inc")
    pub name: String,

    /// Exchange name (e.g., "NASDAQ", "NSE")
    pub exchange: String,

    /// Asset type (e.g., "EQUITY", "ETF", "INDEX")
    pub asset_type: String,

    /// Relevance score from provider (higher = better match)
    pub score: Option<f64>,
}

impl SearchResult {
    /// Map one raw search row; rows without a symbol are unusable.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let symbol = string_field(raw, "symbol")?;
        Some(Self {
            symbol,
            name: string_field(raw, "name").unwrap_or_default(),
            exchange: string_field(raw, "exchange").unwrap_or_default(),
            asset_type: string_field(raw, "asset_type").unwrap_or_default(),
            score: raw.get("score").and_then(Value::as_f64),
        })
    }
}
