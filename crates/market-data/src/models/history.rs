use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decimal_field, u64_field};

/// One bar of a historical price series.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    /// Bar timestamp
    pub date: DateTime<Utc>,
    /// Opening price
    pub open: Option<Decimal>,
    /// High price
    pub high: Option<Decimal>,
    /// Low price
    pub low: Option<Decimal>,
    /// Closing price
    pub close: Option<Decimal>,
    /// Trading volume
    pub volume: Option<u64>,
}

impl Candle {
    /// Map one raw row (`{"timestamp": unix_secs, "open": ..., ...}`).
    ///
    /// Returns `None` when the row has no usable timestamp.
    pub fn from_raw(row: &Value) -> Option<Self> {
        let ts = row.get("timestamp").and_then(Value::as_i64)?;
        let date = Utc.timestamp_opt(ts, 0).single()?;
        Some(Self {
            date,
            open: decimal_field(row, "open"),
            high: decimal_field(row, "high"),
            low: decimal_field(row, "low"),
            close: decimal_field(row, "close"),
            volume: u64_field(row, "volume"),
        })
    }
}

/// Historical price series for one symbol.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoricalSeries {
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,
    /// Requested range (e.g., "1y")
    pub period: String,
    /// Requested sampling interval (e.g., "1d")
    pub interval: String,
    /// Bars, ordered by timestamp ascending
    pub candles: Vec<Candle>,
    /// Number of bars
    pub total_points: usize,
    /// Moment the series was fetched
    pub as_of: DateTime<Utc>,
}

impl HistoricalSeries {
    /// Map an opaque raw row array to the canonical series shape.
    ///
    /// Rows without a usable timestamp are dropped.
    pub fn from_raw(symbol: &str, period: &str, interval: &str, raw: &Value) -> Self {
        let candles: Vec<Candle> = raw
            .as_array()
            .map(|rows| rows.iter().filter_map(Candle::from_raw).collect())
            .unwrap_or_default();
        let total_points = candles.len();
        Self {
            symbol: symbol.to_string(),
            period: period.to_string(),
            interval: interval.to_string(),
            candles,
            total_points,
            as_of: Utc::now(),
        }
    }
}
