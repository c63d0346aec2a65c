use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MarketError;

/// Which financial statement table to fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Income statement
    Income,
    /// Balance sheet
    Balance,
    /// Cash flow statement
    CashFlow,
}

impl StatementKind {
    /// Stable string form, used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Balance => "balance",
            Self::CashFlow => "cashflow",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatementKind {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "balance" => Ok(Self::Balance),
            "cashflow" => Ok(Self::CashFlow),
            other => Err(MarketError::InvalidRequest {
                message: format!("unknown statement kind: {}", other),
            }),
        }
    }
}

/// Financial statement tables for one symbol.
///
/// `data` maps line-item label to period-end date to value. Values the
/// upstream did not report for a period are `None`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FinancialStatements {
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,
    /// Statement table kind
    pub kind: StatementKind,
    /// line item -> period-end date -> value
    pub data: BTreeMap<String, BTreeMap<String, Option<Decimal>>>,
    /// Moment the data was fetched
    pub as_of: DateTime<Utc>,
}

impl FinancialStatements {
    /// Map an opaque raw table (`{"<line item>": {"<date>": number|null}}`)
    /// to the canonical shape.
    pub fn from_raw(symbol: &str, kind: StatementKind, raw: &Value) -> Self {
        let mut data = BTreeMap::new();
        if let Some(items) = raw.as_object() {
            for (label, periods) in items {
                let mut row = BTreeMap::new();
                if let Some(periods) = periods.as_object() {
                    for (date, value) in periods {
                        row.insert(
                            date.clone(),
                            value.as_f64().and_then(Decimal::from_f64_retain),
                        );
                    }
                }
                data.insert(label.clone(), row);
            }
        }
        Self {
            symbol: symbol.to_string(),
            kind,
            data,
            as_of: Utc::now(),
        }
    }

    /// Whether the upstream returned any rows at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
