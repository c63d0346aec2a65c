use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One resolved logical key in the global market context.
///
/// Serialized untagged so each key carries exactly the field set its kind
/// defines (a volatility index is a single scalar, an equity index is
/// price + change).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContextValue {
    /// Equity/commodity index: price and percent change
    Index {
        /// Index level
        price: Decimal,
        /// Percent change since previous close
        change_percent: Decimal,
    },
    /// Currency pair: rate and percent change
    Forex {
        /// Exchange rate
        rate: Decimal,
        /// Percent change since previous close
        change_percent: Decimal,
    },
    /// Single scalar (e.g., a volatility index level)
    Scalar {
        /// The value
        value: Decimal,
    },
}

/// Aggregate global market context.
///
/// `values` holds the resolved logical keys; keys that could not be
/// resolved and are not critical are simply absent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GlobalContext {
    /// Resolved logical keys
    #[serde(flatten)]
    pub values: BTreeMap<String, ContextValue>,
    /// Moment the aggregate was assembled
    pub timestamp: DateTime<Utc>,
}
