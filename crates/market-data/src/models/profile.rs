use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decimal_field, string_field, u64_field};

/// Company profile data (sector, industry, descriptive fields).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompanyProfile {
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,
    /// Full legal name
    pub name: Option<String>,
    /// Short display name
    pub short_name: Option<String>,
    /// Sector classification
    pub sector: Option<String>,
    /// Industry classification
    pub industry: Option<String>,
    /// Country of incorporation
    pub country: Option<String>,
    /// Reporting currency
    pub currency: Option<String>,
    /// Market capitalization
    pub market_cap: Option<Decimal>,
    /// Enterprise value
    pub enterprise_value: Option<Decimal>,
    /// Business summary
    pub description: Option<String>,
    /// Corporate website
    pub website: Option<String>,
    /// Full-time employee count
    pub employees: Option<u64>,
    /// Moment the data was fetched
    pub as_of: DateTime<Utc>,
}

impl CompanyProfile {
    /// Map an opaque raw field map to the canonical profile shape.
    pub fn from_raw(symbol: &str, raw: &Value) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: string_field(raw, "longName"),
            short_name: string_field(raw, "shortName"),
            sector: string_field(raw, "sector"),
            industry: string_field(raw, "industry"),
            country: string_field(raw, "country"),
            currency: string_field(raw, "currency"),
            market_cap: decimal_field(raw, "marketCap"),
            enterprise_value: decimal_field(raw, "enterpriseValue"),
            description: string_field(raw, "longBusinessSummary"),
            website: string_field(raw, "website"),
            employees: u64_field(raw, "fullTimeEmployees"),
            as_of: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_raw() {
        let raw = json!({
            "longName": "Apple Inc.",
            "sector": "Technology",
            "industry": "Consumer Electronics",
            "country": "United States",
            "fullTimeEmployees": 164000
        });

        let profile = CompanyProfile::from_raw("AAPL", &raw);
        assert_eq!(profile.name.as_deref(), Some("Apple Inc."));
        assert_eq!(profile.sector.as_deref(), Some("Technology"));
        assert_eq!(profile.employees, Some(164_000));
        assert_eq!(profile.website, None);
        assert_eq!(profile.market_cap, None);
    }
}
