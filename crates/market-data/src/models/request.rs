//! Fetch request types.

use serde::{Deserialize, Serialize};

use super::statements::StatementKind;

/// The logical operation a fetch performs against the upstream provider.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOperation {
    /// Latest point-in-time quote
    Quote,
    /// Historical price series
    Historical,
    /// Fundamental ratios
    Fundamentals,
    /// Financial statement tables
    Statements,
    /// Company profile
    Profile,
    /// Symbol search
    Search,
}

impl FetchOperation {
    /// Stable string form, used in logs and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Fundamentals => "fundamentals",
            Self::Statements => "statements",
            Self::Profile => "profile",
            Self::Search => "search",
        }
    }
}

/// Market a symbol trades in.
///
/// Drives symbol-format adaptation at the provider call boundary
/// (e.g., appending an exchange suffix for non-default markets).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Market {
    /// United States (default, symbols pass through unchanged)
    #[default]
    Us,
    /// India (NSE/BSE suffix handling)
    India,
    /// United Kingdom
    Uk,
    /// Canada
    Canada,
    /// Australia
    Australia,
}

impl Market {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Us => "US",
            Self::India => "IN",
            Self::Uk => "UK",
            Self::Canada => "CA",
            Self::Australia => "AU",
        }
    }
}

/// Options that shape an operation's result.
///
/// When set, they become part of the cache key so that variants of the same
/// symbol do not collide.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchOptions {
    /// History range (e.g., "1y")
    pub period: Option<String>,
    /// History sampling interval (e.g., "1d")
    pub interval: Option<String>,
    /// Statement table to fetch
    pub statement: Option<StatementKind>,
    /// Maximum number of search results
    pub limit: Option<usize>,
}

/// A single fetch against the upstream provider.
///
/// Created per call and discarded with the response; never persisted.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// The operation to perform
    pub operation: FetchOperation,
    /// Caller-supplied symbol (pre-adaptation)
    pub symbol: String,
    /// Market the symbol trades in
    pub market: Market,
    /// Operation options
    pub options: FetchOptions,
}

impl FetchRequest {
    /// Build a request with default options.
    pub fn new(operation: FetchOperation, symbol: impl Into<String>, market: Market) -> Self {
        Self {
            operation,
            symbol: symbol.into(),
            market,
            options: FetchOptions::default(),
        }
    }

    /// Set the options.
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_as_str() {
        assert_eq!(FetchOperation::Quote.as_str(), "quote");
        assert_eq!(FetchOperation::Statements.as_str(), "statements");
    }

    #[test]
    fn test_market_default_is_us() {
        assert_eq!(Market::default(), Market::Us);
        assert_eq!(Market::default().as_str(), "US");
    }

    #[test]
    fn test_market_serde_uppercase() {
        let json = serde_json::to_string(&Market::India).unwrap();
        assert_eq!(json, "\"INDIA\"");
    }
}
