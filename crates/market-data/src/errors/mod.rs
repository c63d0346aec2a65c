//! Error types for the market data facade.
//!
//! This module provides [`MarketError`], the main error enum for all
//! facade operations. The taxonomy distinguishes backpressure
//! (rate-limit denial) from upstream faults so callers can apply
//! differentiated fallback policy.

use thiserror::Error;

/// Errors that can occur during market data operations.
///
/// Rate limiter and cache internals never surface their own faults through
/// this enum - they degrade to benign return values at their boundary. The
/// variants here are the outcomes the fetch and batch layers react to.
#[derive(Error, Debug)]
pub enum MarketError {
    /// The local request quota denied a permit.
    /// This is backpressure, not an upstream fault - callers should
    /// translate it into a rate-limit-exceeded outcome.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// The requested symbol was not found by the upstream provider.
    /// Terminal for that symbol - retrying won't help.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The upstream call failed or returned unusable data.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Description of the upstream failure
        message: String,
    },

    /// Critical aggregate keys could not be resolved.
    /// Carries structured detail so callers can report what is missing.
    #[error("Service unavailable: missing {missing:?}")]
    ServiceUnavailable {
        /// Logical keys that could not be resolved
        missing: Vec<String>,
        /// Provider symbols whose fetches failed
        failed_symbols: Vec<String>,
    },

    /// A cache-layer fault. Only used inside the cache boundary; the
    /// store converts it to a functional miss before returning.
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache failure
        message: String,
    },

    /// The request itself was malformed (unknown operation, bad options).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what was wrong with the request
        message: String,
    },

    /// A network error occurred while communicating with the provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketError {
    /// Whether a later attempt at the same request could succeed.
    ///
    /// Backpressure and transient upstream faults are retryable; a missing
    /// symbol or a malformed request is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded
            | Self::Upstream { .. }
            | Self::ServiceUnavailable { .. }
            | Self::Network(_) => true,
            Self::SymbolNotFound(_) | Self::Cache { .. } | Self::InvalidRequest { .. } => false,
        }
    }

    /// Whether this error means the upstream call itself failed.
    ///
    /// Batch callers absorb these per symbol instead of aborting the batch.
    pub fn is_upstream_fault(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::SymbolNotFound(_) | Self::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_is_retryable() {
        assert!(MarketError::RateLimitExceeded.is_retryable());
    }

    #[test]
    fn test_symbol_not_found_is_not_retryable() {
        let error = MarketError::SymbolNotFound("INVALID".to_string());
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_upstream_is_fault_and_retryable() {
        let error = MarketError::Upstream {
            message: "HTTP 500".to_string(),
        };
        assert!(error.is_retryable());
        assert!(error.is_upstream_fault());
    }

    #[test]
    fn test_rate_limit_is_not_upstream_fault() {
        assert!(!MarketError::RateLimitExceeded.is_upstream_fault());
    }

    #[test]
    fn test_error_display() {
        let error = MarketError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketError::ServiceUnavailable {
            missing: vec!["vix".to_string()],
            failed_symbols: vec!["^VIX".to_string()],
        };
        assert_eq!(
            format!("{}", error),
            "Service unavailable: missing [\"vix\"]"
        );
    }
}
