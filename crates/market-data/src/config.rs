//! Service configuration.
//!
//! All tunables are plain structs injected at construction time; the
//! hosting process owns loading and lifecycle. Defaults match a single
//! moderately-loaded upstream account.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheCategory;
use crate::models::Market;

/// How the inter-request delay reacts to consecutive failures.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Constant delay between requests
    #[default]
    FixedDelay,
    /// Delay multiplied by `backoff_multiplier^min(consecutive_errors, 5)`
    ExponentialBackoff,
}

impl BackoffStrategy {
    /// Stable string form for statistics reporting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedDelay => "fixed_delay",
            Self::ExponentialBackoff => "exponential_backoff",
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per UTC day
    pub daily_limit: u32,
    /// Maximum requests per hour
    pub hourly_limit: u32,
    /// Maximum requests per minute
    pub minute_limit: u32,
    /// Minimum delay between consecutive upstream requests
    pub delay_between_requests: Duration,
    /// Size of the concurrency slot pool
    pub max_concurrent_requests: usize,
    /// Delay strategy under consecutive failures
    pub strategy: BackoffStrategy,
    /// Multiplier applied per consecutive error under exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily_limit: 2000,
            hourly_limit: 100,
            minute_limit: 10,
            delay_between_requests: Duration::from_secs(1),
            max_concurrent_requests: 20,
            strategy: BackoffStrategy::FixedDelay,
            backoff_multiplier: 2.0,
        }
    }
}

/// Cache configuration: key namespace and the per-category TTL table.
///
/// The table is fixed at construction; individual `set` calls may override
/// the TTL.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Prefix for every cache key
    pub namespace: String,
    /// TTL for categories without a dedicated entry
    pub default_ttl: Duration,
    /// Quote TTL
    pub quote_ttl: Duration,
    /// Historical series TTL
    pub historical_ttl: Duration,
    /// Fundamentals TTL
    pub fundamentals_ttl: Duration,
    /// Financial statements TTL
    pub statements_ttl: Duration,
    /// Search results TTL
    pub search_ttl: Duration,
    /// Company profile TTL
    pub profile_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "qg".to_string(),
            default_ttl: Duration::from_secs(1800),
            quote_ttl: Duration::from_secs(300),
            historical_ttl: Duration::from_secs(3600),
            fundamentals_ttl: Duration::from_secs(7200),
            statements_ttl: Duration::from_secs(86400),
            search_ttl: Duration::from_secs(1800),
            profile_ttl: Duration::from_secs(7200),
        }
    }
}

impl CacheConfig {
    /// Effective TTL for a category.
    pub fn ttl_for(&self, category: CacheCategory) -> Duration {
        match category {
            CacheCategory::Quote => self.quote_ttl,
            CacheCategory::Historical => self.historical_ttl,
            CacheCategory::Fundamentals => self.fundamentals_ttl,
            CacheCategory::Statements => self.statements_ttl,
            CacheCategory::Search => self.search_ttl,
            CacheCategory::Profile => self.profile_ttl,
        }
    }
}

/// Upstream provider configuration.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// User-Agent header sent upstream
    pub user_agent: String,
    /// Market assumed when the caller does not specify one
    pub default_market: Market,
    /// Suffix appended to Indian symbols without an exchange suffix
    pub indian_symbol_suffix: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            default_market: Market::Us,
            indian_symbol_suffix: ".NS".to_string(),
        }
    }
}

/// What shape a resolved aggregate key takes in the global context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKeyKind {
    /// `{price, change_percent}`
    Index,
    /// `{rate, change_percent}`
    Forex,
    /// `{value}` - single scalar
    Scalar,
}

/// One provider symbol -> logical output key mapping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateKey {
    /// Physical provider symbol (e.g., "^GSPC")
    pub symbol: String,
    /// Logical output key (e.g., "sp500")
    pub key: String,
    /// Output shape
    pub kind: AggregateKeyKind,
    /// Whether a missing value fails the whole aggregate
    pub critical: bool,
}

impl AggregateKey {
    fn new(symbol: &str, key: &str, kind: AggregateKeyKind, critical: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            key: key.to_string(),
            kind,
            critical,
        }
    }
}

/// Global-context aggregation config: the symbol map and critical-key set.
///
/// Injected rather than hardcoded at the call site so deployments can
/// reshape the aggregate without code changes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Mapping entries, in output order
    pub keys: Vec<AggregateKey>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        use AggregateKeyKind::{Forex, Index, Scalar};
        Self {
            keys: vec![
                AggregateKey::new("^GSPC", "sp500", Index, true),
                AggregateKey::new("^IXIC", "nasdaq", Index, true),
                AggregateKey::new("^DJI", "dow_jones", Index, false),
                AggregateKey::new("^VIX", "vix", Scalar, true),
                AggregateKey::new("GC=F", "gold", Index, false),
                AggregateKey::new("USDINR=X", "usd_inr", Forex, false),
                AggregateKey::new("CL=F", "crude_oil", Index, false),
            ],
        }
    }
}

impl AggregateConfig {
    /// Provider symbols in output order.
    pub fn symbols(&self) -> Vec<String> {
        self.keys.iter().map(|k| k.symbol.clone()).collect()
    }

    /// Logical keys marked critical.
    pub fn critical_keys(&self) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| k.critical)
            .map(|k| k.key.as_str())
            .collect()
    }
}

/// Top-level service configuration.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    /// Rate limiter tunables
    pub rate_limit: RateLimitConfig,
    /// Cache tunables
    pub cache: CacheConfig,
    /// Upstream provider tunables
    pub provider: ProviderConfig,
    /// Global-context aggregation mapping
    pub aggregate: AggregateConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_table() {
        let config = CacheConfig::default();
        assert_eq!(
            config.ttl_for(CacheCategory::Quote),
            Duration::from_secs(300)
        );
        assert_eq!(
            config.ttl_for(CacheCategory::Statements),
            Duration::from_secs(86400)
        );
    }

    #[test]
    fn test_default_aggregate_mapping() {
        let config = AggregateConfig::default();
        assert_eq!(config.keys.len(), 7);
        assert_eq!(config.critical_keys(), vec!["sp500", "nasdaq", "vix"]);
        assert_eq!(config.symbols()[0], "^GSPC");
    }

    #[test]
    fn test_default_rate_limits() {
        let config = RateLimitConfig::default();
        assert_eq!(config.daily_limit, 2000);
        assert_eq!(config.minute_limit, 10);
        assert_eq!(config.strategy, BackoffStrategy::FixedDelay);
    }
}
