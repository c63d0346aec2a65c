//! Fetch orchestration: cache-first reads gated by the rate limiter.
//!
//! The pipeline for every logical query is: check the cache, otherwise
//! acquire a rate-limit permit, perform the upstream call with the permit
//! held across the full round trip, write the result through to the cache
//! (best-effort) and map the raw fields into the canonical shape.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheCategory, CacheStats, CacheStore};
use crate::config::ProviderConfig;
use crate::errors::MarketError;
use crate::limiter::{RateLimiter, RateLimiterStats};
use crate::models::{
    CompanyProfile, FetchOperation, FetchOptions, FetchRequest, FinancialStatements, Fundamentals,
    HistoricalSeries, Market, QuoteSnapshot, SearchResult, StatementKind,
};
use crate::provider::{adapt_symbol, UpstreamProvider};

const DEFAULT_PERIOD: &str = "1y";
const DEFAULT_INTERVAL: &str = "1d";
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Upstream request counters.
#[derive(Clone, Debug, Serialize)]
pub struct FetchStats {
    /// Upstream requests attempted
    pub total_requests: u64,
    /// Upstream requests that returned data
    pub successful_requests: u64,
    /// Upstream requests that failed
    pub failed_requests: u64,
    /// successful / max(total, 1)
    pub success_rate: f64,
}

/// Combined diagnostics for the whole facade.
#[derive(Clone, Debug, Serialize)]
pub struct ServiceStatistics {
    /// Orchestrator request counters
    pub requests: FetchStats,
    /// Rate limiter snapshot
    pub rate_limiter: RateLimiterStats,
    /// Cache counters
    pub cache: CacheStats,
}

/// Cache-first fetch orchestrator over one upstream provider.
pub struct FetchOrchestrator {
    provider: Arc<dyn UpstreamProvider>,
    limiter: Arc<RateLimiter>,
    cache: Arc<CacheStore>,
    config: ProviderConfig,
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
}

impl FetchOrchestrator {
    /// Create an orchestrator over the given collaborators.
    pub fn new(
        provider: Arc<dyn UpstreamProvider>,
        limiter: Arc<RateLimiter>,
        cache: Arc<CacheStore>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            provider,
            limiter,
            cache,
            config,
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
        }
    }

    /// The cache category a fetch operation stores under.
    fn category_for(operation: FetchOperation) -> CacheCategory {
        match operation {
            FetchOperation::Quote => CacheCategory::Quote,
            FetchOperation::Historical => CacheCategory::Historical,
            FetchOperation::Fundamentals => CacheCategory::Fundamentals,
            FetchOperation::Statements => CacheCategory::Statements,
            FetchOperation::Profile => CacheCategory::Profile,
            FetchOperation::Search => CacheCategory::Search,
        }
    }

    /// Cache identifier for a request. Composite when options affect the
    /// result, so variants of the same symbol do not collide.
    fn cache_identifier(request: &FetchRequest) -> Result<String, MarketError> {
        match request.operation {
            FetchOperation::Quote | FetchOperation::Fundamentals | FetchOperation::Profile => {
                Ok(request.symbol.clone())
            }
            FetchOperation::Historical => Ok(format!(
                "{}:{}:{}",
                request.symbol,
                request.options.period.as_deref().unwrap_or(DEFAULT_PERIOD),
                request
                    .options
                    .interval
                    .as_deref()
                    .unwrap_or(DEFAULT_INTERVAL)
            )),
            FetchOperation::Statements => {
                let kind = request.options.statement.ok_or_else(|| {
                    MarketError::InvalidRequest {
                        message: "statements fetch requires a statement kind".to_string(),
                    }
                })?;
                Ok(format!("{}:{}", request.symbol, kind))
            }
            FetchOperation::Search => Ok(format!(
                "{}:{}",
                request.symbol,
                request.options.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
            )),
        }
    }

    /// Invoke the provider operation for an adapted symbol.
    async fn dispatch(
        &self,
        request: &FetchRequest,
        symbol: &str,
    ) -> Result<Value, MarketError> {
        match request.operation {
            FetchOperation::Quote => self.provider.fetch_quote(symbol).await,
            FetchOperation::Historical => {
                let period = request.options.period.as_deref().unwrap_or(DEFAULT_PERIOD);
                let interval = request
                    .options
                    .interval
                    .as_deref()
                    .unwrap_or(DEFAULT_INTERVAL);
                self.provider.fetch_history(symbol, period, interval).await
            }
            FetchOperation::Fundamentals => self.provider.fetch_fundamentals(symbol).await,
            FetchOperation::Statements => {
                let kind = request.options.statement.ok_or_else(|| {
                    MarketError::InvalidRequest {
                        message: "statements fetch requires a statement kind".to_string(),
                    }
                })?;
                self.provider.fetch_statements(symbol, kind).await
            }
            FetchOperation::Profile => self.provider.fetch_profile(symbol).await,
            FetchOperation::Search => {
                let limit = request.options.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
                self.provider.search(symbol, limit).await
            }
        }
    }

    /// Run one fetch through the cache-first pipeline.
    ///
    /// A permit denial surfaces as [`MarketError::RateLimitExceeded`] so the
    /// caller can choose a fallback; upstream faults surface typed as well.
    pub async fn fetch_raw(
        &self,
        request: &FetchRequest,
        use_cache: bool,
    ) -> Result<Value, MarketError> {
        let category = Self::category_for(request.operation);
        let identifier = Self::cache_identifier(request)?;

        if use_cache {
            if let Some(cached) = self.cache.get::<Value>(category, &identifier).await {
                return Ok(cached);
            }
        }

        let Some(permit) = self.limiter.acquire_permit().await else {
            warn!(
                "Permit denied for {} {}",
                request.operation.as_str(),
                request.symbol
            );
            return Err(MarketError::RateLimitExceeded);
        };

        self.total_requests.fetch_add(1, Ordering::Relaxed);

        // The permit spans the inter-request delay and the upstream round
        // trip; the guard releases the slot on every exit path.
        let result = {
            let _permit = permit;
            self.limiter.wait_if_needed().await;
            let symbol = adapt_symbol(&request.symbol, request.market, &self.config);
            debug!(
                "Fetching {} for {} (upstream symbol {})",
                request.operation.as_str(),
                request.symbol,
                symbol
            );
            self.dispatch(request, &symbol).await
        };

        match result {
            Ok(raw) => {
                self.limiter.record_request(true);
                self.successful_requests.fetch_add(1, Ordering::Relaxed);
                if use_cache {
                    // Best-effort write-through; a cache fault is not a call fault
                    self.cache.set(category, &identifier, &raw, None).await;
                }
                Ok(raw)
            }
            Err(e) => {
                self.limiter.record_request(false);
                self.failed_requests.fetch_add(1, Ordering::Relaxed);
                error!(
                    "{} failed for {}: {}",
                    request.operation.as_str(),
                    request.symbol,
                    e
                );
                Err(e)
            }
        }
    }

    /// Absorb per-symbol upstream faults to `None`; everything else
    /// (notably rate-limit denial) stays a typed error.
    fn absorb<T>(result: Result<T, MarketError>) -> Result<Option<T>, MarketError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_upstream_fault() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Latest quote for a symbol.
    pub async fn get_quote(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<QuoteSnapshot>, MarketError> {
        let request = FetchRequest::new(FetchOperation::Quote, symbol, market);
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;
        Ok(raw.map(|raw| QuoteSnapshot::from_raw(symbol, &raw)))
    }

    /// Historical series for a symbol. An empty series is reported as
    /// absent, matching the null-vs-zero policy.
    pub async fn get_historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<HistoricalSeries>, MarketError> {
        let request = FetchRequest::new(FetchOperation::Historical, symbol, market).with_options(
            FetchOptions {
                period: Some(period.to_string()),
                interval: Some(interval.to_string()),
                ..FetchOptions::default()
            },
        );
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;
        Ok(raw
            .map(|raw| HistoricalSeries::from_raw(symbol, period, interval, &raw))
            .filter(|series| !series.candles.is_empty()))
    }

    /// Fundamental ratios for a symbol.
    pub async fn get_fundamentals(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<Fundamentals>, MarketError> {
        let request = FetchRequest::new(FetchOperation::Fundamentals, symbol, market);
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;
        Ok(raw.map(|raw| Fundamentals::from_raw(symbol, &raw)))
    }

    /// One financial statement table for a symbol. An empty table is
    /// reported as absent.
    pub async fn get_statements(
        &self,
        symbol: &str,
        kind: StatementKind,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<FinancialStatements>, MarketError> {
        let request = FetchRequest::new(FetchOperation::Statements, symbol, market).with_options(
            FetchOptions {
                statement: Some(kind),
                ..FetchOptions::default()
            },
        );
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;
        Ok(raw
            .map(|raw| FinancialStatements::from_raw(symbol, kind, &raw))
            .filter(|statements| !statements.is_empty()))
    }

    /// Company profile for a symbol.
    pub async fn get_company_profile(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<CompanyProfile>, MarketError> {
        let request = FetchRequest::new(FetchOperation::Profile, symbol, market);
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;
        Ok(raw.map(|raw| CompanyProfile::from_raw(symbol, &raw)))
    }

    /// Ranked symbol search. Upstream faults degrade to an empty list.
    pub async fn search_symbols(
        &self,
        query: &str,
        limit: usize,
        use_cache: bool,
    ) -> Result<Vec<SearchResult>, MarketError> {
        let request =
            FetchRequest::new(FetchOperation::Search, query, Market::Us).with_options(
                FetchOptions {
                    limit: Some(limit),
                    ..FetchOptions::default()
                },
            );
        let raw = Self::absorb(self.fetch_raw(&request, use_cache).await)?;

        let mut results: Vec<SearchResult> = raw
            .as_ref()
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(SearchResult::from_raw).collect())
            .unwrap_or_default();

        // Rank by provider score, best match first
        results.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .partial_cmp(&a.score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Combined diagnostics for the facade.
    pub fn statistics(&self) -> ServiceStatistics {
        let total = self.total_requests.load(Ordering::Relaxed);
        let successful = self.successful_requests.load(Ordering::Relaxed);
        ServiceStatistics {
            requests: FetchStats {
                total_requests: total,
                successful_requests: successful,
                failed_requests: self.failed_requests.load(Ordering::Relaxed),
                success_rate: successful as f64 / total.max(1) as f64,
            },
            rate_limiter: self.limiter.statistics(),
            cache: self.cache.stats(),
        }
    }

    /// Health signal: limiter within thresholds and cache backend alive.
    pub async fn is_healthy(&self) -> bool {
        self.limiter.is_healthy() && self.cache.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BackendError, CacheBackend, InMemoryBackend};
    use crate::config::{CacheConfig, RateLimitConfig};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct MockProvider {
        call_count: AtomicUsize,
        failing_symbols: HashSet<String>,
    }

    impl MockProvider {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                failing_symbols: HashSet::new(),
            }
        }

        fn failing_for(symbols: &[&str]) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                failing_symbols: symbols.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        fn respond(&self, symbol: &str, payload: Value) -> Result<Value, MarketError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.failing_symbols.contains(symbol) {
                Err(MarketError::Upstream {
                    message: "mock failure".to_string(),
                })
            } else {
                Ok(payload)
            }
        }
    }

    #[async_trait]
    impl UpstreamProvider for MockProvider {
        fn id(&self) -> &'static str {
            "MOCK"
        }

        async fn fetch_quote(&self, symbol: &str) -> Result<Value, MarketError> {
            self.respond(
                symbol,
                json!({"regularMarketPrice": 100.5, "regularMarketChangePercent": 1.2}),
            )
        }

        async fn fetch_history(
            &self,
            symbol: &str,
            period: &str,
            _interval: &str,
        ) -> Result<Value, MarketError> {
            let points = if period == "1mo" { 1 } else { 2 };
            let rows: Vec<Value> = (0..points)
                .map(|i| json!({"timestamp": 1_700_000_000 + i * 86_400, "close": 10.0 + i as f64}))
                .collect();
            self.respond(symbol, Value::Array(rows))
        }

        async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, MarketError> {
            self.respond(symbol, json!({"trailingPE": 25.0, "marketCap": 1.0e9}))
        }

        async fn fetch_statements(
            &self,
            symbol: &str,
            _kind: StatementKind,
        ) -> Result<Value, MarketError> {
            self.respond(symbol, json!({"totalRevenue": {"2023-12-31": 1.0e9}}))
        }

        async fn fetch_profile(&self, symbol: &str) -> Result<Value, MarketError> {
            self.respond(symbol, json!({"longName": "Mock Corp", "sector": "Tech"}))
        }

        async fn search(&self, query: &str, _limit: usize) -> Result<Value, MarketError> {
            self.respond(
                query,
                json!([
                    {"symbol": "AAA", "name": "Alpha", "score": 10.0},
                    {"symbol": "BBB", "name": "Beta", "score": 90.0},
                    {"symbol": "CCC", "name": "Gamma", "score": 50.0}
                ]),
            )
        }
    }

    fn quick_limits() -> RateLimitConfig {
        RateLimitConfig {
            delay_between_requests: Duration::ZERO,
            ..RateLimitConfig::default()
        }
    }

    fn orchestrator_with(
        provider: Arc<MockProvider>,
        limits: RateLimitConfig,
    ) -> FetchOrchestrator {
        let limiter = Arc::new(RateLimiter::new(limits));
        let cache = Arc::new(CacheStore::new(
            Arc::new(InMemoryBackend::new()),
            CacheConfig::default(),
        ));
        FetchOrchestrator::new(provider, limiter, cache, ProviderConfig::default())
    }

    #[tokio::test]
    async fn test_cache_first_short_circuits_upstream() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        let first = orchestrator.get_quote("AAPL", Market::Us, true).await.unwrap();
        assert!(first.is_some());
        assert_eq!(provider.calls(), 1);

        let second = orchestrator.get_quote("AAPL", Market::Us, true).await.unwrap();
        assert_eq!(second.unwrap().price, first.unwrap().price);
        // Served from cache, no second upstream call
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_bypass() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        orchestrator.get_quote("AAPL", Market::Us, false).await.unwrap();
        orchestrator.get_quote("AAPL", Market::Us, false).await.unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_permit_denial_is_typed() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(
            Arc::clone(&provider),
            RateLimitConfig {
                minute_limit: 0,
                delay_between_requests: Duration::ZERO,
                ..RateLimitConfig::default()
            },
        );

        let result = orchestrator.get_quote("AAPL", Market::Us, true).await;
        assert!(matches!(result, Err(MarketError::RateLimitExceeded)));
        // The provider was never reached
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_absorbed_and_recorded() {
        let provider = Arc::new(MockProvider::failing_for(&["BAD"]));
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        let result = orchestrator.get_quote("BAD", Market::Us, true).await.unwrap();
        assert!(result.is_none());

        let stats = orchestrator.statistics();
        assert_eq!(stats.requests.failed_requests, 1);
        assert_eq!(stats.rate_limiter.consecutive_errors, 1);
        // No permit leaked
        assert_eq!(stats.rate_limiter.active_requests, 0);
    }

    #[tokio::test]
    async fn test_composite_history_keys() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        let year = orchestrator
            .get_historical("AAPL", "1y", "1d", Market::Us, true)
            .await
            .unwrap()
            .unwrap();
        let month = orchestrator
            .get_historical("AAPL", "1mo", "1d", Market::Us, true)
            .await
            .unwrap()
            .unwrap();
        // Different options -> different cache keys -> two upstream calls
        assert_eq!(provider.calls(), 2);
        assert_eq!(year.total_points, 2);
        assert_eq!(month.total_points, 1);

        orchestrator
            .get_historical("AAPL", "1y", "1d", Market::Us, true)
            .await
            .unwrap();
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_write_through_failure_is_non_fatal() {
        struct BrokenBackend;

        #[async_trait]
        impl CacheBackend for BrokenBackend {
            async fn get(&self, _: &str) -> Result<Option<String>, BackendError> {
                Err(BackendError::new("down"))
            }
            async fn set_with_ttl(
                &self,
                _: &str,
                _: String,
                _: Duration,
            ) -> Result<(), BackendError> {
                Err(BackendError::new("down"))
            }
            async fn delete(&self, _: &str) -> Result<bool, BackendError> {
                Err(BackendError::new("down"))
            }
            async fn delete_pattern(&self, _: &str) -> Result<u64, BackendError> {
                Err(BackendError::new("down"))
            }
            async fn exists(&self, _: &str) -> Result<bool, BackendError> {
                Err(BackendError::new("down"))
            }
            async fn ttl_remaining(&self, _: &str) -> Result<Option<Duration>, BackendError> {
                Err(BackendError::new("down"))
            }
            async fn flush_all(&self) -> Result<(), BackendError> {
                Err(BackendError::new("down"))
            }
            async fn ping(&self) -> Result<(), BackendError> {
                Err(BackendError::new("down"))
            }
        }

        let provider = Arc::new(MockProvider::new());
        let limiter = Arc::new(RateLimiter::new(quick_limits()));
        let cache = Arc::new(CacheStore::new(Arc::new(BrokenBackend), CacheConfig::default()));
        let orchestrator = FetchOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn UpstreamProvider>,
            limiter,
            cache,
            ProviderConfig::default(),
        );

        // Both calls succeed against the upstream despite the dead cache
        assert!(orchestrator
            .get_quote("AAPL", Market::Us, true)
            .await
            .unwrap()
            .is_some());
        assert!(orchestrator
            .get_quote("AAPL", Market::Us, true)
            .await
            .unwrap()
            .is_some());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_is_ranked_and_truncated() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        let results = orchestrator.search_symbols("alp", 2, true).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].symbol, "BBB");
        assert_eq!(results[1].symbol, "CCC");
    }

    #[tokio::test]
    async fn test_statements_and_profile() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        let statements = orchestrator
            .get_statements("AAPL", StatementKind::Income, Market::Us, true)
            .await
            .unwrap()
            .unwrap();
        assert!(!statements.is_empty());

        let profile = orchestrator
            .get_company_profile("AAPL", Market::Us, true)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.name.as_deref(), Some("Mock Corp"));
    }

    #[tokio::test]
    async fn test_statistics_and_health() {
        let provider = Arc::new(MockProvider::new());
        let orchestrator = orchestrator_with(Arc::clone(&provider), quick_limits());

        orchestrator.get_quote("AAPL", Market::Us, true).await.unwrap();
        orchestrator.get_quote("AAPL", Market::Us, true).await.unwrap();

        let stats = orchestrator.statistics();
        assert_eq!(stats.requests.total_requests, 1);
        assert_eq!(stats.requests.success_rate, 1.0);
        assert_eq!(stats.cache.hits, 1);
        assert_eq!(stats.cache.sets, 1);
        assert!(orchestrator.is_healthy().await);
    }
}
