//! Top-level service facade.
//!
//! One explicit context struct owning the limiter, cache, orchestrator and
//! batch coordinator. The hosting process constructs it once with its
//! chosen provider and cache backend and passes it to request handlers;
//! there are no module-global singletons.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{CacheBackend, CacheStore};
use crate::config::ServiceConfig;
use crate::errors::MarketError;
use crate::limiter::RateLimiter;
use crate::models::{
    CompanyProfile, FinancialStatements, Fundamentals, GlobalContext, HistoricalSeries, Market,
    QuoteSnapshot, SearchResult, StatementKind,
};
use crate::orchestrator::{BatchCoordinator, BatchResult, FetchOrchestrator, ServiceStatistics};
use crate::provider::UpstreamProvider;

/// The assembled market data facade.
pub struct MarketDataService {
    orchestrator: Arc<FetchOrchestrator>,
    batch: BatchCoordinator,
}

impl MarketDataService {
    /// Wire the facade together from a provider, a cache backend and
    /// configuration.
    pub fn new(
        provider: Arc<dyn UpstreamProvider>,
        backend: Arc<dyn CacheBackend>,
        config: ServiceConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let cache = Arc::new(CacheStore::new(backend, config.cache));
        let orchestrator = Arc::new(FetchOrchestrator::new(
            provider,
            limiter,
            cache,
            config.provider,
        ));
        let batch = BatchCoordinator::new(Arc::clone(&orchestrator), config.aggregate);
        Self {
            orchestrator,
            batch,
        }
    }

    /// Latest quote for a symbol, or `None` when the upstream failed.
    pub async fn get_quote(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<QuoteSnapshot>, MarketError> {
        self.orchestrator.get_quote(symbol, market, use_cache).await
    }

    /// Fundamental ratios for a symbol.
    pub async fn get_fundamentals(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<Fundamentals>, MarketError> {
        self.orchestrator
            .get_fundamentals(symbol, market, use_cache)
            .await
    }

    /// Historical price series for a symbol.
    pub async fn get_historical(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<HistoricalSeries>, MarketError> {
        self.orchestrator
            .get_historical(symbol, period, interval, market, use_cache)
            .await
    }

    /// One financial statement table for a symbol.
    pub async fn get_statements(
        &self,
        symbol: &str,
        kind: StatementKind,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<FinancialStatements>, MarketError> {
        self.orchestrator
            .get_statements(symbol, kind, market, use_cache)
            .await
    }

    /// Company profile for a symbol.
    pub async fn get_company_profile(
        &self,
        symbol: &str,
        market: Market,
        use_cache: bool,
    ) -> Result<Option<CompanyProfile>, MarketError> {
        self.orchestrator
            .get_company_profile(symbol, market, use_cache)
            .await
    }

    /// Ranked symbol search.
    pub async fn search_symbols(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, MarketError> {
        self.orchestrator.search_symbols(query, limit, true).await
    }

    /// Global market context aggregate. Fails with
    /// [`MarketError::ServiceUnavailable`] when critical keys are missing.
    pub async fn get_global_context(&self) -> Result<GlobalContext, MarketError> {
        self.batch.global_context(true).await
    }

    /// Quotes for a list of symbols, fetched concurrently.
    pub async fn get_quotes_batch(
        &self,
        symbols: &[String],
        market: Market,
    ) -> BatchResult<QuoteSnapshot> {
        self.batch.fetch_quotes(symbols, market, true).await
    }

    /// Fundamentals for a list of symbols as a symbol -> payload-or-null
    /// map, fetched concurrently.
    pub async fn get_fundamentals_batch(
        &self,
        symbols: &[String],
        market: Market,
    ) -> BTreeMap<String, Option<Fundamentals>> {
        self.batch
            .fetch_fundamentals(symbols, market, true)
            .await
            .into_map()
    }

    /// Combined rate-limit, cache and request statistics.
    pub fn get_statistics(&self) -> ServiceStatistics {
        self.orchestrator.statistics()
    }

    /// Whether the limiter is within thresholds and the cache backend is
    /// reachable.
    pub async fn is_healthy(&self) -> bool {
        self.orchestrator.is_healthy().await
    }
}
