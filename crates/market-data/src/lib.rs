//! Quotegate Market Data Crate
//!
//! This crate provides a data-aggregation facade over an upstream
//! financial-data provider: cache-first reads, request-rate ceilings and
//! concurrent batch fan-out with graceful per-symbol degradation.
//!
//! # Overview
//!
//! The facade supports:
//! - Quotes, historical series, fundamentals, statements, profiles, search
//! - Multi-window quota enforcement (minute/hour/day) plus a bounded
//!   concurrency pool
//! - Keyed TTL caching over any durable key-value backend
//! - Batch fetching with partial-failure aggregation and a configurable
//!   critical-key policy
//!
//! # Architecture
//!
//! ```text
//! +---------------------+
//! |  MarketDataService  |  (explicit context, no globals)
//! +---------------------+
//!       |           |
//!       v           v
//! +-----------+  +-------------------+
//! |   Batch   |->| FetchOrchestrator |  (cache-first pipeline)
//! +-----------+  +-------------------+
//!                  |        |       |
//!                  v        v       v
//!           +--------+ +-------+ +----------+
//!           | Limiter| | Cache | | Provider |  (Yahoo, or any impl)
//!           +--------+ +-------+ +----------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataService`] - The assembled facade
//! - [`FetchOrchestrator`] - Cache-first single-query pipeline
//! - [`BatchCoordinator`] - Concurrent fan-out and aggregation
//! - [`RateLimiter`] - Quota windows + concurrency permits
//! - [`CacheStore`] - Keyed TTL store over a [`CacheBackend`]
//! - [`UpstreamProvider`] - The opaque upstream collaborator trait
//! - [`QuoteSnapshot`], [`Fundamentals`], [`HistoricalSeries`],
//!   [`FinancialStatements`], [`CompanyProfile`], [`SearchResult`],
//!   [`GlobalContext`] - Canonical result models

pub mod cache;
pub mod config;
pub mod errors;
pub mod limiter;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod service;

// Re-export all public types from models
pub use models::{
    Candle, CompanyProfile, ContextValue, FetchOperation, FetchOptions, FetchRequest,
    FinancialStatements, Fundamentals, GlobalContext, HistoricalSeries, Market, QuoteSnapshot,
    SearchResult, StatementKind,
};

// Re-export configuration types
pub use config::{
    AggregateConfig, AggregateKey, AggregateKeyKind, BackoffStrategy, CacheConfig, ProviderConfig,
    RateLimitConfig, ServiceConfig,
};

// Re-export subsystem types
pub use cache::{
    BackendError, CacheBackend, CacheCategory, CacheStats, CacheStore, InMemoryBackend,
};
pub use errors::MarketError;
pub use limiter::{QuotaWindow, RateLimiter, RateLimiterStats, RequestPermit, WindowKind};
pub use orchestrator::{
    BatchCoordinator, BatchResult, FailureKind, FetchOrchestrator, FetchStats, ServiceStatistics,
    SymbolOutcome,
};
pub use provider::{adapt_symbol, UpstreamProvider, YahooProvider};
pub use service::MarketDataService;
