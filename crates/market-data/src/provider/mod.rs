//! Upstream provider abstractions and implementations.
//!
//! The facade treats the upstream as an opaque, possibly-slow,
//! possibly-rate-limited symbol -> fields lookup. Providers own transport
//! (HTTP, auth) and return raw field maps; the canonical field mapping
//! happens above, in the orchestrator's models.
//!
//! Symbol-format adaptation (market suffixes) happens at the call boundary
//! before a provider is invoked - see [`adapt_symbol`].

mod symbol;

pub mod yahoo;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::MarketError;
use crate::models::StatementKind;

pub use symbol::adapt_symbol;
pub use yahoo::YahooProvider;

/// An upstream financial-data provider.
///
/// Implementations return the provider's raw schema as `serde_json::Value`:
/// a flat field map for quote/fundamentals/profile, a row array for
/// history and search, a line-item table for statements.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Unique identifier, used in logs.
    fn id(&self) -> &'static str;

    /// Fetch the raw quote field map for a symbol.
    async fn fetch_quote(&self, symbol: &str) -> Result<Value, MarketError>;

    /// Fetch raw historical rows for a symbol over a period/interval.
    async fn fetch_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Value, MarketError>;

    /// Fetch the raw fundamentals field map for a symbol.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, MarketError>;

    /// Fetch one raw statement table for a symbol.
    async fn fetch_statements(
        &self,
        symbol: &str,
        kind: StatementKind,
    ) -> Result<Value, MarketError>;

    /// Fetch the raw company profile field map for a symbol.
    async fn fetch_profile(&self, symbol: &str) -> Result<Value, MarketError>;

    /// Search symbols matching a query; returns raw result rows.
    async fn search(&self, query: &str, limit: usize) -> Result<Value, MarketError>;
}
