//! Concurrent batch fetching and aggregate assembly.
//!
//! All per-symbol fetches of a batch are launched together and joined
//! before the response is built: one slow or failing symbol never blocks
//! the others, and the caller always sees the complete batch. The
//! aggregate result preserves the caller-supplied symbol order.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use log::{error, info, warn};
use rust_decimal::Decimal;

use super::fetcher::FetchOrchestrator;
use crate::config::{AggregateConfig, AggregateKeyKind};
use crate::errors::MarketError;
use crate::models::{ContextValue, Fundamentals, GlobalContext, Market, QuoteSnapshot};

/// Why a symbol's fetch produced no payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// The local quota denied the request
    RateLimited,
    /// The upstream call failed or returned nothing usable
    Unavailable,
}

/// Outcome of one symbol within a batch.
#[derive(Clone, Debug)]
pub enum SymbolOutcome<T> {
    /// The fetch produced a payload
    Success(T),
    /// The fetch failed; the symbol degrades to absent
    Failed(FailureKind),
}

impl<T> SymbolOutcome<T> {
    /// The payload, if the fetch succeeded.
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failed(_) => None,
        }
    }
}

/// Joined results of one batch, in caller-supplied symbol order.
#[derive(Clone, Debug)]
pub struct BatchResult<T> {
    /// Per-symbol outcomes
    pub outcomes: Vec<(String, SymbolOutcome<T>)>,
    /// Symbols that produced a payload, in caller order
    pub succeeded: Vec<String>,
    /// Symbols that did not, in caller order
    pub failed: Vec<String>,
}

impl<T> BatchResult<T> {
    fn from_outcomes(outcomes: Vec<(String, SymbolOutcome<T>)>) -> Self {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (symbol, outcome) in &outcomes {
            match outcome {
                SymbolOutcome::Success(_) => succeeded.push(symbol.clone()),
                SymbolOutcome::Failed(_) => failed.push(symbol.clone()),
            }
        }
        Self {
            outcomes,
            succeeded,
            failed,
        }
    }

    /// Payload for a symbol, if its fetch succeeded.
    pub fn get(&self, symbol: &str) -> Option<&T> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .and_then(|(_, outcome)| outcome.payload())
    }

    /// Collapse into a symbol -> payload-or-null map.
    pub fn into_map(self) -> BTreeMap<String, Option<T>> {
        self.outcomes
            .into_iter()
            .map(|(symbol, outcome)| match outcome {
                SymbolOutcome::Success(payload) => (symbol, Some(payload)),
                SymbolOutcome::Failed(_) => (symbol, None),
            })
            .collect()
    }
}

/// Fans batches of symbols out to concurrent per-symbol fetches and
/// assembles aggregate responses.
pub struct BatchCoordinator {
    orchestrator: Arc<FetchOrchestrator>,
    aggregate: AggregateConfig,
}

impl BatchCoordinator {
    /// Create a coordinator over an orchestrator with an aggregation map.
    pub fn new(orchestrator: Arc<FetchOrchestrator>, aggregate: AggregateConfig) -> Self {
        Self {
            orchestrator,
            aggregate,
        }
    }

    /// Launch one fetch per symbol concurrently and join the outcomes.
    ///
    /// Per-symbol failures are absorbed into the outcome; the batch itself
    /// never fails here.
    async fn fan_out<T, F, Fut>(&self, symbols: &[String], fetch: F) -> BatchResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<T>, MarketError>>,
    {
        let tasks = symbols.iter().map(|symbol| {
            let symbol = symbol.clone();
            let future = fetch(symbol.clone());
            async move {
                let outcome = match future.await {
                    Ok(Some(payload)) => SymbolOutcome::Success(payload),
                    Ok(None) => SymbolOutcome::Failed(FailureKind::Unavailable),
                    Err(MarketError::RateLimitExceeded) => {
                        SymbolOutcome::Failed(FailureKind::RateLimited)
                    }
                    Err(e) => {
                        error!("Batch fetch failed for {}: {}", symbol, e);
                        SymbolOutcome::Failed(FailureKind::Unavailable)
                    }
                };
                (symbol, outcome)
            }
        });

        let outcomes = join_all(tasks).await;
        BatchResult::from_outcomes(outcomes)
    }

    /// Fetch quotes for a list of symbols concurrently.
    pub async fn fetch_quotes(
        &self,
        symbols: &[String],
        market: Market,
        use_cache: bool,
    ) -> BatchResult<QuoteSnapshot> {
        let orchestrator = &self.orchestrator;
        let result = self
            .fan_out(symbols, |symbol| async move {
                orchestrator.get_quote(&symbol, market, use_cache).await
            })
            .await;

        if !result.failed.is_empty() {
            warn!("Quote batch failed for symbols: {:?}", result.failed);
        }
        result
    }

    /// Fetch fundamentals for a list of symbols concurrently.
    pub async fn fetch_fundamentals(
        &self,
        symbols: &[String],
        market: Market,
        use_cache: bool,
    ) -> BatchResult<Fundamentals> {
        let orchestrator = &self.orchestrator;
        let result = self
            .fan_out(symbols, |symbol| async move {
                orchestrator
                    .get_fundamentals(&symbol, market, use_cache)
                    .await
            })
            .await;

        if !result.failed.is_empty() {
            warn!("Fundamentals batch failed for symbols: {:?}", result.failed);
        }
        result
    }

    /// Assemble the global market context from the configured symbol map.
    ///
    /// Non-critical keys that cannot be resolved are omitted; any missing
    /// critical key fails the whole call with the structured detail of
    /// what is missing. The check runs only after all fetches complete.
    pub async fn global_context(&self, use_cache: bool) -> Result<GlobalContext, MarketError> {
        let symbols = self.aggregate.symbols();
        info!("Fetching global context for {} symbols", symbols.len());

        let batch = self.fetch_quotes(&symbols, Market::Us, use_cache).await;

        let mut values = BTreeMap::new();
        let mut missing = Vec::new();
        let mut critical_missing = false;

        for entry in &self.aggregate.keys {
            let resolved = batch.get(&entry.symbol).and_then(|quote| {
                quote
                    .price
                    .map(|price| (price, quote.change_percent.unwrap_or(Decimal::ZERO)))
            });

            match resolved {
                Some((price, change_percent)) => {
                    let value = match entry.kind {
                        AggregateKeyKind::Index => ContextValue::Index {
                            price,
                            change_percent,
                        },
                        AggregateKeyKind::Forex => ContextValue::Forex {
                            rate: price,
                            change_percent,
                        },
                        AggregateKeyKind::Scalar => ContextValue::Scalar { value: price },
                    };
                    values.insert(entry.key.clone(), value);
                }
                None => {
                    missing.push(entry.key.clone());
                    if entry.critical {
                        critical_missing = true;
                    }
                }
            }
        }

        if critical_missing {
            warn!(
                "Critical market data unavailable, missing: {:?}, failed symbols: {:?}",
                missing, batch.failed
            );
            return Err(MarketError::ServiceUnavailable {
                missing,
                failed_symbols: batch.failed,
            });
        }

        if !missing.is_empty() {
            warn!("Missing non-critical context keys: {:?}", missing);
        }

        Ok(GlobalContext {
            values,
            timestamp: Utc::now(),
        })
    }
}
