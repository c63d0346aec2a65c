//! Fetch orchestration and batch coordination.
//!
//! - `fetcher` - Cache-first single-query pipeline (FetchOrchestrator)
//! - `batch` - Concurrent fan-out and aggregate assembly (BatchCoordinator)

mod batch;
mod fetcher;

pub use batch::{BatchCoordinator, BatchResult, FailureKind, SymbolOutcome};
pub use fetcher::{FetchOrchestrator, FetchStats, ServiceStatistics};
