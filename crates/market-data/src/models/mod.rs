//! Canonical result models.
//!
//! This module contains the typed output shapes of the facade:
//! - `request` - Fetch operation, market and option types
//! - `quote` - Point-in-time quote snapshot (QuoteSnapshot)
//! - `fundamentals` - Fundamental ratios (Fundamentals)
//! - `history` - Historical price series (HistoricalSeries, Candle)
//! - `statements` - Financial statement tables (FinancialStatements)
//! - `profile` - Company profile data (CompanyProfile)
//! - `search` - Symbol search results (SearchResult)
//! - `context` - Global market context aggregate (GlobalContext)
//!
//! Every model carries the full canonical key set; fields the upstream
//! provider did not supply are `None`, never zero and never omitted from
//! serialized output.

mod context;
mod fundamentals;
mod history;
mod profile;
mod quote;
mod raw;
mod request;
mod search;
mod statements;

pub use context::{ContextValue, GlobalContext};
pub use fundamentals::Fundamentals;
pub use history::{Candle, HistoricalSeries};
pub use profile::CompanyProfile;
pub use quote::QuoteSnapshot;
pub use request::{FetchOperation, FetchOptions, FetchRequest, Market};
pub use search::SearchResult;
pub use statements::{FinancialStatements, StatementKind};

pub(crate) use raw::{decimal_field, string_field, u64_field};
