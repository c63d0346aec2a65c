//! Symbol-format adaptation for non-default markets.

use crate::config::ProviderConfig;
use crate::models::Market;

/// Adapt a caller-supplied symbol to the upstream provider's format.
///
/// Indian symbols get the configured NSE suffix unless they already carry
/// an exchange suffix; other markets pass through unchanged.
pub fn adapt_symbol(symbol: &str, market: Market, config: &ProviderConfig) -> String {
    match market {
        Market::India if !symbol.ends_with(".NS") && !symbol.ends_with(".BO") => {
            format!("{}{}", symbol, config.indian_symbol_suffix)
        }
        _ => symbol.to_string(),
    }
}
