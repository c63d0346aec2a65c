//! Yahoo Finance upstream provider.
//!
//! Talks to the public Yahoo Finance query API:
//! - quoteSummary for quotes, fundamentals, profiles and statements
//! - chart for historical series
//! - search for symbol lookup
//!
//! Responses are normalized into flat raw field maps / row arrays; the
//! canonical mapping to typed models happens in the orchestrator layer.

use std::sync::RwLock;

use async_trait::async_trait;
use lazy_static::lazy_static;
use reqwest::header;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use urlencoding::encode;

use crate::config::ProviderConfig;
use crate::errors::MarketError;
use crate::models::StatementKind;
use crate::provider::UpstreamProvider;

const QUERY_BASE: &str = "https://query1.finance.yahoo.com";

// ============================================================================
// Crumb/Cookie Authentication
// ============================================================================

/// Cached Yahoo authentication data
#[derive(Debug, Clone)]
struct CrumbData {
    cookie: String,
    crumb: String,
}

lazy_static! {
    /// Process-wide cache for the Yahoo authentication crumb
    static ref YAHOO_CRUMB: RwLock<Option<CrumbData>> = RwLock::default();
}

// ============================================================================
// Response Normalization
// ============================================================================

/// Unwrap Yahoo's `{"raw": x, "fmt": "..."}` number envelopes.
fn unwrap_raw(value: &Value) -> Value {
    match value.get("raw") {
        Some(raw) => raw.clone(),
        None => value.clone(),
    }
}

/// Merge all requested quoteSummary modules into one flat field map.
fn flatten_modules(result: &Value) -> Value {
    let mut flat = Map::new();
    if let Some(modules) = result.as_object() {
        for module in modules.values() {
            if let Some(fields) = module.as_object() {
                for (key, value) in fields {
                    if key == "maxAge" {
                        continue;
                    }
                    flat.insert(key.clone(), unwrap_raw(value));
                }
            }
        }
    }
    Value::Object(flat)
}

/// Convert a statement-history module into a line-item table:
/// `{"<line item>": {"<period-end date>": number|null}}`.
fn statements_table(result: &Value, module: &str) -> Value {
    let mut table: Map<String, Value> = Map::new();
    let statements = result
        .get(module)
        .and_then(|m| m.get(module))
        .and_then(Value::as_array);

    for statement in statements.into_iter().flatten() {
        let Some(fields) = statement.as_object() else {
            continue;
        };
        let Some(date) = fields
            .get("endDate")
            .and_then(|d| d.get("fmt"))
            .and_then(Value::as_str)
        else {
            continue;
        };

        for (key, value) in fields {
            if key == "endDate" || key == "maxAge" {
                continue;
            }
            let row = table
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Some(row) = row.as_object_mut() {
                row.insert(date.to_string(), unwrap_raw(value));
            }
        }
    }
    Value::Object(table)
}

/// Convert a chart response into raw history rows:
/// `[{"timestamp": unix_secs, "open": ..., "high": ..., ...}]`.
fn chart_rows(chart: &Value) -> Value {
    let result = &chart["chart"]["result"][0];
    let timestamps = result.get("timestamp").and_then(Value::as_array);
    let quote = &result["indicators"]["quote"][0];

    let mut rows = Vec::new();
    for (i, ts) in timestamps.into_iter().flatten().enumerate() {
        let mut row = Map::new();
        row.insert("timestamp".to_string(), ts.clone());
        for field in ["open", "high", "low", "close", "volume"] {
            let value = quote
                .get(field)
                .and_then(Value::as_array)
                .and_then(|col| col.get(i))
                .cloned()
                .unwrap_or(Value::Null);
            row.insert(field.to_string(), value);
        }
        rows.push(Value::Object(row));
    }
    Value::Array(rows)
}

/// Convert a search response into raw result rows.
fn search_rows(response: &Value) -> Value {
    let quotes = response.get("quotes").and_then(Value::as_array);

    let rows: Vec<Value> = quotes
        .into_iter()
        .flatten()
        .filter_map(|quote| {
            let symbol = quote.get("symbol").and_then(Value::as_str)?;
            let name = quote
                .get("shortname")
                .or_else(|| quote.get("longname"))
                .and_then(Value::as_str)
                .unwrap_or(symbol);
            let mut row = Map::new();
            row.insert("symbol".to_string(), Value::String(symbol.to_string()));
            row.insert("name".to_string(), Value::String(name.to_string()));
            row.insert(
                "exchange".to_string(),
                quote.get("exchange").cloned().unwrap_or(Value::Null),
            );
            row.insert(
                "asset_type".to_string(),
                quote.get("quoteType").cloned().unwrap_or(Value::Null),
            );
            row.insert(
                "score".to_string(),
                quote.get("score").cloned().unwrap_or(Value::Null),
            );
            Some(Value::Object(row))
        })
        .collect();
    Value::Array(rows)
}

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance upstream provider.
pub struct YahooProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
    pub fn new(config: ProviderConfig) -> Result<Self, MarketError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn upstream(message: impl Into<String>) -> MarketError {
        MarketError::Upstream {
            message: message.into(),
        }
    }

    // ========================================================================
    // Crumb/Cookie Authentication
    // ========================================================================

    /// Return the cached authentication crumb, fetching one if needed.
    async fn ensure_crumb(&self) -> Result<CrumbData, MarketError> {
        {
            let guard = YAHOO_CRUMB.read().unwrap_or_else(|p| p.into_inner());
            if let Some(crumb) = guard.as_ref() {
                return Ok(crumb.clone());
            }
        }
        self.fetch_crumb().await
    }

    /// Fetch a new authentication crumb (cookie first, then crumb).
    async fn fetch_crumb(&self) -> Result<CrumbData, MarketError> {
        let response = self
            .client
            .get("https://fc.yahoo.com")
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| Self::upstream("Failed to parse Yahoo cookie"))?;

        let crumb = self
            .client
            .get(format!("{}/v1/test/getcrumb", QUERY_BASE))
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .header(header::COOKIE, cookie.as_str())
            .send()
            .await?
            .text()
            .await?;

        if crumb.is_empty() || crumb.contains("Invalid") {
            return Err(Self::upstream("Failed to obtain Yahoo crumb"));
        }

        let crumb_data = CrumbData { cookie, crumb };
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(crumb_data.clone());

        Ok(crumb_data)
    }

    /// Drop the cached crumb (used when authentication expires).
    fn clear_crumb(&self) {
        let mut guard = YAHOO_CRUMB.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Fetch quoteSummary modules for a symbol and return the merged result.
    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value, MarketError> {
        let crumb = self.ensure_crumb().await?;
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}&crumb={}",
            QUERY_BASE,
            encode(symbol),
            modules,
            encode(&crumb.crumb)
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .header(header::COOKIE, crumb.cookie.as_str())
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                self.clear_crumb();
                return Err(Self::upstream("Yahoo authentication expired"));
            }
            reqwest::StatusCode::NOT_FOUND => {
                return Err(MarketError::SymbolNotFound(symbol.to_string()));
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                warn!("Yahoo returned HTTP 429 for {}", symbol);
                return Err(Self::upstream("Rate limited by upstream (HTTP 429)"));
            }
            status if !status.is_success() => {
                return Err(Self::upstream(format!("Yahoo returned HTTP {}", status)));
            }
            _ => {}
        }

        let data: Value = response.json().await?;
        let result = &data["quoteSummary"]["result"][0];
        if result.is_null() {
            debug!("Empty quoteSummary result for {}", symbol);
            return Err(MarketError::SymbolNotFound(symbol.to_string()));
        }
        Ok(result.clone())
    }
}

#[async_trait]
impl UpstreamProvider for YahooProvider {
    fn id(&self) -> &'static str {
        "YAHOO"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Value, MarketError> {
        let result = self
            .quote_summary(symbol, "price,summaryDetail,defaultKeyStatistics")
            .await?;
        Ok(flatten_modules(&result))
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        period: &str,
        interval: &str,
    ) -> Result<Value, MarketError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            QUERY_BASE,
            encode(symbol),
            encode(period),
            encode(interval)
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketError::SymbolNotFound(symbol.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::upstream(format!(
                "Yahoo chart returned HTTP {}",
                response.status()
            )));
        }

        let chart: Value = response.json().await?;
        if chart["chart"]["result"][0].is_null() {
            return Err(MarketError::SymbolNotFound(symbol.to_string()));
        }
        Ok(chart_rows(&chart))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Value, MarketError> {
        let result = self
            .quote_summary(
                symbol,
                "summaryDetail,financialData,defaultKeyStatistics,price",
            )
            .await?;
        Ok(flatten_modules(&result))
    }

    async fn fetch_statements(
        &self,
        symbol: &str,
        kind: StatementKind,
    ) -> Result<Value, MarketError> {
        let module = match kind {
            StatementKind::Income => "incomeStatementHistory",
            StatementKind::Balance => "balanceSheetHistory",
            StatementKind::CashFlow => "cashflowStatementHistory",
        };
        let result = self.quote_summary(symbol, module).await?;
        Ok(statements_table(&result, module))
    }

    async fn fetch_profile(&self, symbol: &str) -> Result<Value, MarketError> {
        let result = self
            .quote_summary(symbol, "assetProfile,price,summaryDetail")
            .await?;
        Ok(flatten_modules(&result))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Value, MarketError> {
        let url = format!(
            "{}/v1/finance/search?q={}&quotesCount={}&newsCount=0",
            QUERY_BASE,
            encode(query),
            limit
        );

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, self.config.user_agent.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::upstream(format!(
                "Yahoo search returned HTTP {}",
                response.status()
            )));
        }

        let data: Value = response.json().await?;
        Ok(search_rows(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_raw() {
        assert_eq!(unwrap_raw(&json!({"raw": 150.25, "fmt": "150.25"})), json!(150.25));
        assert_eq!(unwrap_raw(&json!("Technology")), json!("Technology"));
        assert_eq!(unwrap_raw(&json!(42)), json!(42));
    }

    #[test]
    fn test_flatten_modules() {
        let result = json!({
            "price": {
                "maxAge": 1,
                "regularMarketPrice": {"raw": 150.25, "fmt": "150.25"},
                "currency": "USD"
            },
            "summaryDetail": {
                "maxAge": 1,
                "trailingPE": {"raw": 28.5, "fmt": "28.50"},
                "dividendYield": {}
            }
        });

        let flat = flatten_modules(&result);
        assert_eq!(flat["regularMarketPrice"], json!(150.25));
        assert_eq!(flat["trailingPE"], json!(28.5));
        assert_eq!(flat["currency"], json!("USD"));
        assert!(flat.get("maxAge").is_none());
        // Empty envelope stays an empty object; field readers treat it as absent
        assert_eq!(flat["dividendYield"], json!({}));
    }

    #[test]
    fn test_statements_table() {
        let result = json!({
            "incomeStatementHistory": {
                "maxAge": 86400,
                "incomeStatementHistory": [
                    {
                        "maxAge": 1,
                        "endDate": {"raw": 1703980800, "fmt": "2023-12-31"},
                        "totalRevenue": {"raw": 383285000000.0, "fmt": "383.29B"},
                        "netIncome": {"raw": 96995000000.0, "fmt": "97B"}
                    },
                    {
                        "maxAge": 1,
                        "endDate": {"raw": 1672444800, "fmt": "2022-12-31"},
                        "totalRevenue": {"raw": 394328000000.0, "fmt": "394.33B"},
                        "netIncome": null
                    }
                ]
            }
        });

        let table = statements_table(&result, "incomeStatementHistory");
        assert_eq!(table["totalRevenue"]["2023-12-31"], json!(383285000000.0));
        assert_eq!(table["totalRevenue"]["2022-12-31"], json!(394328000000.0));
        assert_eq!(table["netIncome"]["2022-12-31"], json!(null));
        assert!(table.get("endDate").is_none());
        assert!(table.get("maxAge").is_none());
    }

    #[test]
    fn test_chart_rows() {
        let chart = json!({
            "chart": {
                "result": [{
                    "timestamp": [1700000000i64, 1700086400i64],
                    "indicators": {
                        "quote": [{
                            "open": [10.0, 10.5],
                            "high": [11.0, 12.0],
                            "low": [9.5, 10.0],
                            "close": [10.5, null],
                            "volume": [1000, 1500]
                        }]
                    }
                }]
            }
        });

        let rows = chart_rows(&chart);
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["timestamp"], json!(1700000000i64));
        assert_eq!(rows[0]["close"], json!(10.5));
        // Null close survives as null, not zero
        assert_eq!(rows[1]["close"], json!(null));
        assert_eq!(rows[1]["volume"], json!(1500));
    }

    #[test]
    fn test_search_rows() {
        let response = json!({
            "quotes": [
                {
                    "symbol": "AAPL",
                    "shortname": "Apple Inc.",
                    "exchange": "NMS",
                    "quoteType": "EQUITY",
                    "score": 25044.0
                },
                {"noSymbol": true},
                {"symbol": "APLE", "longname": "Apple Hospitality REIT"}
            ]
        });

        let rows = search_rows(&response);
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["symbol"], json!("AAPL"));
        assert_eq!(rows[0]["name"], json!("Apple Inc."));
        assert_eq!(rows[1]["name"], json!("Apple Hospitality REIT"));
        assert_eq!(rows[1]["score"], json!(null));
    }

    #[test]
    fn test_empty_responses_normalize_to_empty() {
        assert_eq!(chart_rows(&json!({})), json!([]));
        assert_eq!(search_rows(&json!({})), json!([]));
        assert_eq!(flatten_modules(&json!(null)), json!({}));
    }
}
