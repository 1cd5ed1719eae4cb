//! Financial Modeling Prep API client

use super::{
    Article, DateRange, FundamentalsDocument, FundamentalsSource, NewsSearch, PriceHistorySource,
    SearchQuery,
};
use crate::error::{ResearchError, Result};
use crate::indicators::OhlcvBar;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use research_core::Ticker;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";
const PROVIDER: &str = "fmp";

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// One fundamentals endpoint
struct Endpoint {
    section: &'static str,
    path: &'static str,
    quarterly: bool,
    limit: Option<u32>,
}

const fn annual(section: &'static str, path: &'static str) -> Endpoint {
    Endpoint { section, path, quarterly: false, limit: Some(2) }
}

const fn quarterly(section: &'static str, path: &'static str) -> Endpoint {
    Endpoint { section, path, quarterly: true, limit: Some(2) }
}

/// Annual and quarterly statements, ratios, earnings and the company profile
const FUNDAMENTAL_ENDPOINTS: &[Endpoint] = &[
    annual("income_statement", "income-statement"),
    annual("balance_sheet", "balance-sheet-statement"),
    annual("cash_flow", "cash-flow-statement"),
    annual("financial_ratios", "ratios"),
    annual("key_metrics", "key-metrics"),
    annual("enterprise_value", "enterprise-values"),
    quarterly("quarterly_income_statement", "income-statement"),
    quarterly("quarterly_balance_sheet", "balance-sheet-statement"),
    quarterly("quarterly_cash_flow", "cash-flow-statement"),
    quarterly("quarterly_ratios", "ratios"),
    quarterly("quarterly_key_metrics", "key-metrics"),
    annual("quarterly_earnings", "earnings"),
    quarterly("quarterly_financial_growth", "financial-growth"),
    Endpoint { section: "company_profile", path: "profile", quarterly: false, limit: None },
];

/// Financial Modeling Prep client
///
/// Every request waits on a shared rate limiter sized to the key's plan.
#[derive(Debug, Clone)]
pub struct FmpClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
}

#[derive(Debug, Deserialize)]
struct HistoricalResponse {
    #[serde(default)]
    historical: Vec<HistoricalBar>,
}

#[derive(Debug, Deserialize)]
struct HistoricalBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsItem {
    title: String,
    url: String,
    #[serde(default)]
    site: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    text: String,
}

impl FmpClient {
    /// Create a client allowing `requests_per_minute` calls
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create from `FMP_API_KEY`
    pub fn from_env(requests_per_minute: u32) -> Result<Self> {
        let api_key = research_utils::env_var("FMP_API_KEY").ok_or_else(|| {
            ResearchError::ConfigError("FMP_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key, requests_per_minute))
    }

    /// Point the client at another base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{path}", self.base_url);
        debug!(url = %url, "FMP request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ResearchError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ResearchError::api(PROVIDER, format!("HTTP error: {status} for {path}")));
        }

        let data: Value = response.json().await?;
        check_error_payload(&data)?;
        Ok(data)
    }

    /// Daily bars for a range, oldest first
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn historical_prices(&self, ticker: &Ticker, range: DateRange) -> Result<Vec<OhlcvBar>> {
        let data = self
            .get_json(
                &format!("historical-price-full/{ticker}"),
                &[
                    ("from", range.from.to_string()),
                    ("to", range.to.to_string()),
                ],
            )
            .await?;

        let bars = parse_historical(data)?;
        if bars.is_empty() {
            return Err(ResearchError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "No historical data".to_string(),
            });
        }
        Ok(bars)
    }

    /// All fundamentals sections, fetched concurrently
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn fundamentals_document(&self, ticker: &Ticker) -> Result<FundamentalsDocument> {
        let fetches = FUNDAMENTAL_ENDPOINTS.iter().map(|endpoint| async move {
            let mut params = Vec::new();
            if endpoint.quarterly {
                params.push(("period", "quarter".to_string()));
            }
            if let Some(limit) = endpoint.limit {
                params.push(("limit", limit.to_string()));
            }
            let result = self
                .get_json(&format!("{}/{ticker}", endpoint.path), &params)
                .await;
            (endpoint.section, result)
        });

        let mut document = FundamentalsDocument {
            ticker: ticker.to_string(),
            ..FundamentalsDocument::default()
        };
        for (section, result) in join_all(fetches).await {
            match result {
                Ok(data) if is_empty_payload(&data) => {
                    document.sections.insert(
                        section.to_string(),
                        Value::String(format!("No {section} data available for {ticker}")),
                    );
                }
                Ok(data) => {
                    document.sections.insert(section.to_string(), data);
                }
                Err(e) => {
                    warn!(section, error = %e, "FMP fundamentals section unavailable");
                    document.unavailable.insert(section.to_string(), e.to_string());
                }
            }
        }

        if document.sections.is_empty() {
            let first = document
                .unavailable
                .values()
                .next()
                .cloned()
                .unwrap_or_default();
            return Err(ResearchError::api(
                PROVIDER,
                format!("all fundamentals endpoints failed for {ticker}: {first}"),
            ));
        }
        Ok(document)
    }

    /// Stock news for a ticker
    #[instrument(skip(self), fields(ticker = %query.ticker))]
    pub async fn stock_news(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        let data = self
            .get_json(
                "stock_news",
                &[
                    ("tickers", query.ticker.to_string()),
                    ("from", query.range.from.to_string()),
                    ("to", query.range.to.to_string()),
                    ("limit", query.max_results.to_string()),
                ],
            )
            .await?;

        let mut articles = parse_news(data)?;
        articles.truncate(query.max_results);
        Ok(articles)
    }
}

/// FMP reports some errors as a 200 with an `Error Message` field
fn check_error_payload(data: &Value) -> Result<()> {
    match data.get("Error Message").or_else(|| data.get("error")) {
        Some(message) => Err(ResearchError::api(
            PROVIDER,
            message.as_str().map_or_else(|| message.to_string(), str::to_string),
        )),
        None => Ok(()),
    }
}

fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn parse_historical(data: Value) -> Result<Vec<OhlcvBar>> {
    let response: HistoricalResponse = serde_json::from_value(data)?;
    let mut bars: Vec<OhlcvBar> = response
        .historical
        .into_iter()
        .map(|bar| OhlcvBar {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume.max(0.0).round() as u64,
        })
        .collect();
    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

fn parse_news(data: Value) -> Result<Vec<Article>> {
    let items: Vec<NewsItem> = serde_json::from_value(data)?;
    Ok(items
        .into_iter()
        .map(|item| Article {
            title: item.title,
            url: item.url,
            source: item.site,
            published: item.published_date,
            summary: item.text,
        })
        .collect())
}

#[async_trait]
impl PriceHistorySource for FmpClient {
    async fn price_history(
        &self,
        ticker: &Ticker,
        range: DateRange,
    ) -> research_core::Result<Vec<OhlcvBar>> {
        Ok(self.historical_prices(ticker, range).await?)
    }
}

#[async_trait]
impl FundamentalsSource for FmpClient {
    async fn fundamentals(&self, ticker: &Ticker) -> research_core::Result<FundamentalsDocument> {
        Ok(self.fundamentals_document(ticker).await?)
    }
}

#[async_trait]
impl NewsSearch for FmpClient {
    async fn search(&self, query: &SearchQuery) -> research_core::Result<Vec<Article>> {
        Ok(self.stock_news(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_historical_sorts_oldest_first() {
        let data = json!({
            "symbol": "AAPL",
            "historical": [
                {"date": "2024-01-03", "open": 2.0, "high": 2.5, "low": 1.5, "close": 2.2, "volume": 1200.0},
                {"date": "2024-01-02", "open": 1.0, "high": 1.5, "low": 0.5, "close": 1.2, "volume": 1000}
            ]
        });
        let bars = parse_historical(data).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[1].volume, 1200);
    }

    #[test]
    fn test_parse_historical_empty() {
        assert!(parse_historical(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_error_payload() {
        let err = check_error_payload(&json!({"Error Message": "Invalid API KEY."})).unwrap_err();
        assert_eq!(err.to_string(), "fmp API error: Invalid API KEY.");
        assert!(check_error_payload(&json!([{"symbol": "AAPL"}])).is_ok());
    }

    #[test]
    fn test_parse_news() {
        let data = json!([{
            "symbol": "AAPL",
            "publishedDate": "2024-05-02 16:30:00",
            "title": "Apple beats estimates",
            "image": "https://example.com/i.png",
            "site": "Reuters",
            "text": "Apple reported...",
            "url": "https://example.com/a"
        }]);
        let articles = parse_news(data).unwrap();
        assert_eq!(articles[0].source.as_deref(), Some("Reuters"));
        assert_eq!(articles[0].summary, "Apple reported...");
    }

    #[test]
    fn test_endpoint_table() {
        assert_eq!(FUNDAMENTAL_ENDPOINTS.len(), 14);
        assert!(is_empty_payload(&json!([])));
        assert!(!is_empty_payload(&json!([{}])));
    }
}
