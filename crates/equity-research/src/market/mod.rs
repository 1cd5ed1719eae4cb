//! Market data sources
//!
//! The branches only see the traits in this module. [`fmp::FmpClient`] and
//! [`tavily::TavilyClient`] are the HTTP-backed implementations.

pub mod fmp;
pub mod tavily;

pub use fmp::FmpClient;
pub use tavily::TavilyClient;

use crate::indicators::OhlcvBar;
use async_trait::async_trait;
use chrono::{Duration as DateSpan, NaiveDate, Utc};
use research_core::{Error, Result, Ticker};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Inclusive calendar range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day
    pub from: NaiveDate,
    /// Last day
    pub to: NaiveDate,
}

impl DateRange {
    /// Create a range; `from` after `to` is an error
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidInput(format!(
                "date range starts after it ends: {from} > {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// The `days` days up to and including `to`
    pub fn ending_at(to: NaiveDate, days: u32) -> Self {
        Self {
            from: to - DateSpan::days(i64::from(days)),
            to,
        }
    }

    /// The last `days` days up to today (UTC)
    pub fn last_days(days: u32) -> Self {
        Self::ending_at(Utc::now().date_naive(), days)
    }
}

/// Daily price history
#[async_trait]
pub trait PriceHistorySource: Send + Sync {
    /// Daily bars for the range, in any order
    async fn price_history(&self, ticker: &Ticker, range: DateRange) -> Result<Vec<OhlcvBar>>;
}

/// Fundamentals gathered for one ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsDocument {
    /// Ticker the data belongs to
    pub ticker: String,
    /// Data per section name (income statement, ratios, ...)
    pub sections: BTreeMap<String, serde_json::Value>,
    /// Sections that could not be fetched, with the cause
    pub unavailable: BTreeMap<String, String>,
}

impl FundamentalsDocument {
    /// Names of the sections that were fetched
    pub fn section_names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    /// Pretty JSON for prompts
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Company fundamentals
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    /// Financial statements, ratios and profile
    async fn fundamentals(&self, ticker: &Ticker) -> Result<FundamentalsDocument>;
}

/// One news search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Ticker the news is about
    pub ticker: Ticker,
    /// Free-text search terms
    pub terms: String,
    /// Publication window
    pub range: DateRange,
    /// Maximum number of articles
    pub max_results: usize,
}

impl SearchQuery {
    /// Default query for a ticker
    pub fn for_ticker(ticker: &Ticker, range: DateRange, max_results: usize) -> Self {
        Self {
            ticker: ticker.clone(),
            terms: format!("{ticker} stock news earnings analyst reports latest developments"),
            range,
            max_results,
        }
    }
}

/// One news article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Headline
    pub title: String,
    /// Link
    pub url: String,
    /// Publisher, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Publication date, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Snippet or summary
    #[serde(default)]
    pub summary: String,
}

/// News search backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// Articles matching the query; no matches is `Ok(vec![])`
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Article>>;
}

/// Await `future`, failing with [`Error::Timeout`] once `after` elapses
pub async fn with_deadline<T, F>(operation: &str, after: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, after)),
    }
}
