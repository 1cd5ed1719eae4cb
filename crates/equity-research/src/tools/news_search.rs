//! News search tool

use crate::config::NewsToolKind;
use crate::market::{DateRange, NewsSearch, SearchQuery};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use research_core::{Error, Result, Ticker};
use research_llm::tools::schema;
use research_tools::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Defaults applied when the caller leaves arguments out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchDefaults {
    /// Days of news to look back
    pub lookback_days: u32,
    /// Articles to return
    pub max_results: usize,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            lookback_days: 14,
            max_results: 5,
        }
    }
}

/// Exposes a [`NewsSearch`] backend to the tool loop
pub struct NewsSearchTool {
    name: String,
    description: String,
    backend: Arc<dyn NewsSearch>,
    defaults: SearchDefaults,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    ticker: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    max_results: Option<usize>,
}

impl NewsSearchTool {
    /// Wrap a backend under a tool name
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        backend: Arc<dyn NewsSearch>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            backend,
            defaults: SearchDefaults::default(),
        }
    }

    /// Named and described for one of the known backends
    pub fn for_kind(kind: NewsToolKind, backend: Arc<dyn NewsSearch>) -> Self {
        match kind {
            NewsToolKind::Tavily => Self::new(
                "tavily_news_search",
                "Searches the web for the latest news, press releases, earnings coverage and \
                 analyst commentary about a stock ticker. Returns article titles, snippets, URLs \
                 and publication dates.",
                backend,
            ),
            NewsToolKind::Fmp => Self::new(
                "fmp_stock_news",
                "Fetches recent stock news articles for a ticker from Financial Modeling Prep. \
                 Returns headlines, publishers, summaries, URLs and publication dates.",
                backend,
            ),
        }
    }

    /// Override the defaults
    pub fn with_defaults(mut self, defaults: SearchDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn query(&self, params: SearchParams) -> Result<SearchQuery> {
        let ticker = Ticker::parse(&params.ticker)?;
        let to = params.end_date.unwrap_or_else(|| Utc::now().date_naive());
        let range = match params.start_date {
            Some(from) => DateRange::new(from, to)?,
            None => DateRange::ending_at(to, self.defaults.lookback_days),
        };
        let max_results = params
            .max_results
            .unwrap_or(self.defaults.max_results)
            .clamp(1, self.defaults.max_results.max(1));

        let mut query = SearchQuery::for_ticker(&ticker, range, max_results);
        if let Some(terms) = params.query.filter(|q| !q.trim().is_empty()) {
            query.terms = terms;
        }
        Ok(query)
    }
}

#[async_trait]
impl Tool for NewsSearchTool {
    async fn execute(&self, params: Value) -> Result<Value> {
        let params: SearchParams = serde_json::from_value(params)
            .map_err(|e| Error::InvalidInput(format!("Invalid parameters: {e}")))?;
        let query = self.query(params)?;

        let articles = self.backend.search(&query).await?;
        Ok(json!({
            "ticker": query.ticker,
            "query": query.terms,
            "from": query.range.from,
            "to": query.range.to,
            "article_count": articles.len(),
            "articles": articles,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        schema::object(
            json!({
                "ticker": schema::string("Stock ticker symbol, e.g. AAPL"),
                "query": schema::string("Optional search terms; defaults to general stock news for the ticker"),
                "start_date": schema::date("Earliest publication date"),
                "end_date": schema::date("Latest publication date"),
                "max_results": schema::integer("Maximum number of articles"),
            }),
            &["ticker"],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Article, MockNewsSearch};

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://example.com/{title}"),
            source: None,
            published: None,
            summary: String::new(),
        }
    }

    #[tokio::test]
    async fn test_execute_builds_query() {
        let mut backend = MockNewsSearch::new();
        backend
            .expect_search()
            .withf(|q| {
                q.ticker.as_str() == "NVDA"
                    && q.range.from.to_string() == "2024-04-01"
                    && q.range.to.to_string() == "2024-04-15"
                    && q.max_results == 3
                    && q.terms.starts_with("NVDA stock news")
            })
            .times(1)
            .returning(|_| Ok(vec![article("one"), article("two")]));

        let tool = NewsSearchTool::for_kind(NewsToolKind::Tavily, Arc::new(backend));
        let result = tool
            .execute(json!({
                "ticker": "nvda",
                "start_date": "2024-04-01",
                "end_date": "2024-04-15",
                "max_results": 3
            }))
            .await
            .unwrap();

        assert_eq!(result["article_count"], 2);
        assert_eq!(result["articles"][0]["title"], "one");
        assert_eq!(tool.name(), "tavily_news_search");
    }

    #[tokio::test]
    async fn test_default_window() {
        let mut backend = MockNewsSearch::new();
        backend
            .expect_search()
            .withf(|q| (q.range.to - q.range.from).num_days() == 7 && q.max_results == 5)
            .returning(|_| Ok(vec![]));

        let tool = NewsSearchTool::for_kind(NewsToolKind::Fmp, Arc::new(backend)).with_defaults(
            SearchDefaults {
                lookback_days: 7,
                max_results: 5,
            },
        );
        let result = tool.execute(json!({"ticker": "AMD"})).await.unwrap();
        assert_eq!(result["article_count"], 0);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let mut backend = MockNewsSearch::new();
        backend
            .expect_search()
            .returning(|_| Err(Error::upstream("tavily", "HTTP 502")));

        let tool = NewsSearchTool::for_kind(NewsToolKind::Tavily, Arc::new(backend));
        let err = tool.execute(json!({"ticker": "AMD"})).await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let mut backend = MockNewsSearch::new();
        backend.expect_search().times(0);
        let tool = NewsSearchTool::for_kind(NewsToolKind::Tavily, Arc::new(backend));

        assert!(tool.execute(json!({"query": "chips"})).await.is_err());
        assert!(tool.execute(json!({"ticker": "not a ticker"})).await.is_err());
        assert!(
            tool.execute(json!({"ticker": "AMD", "start_date": "2024-05-01", "end_date": "2024-04-01"}))
                .await
                .is_err()
        );
    }
}
