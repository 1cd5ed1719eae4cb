//! Tavily web search client

use super::{Article, NewsSearch, SearchQuery};
use crate::error::{ResearchError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const SEARCH_URL: &str = "https://api.tavily.com/search";
const PROVIDER: &str = "tavily";

/// Tavily search client restricted to the news topic
#[derive(Debug, Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
    search_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    topic: &'static str,
    max_results: usize,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilyClient {
    /// Create a client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            search_url: SEARCH_URL.to_string(),
        }
    }

    /// Create from `TAVILY_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = research_utils::env_var("TAVILY_API_KEY").ok_or_else(|| {
            ResearchError::ConfigError("TAVILY_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Use another search endpoint
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Run a news search
    #[instrument(skip(self), fields(ticker = %query.ticker))]
    pub async fn search_news(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        let body = SearchRequest {
            query: &query.terms,
            topic: "news",
            max_results: query.max_results,
            start_date: query.range.from.to_string(),
            end_date: query.range.to.to_string(),
        };
        debug!(terms = %query.terms, "Tavily search");

        let response = self
            .client
            .post(&self.search_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ResearchError::RateLimitExceeded {
                    provider: PROVIDER.to_string(),
                });
            }
            status if !status.is_success() => {
                let detail = response.text().await.unwrap_or_default();
                return Err(ResearchError::api(PROVIDER, format!("HTTP error: {status} {detail}")));
            }
            _ => {}
        }

        let response: SearchResponse = response.json().await?;
        Ok(into_articles(response, query.max_results))
    }
}

fn into_articles(response: SearchResponse, max_results: usize) -> Vec<Article> {
    response
        .results
        .into_iter()
        .take(max_results)
        .map(|result| Article {
            source: reqwest::Url::parse(&result.url)
                .ok()
                .and_then(|url| url.host_str().map(str::to_string)),
            title: result.title,
            url: result.url,
            published: result.published_date,
            summary: result.content,
        })
        .collect()
}

#[async_trait]
impl NewsSearch for TavilyClient {
    async fn search(&self, query: &SearchQuery) -> research_core::Result<Vec<Article>> {
        Ok(self.search_news(query).await?)
    }
}
