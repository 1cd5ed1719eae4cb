//! News analysis branch
//!
//! Runs the tool loop over the configured search tools. The tools are
//! presented in preference order; whether the service sticks to the first
//! one or falls back is up to it, within the loop's round-trip bound.

use super::AnalysisBranch;
use crate::config::ResearchConfig;
use crate::market::Article;
use crate::prompts;
use crate::reports::{
    BranchReport, Confidence, Fallback, NewsAnalysis, NewsEvidence, NewsReport, Sentiment,
    parse_payload,
};
use async_trait::async_trait;
use research_core::{BranchSlot, Error, Result, Ticker};
use research_llm::ReasoningService;
use research_runtime::{LoopOutcome, LoopTermination, ToolCallLoop};
use research_tools::ToolRegistry;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Headlines kept when a report is built from raw observations
const MAX_HEADLINES: usize = 5;

/// Searches news through the tool loop and asks for a sentiment assessment
pub struct NewsBranch {
    tool_loop: ToolCallLoop,
    tool_names: Vec<String>,
    lookback_days: u32,
    max_results: usize,
}

impl NewsBranch {
    /// Create the branch over an ordered tool registry
    pub fn new(
        service: Arc<dyn ReasoningService>,
        registry: Arc<ToolRegistry>,
        config: &ResearchConfig,
    ) -> Result<Self> {
        let tool_names = registry.names().into_iter().map(str::to_string).collect();
        let tool_loop = ToolCallLoop::builder()
            .service(service)
            .registry(registry)
            .config(config.loop_config(prompts::NEWS_ANALYST))
            .build()?;

        Ok(Self {
            tool_loop,
            tool_names,
            lookback_days: config.news_lookback_days,
            max_results: config.news_max_results,
        })
    }

    /// Produce the typed report
    pub async fn analyze(&self, ticker: &Ticker) -> NewsReport {
        let names: Vec<&str> = self.tool_names.iter().map(String::as_str).collect();
        let prompt = match prompts::news_prompt(ticker, &names, self.lookback_days, self.max_results) {
            Ok(prompt) => prompt,
            Err(e) => return NewsReport::failed(ticker.as_str(), NewsEvidence::default(), e.to_string()),
        };

        let outcome = self.tool_loop.run(prompt).await;
        let articles = gathered_articles(&outcome);
        info!(
            ticker = %ticker,
            round_trips = outcome.round_trips,
            tool_calls = outcome.records.len(),
            articles = articles.len(),
            "News tool loop finished"
        );

        let evidence = NewsEvidence {
            tool_calls: outcome.records.clone(),
            round_trips: outcome.round_trips,
            articles_gathered: articles.len(),
        };
        let loop_error = outcome.error();
        let all_failed = outcome.all_calls_failed();

        match (outcome.termination, loop_error) {
            (LoopTermination::Answered(text), _) => {
                match parse_payload::<NewsAnalysis>(&text, "news analysis") {
                    Ok(analysis) if !all_failed => NewsReport::ok(ticker.as_str(), analysis, evidence),
                    Ok(analysis) => {
                        warn!(ticker = %ticker, "Every news tool call failed");
                        NewsReport::degraded(ticker.as_str(), analysis, evidence, "every news tool call failed")
                    }
                    Err(e) => {
                        warn!(ticker = %ticker, error = %e, "Unparseable news analysis, using fallback");
                        NewsReport::fallback(ticker.as_str(), evidence, e.to_string())
                    }
                }
            }
            (_, Some(e @ Error::LoopBoundExceeded(_))) => {
                warn!(ticker = %ticker, error = %e, "News tool loop hit its bound");
                let analysis = from_observations(&articles, &e.to_string());
                NewsReport::degraded(ticker.as_str(), analysis, evidence, e.to_string())
            }
            (_, e) => {
                let cause = e.map_or_else(|| "news analysis ended without an answer".to_string(), |e| e.to_string());
                if articles.is_empty() {
                    warn!(ticker = %ticker, cause = %cause, "News analysis failed");
                    NewsReport::failed(ticker.as_str(), evidence, cause)
                } else {
                    warn!(ticker = %ticker, cause = %cause, "News analysis degraded to raw observations");
                    let analysis = from_observations(&articles, &cause);
                    NewsReport::degraded(ticker.as_str(), analysis, evidence, cause)
                }
            }
        }
    }
}

/// Articles from successful search observations, first occurrence of each URL
fn gathered_articles(outcome: &LoopOutcome) -> Vec<Article> {
    let mut seen = HashSet::new();
    outcome
        .successful_results()
        .filter_map(|result| result.get("articles"))
        .filter_map(|articles| serde_json::from_value::<Vec<Article>>(articles.clone()).ok())
        .flatten()
        .filter(|article| seen.insert(article.url.clone()))
        .collect()
}

/// Neutral, low-confidence analysis listing what was found
fn from_observations(articles: &[Article], reason: &str) -> NewsAnalysis {
    if articles.is_empty() {
        return NewsAnalysis::fallback(reason);
    }

    NewsAnalysis {
        sentiment: Sentiment::Neutral,
        confidence: Confidence::Low,
        key_developments: articles
            .iter()
            .take(MAX_HEADLINES)
            .map(|a| a.title.clone())
            .collect(),
        potential_catalysts: Vec::new(),
        risks: Vec::new(),
        summary: format!(
            "{} recent articles were gathered but not analysed ({reason}); sentiment is unassessed.",
            articles.len()
        ),
    }
}

#[async_trait]
impl AnalysisBranch for NewsBranch {
    fn slot(&self) -> BranchSlot {
        BranchSlot::News
    }

    async fn run(&self, ticker: &Ticker) -> BranchReport {
        BranchReport::News(self.analyze(ticker).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NewsToolKind;
    use crate::market::MockNewsSearch;
    use crate::reports::ReportStatus;
    use crate::testing::{NEWS_JSON, ScriptedService};
    use crate::tools::NewsSearchTool;
    use research_llm::{CompletionResponse, ToolCall};
    use serde_json::json;

    fn article(n: usize) -> Article {
        Article {
            title: format!("Headline {n}"),
            url: format!("https://example.com/{n}"),
            source: None,
            published: None,
            summary: String::new(),
        }
    }

    fn search(kind: NewsToolKind, result: Result<Vec<Article>>) -> Arc<NewsSearchTool> {
        let mut backend = MockNewsSearch::new();
        backend.expect_search().returning(move |_| result.clone());
        Arc::new(NewsSearchTool::for_kind(kind, Arc::new(backend)))
    }

    fn call(name: &str) -> std::result::Result<CompletionResponse, String> {
        Ok(CompletionResponse::tool_calls(vec![ToolCall::new(
            format!("call_{name}"),
            name,
            json!({"ticker": "AAPL"}),
        )]))
    }

    fn branch(service: Arc<ScriptedService>, registry: ToolRegistry, k: usize) -> NewsBranch {
        let config = ResearchConfig::builder().max_tool_round_trips(k).build().unwrap();
        NewsBranch::new(service, Arc::new(registry), &config).unwrap()
    }

    fn aapl() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[tokio::test]
    async fn test_answer_after_search() {
        let service = ScriptedService::new(vec![call("tavily_news_search")], Ok(CompletionResponse::text(NEWS_JSON)));
        let registry = ToolRegistry::new()
            .with_tool(search(NewsToolKind::Tavily, Ok(vec![article(1), article(2)])))
            .with_tool(search(NewsToolKind::Fmp, Ok(vec![])));

        let report = branch(service.clone(), registry, 4).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.analysis.sentiment, Sentiment::Positive);
        assert_eq!(report.evidence.tool_calls.len(), 1);
        assert_eq!(report.evidence.articles_gathered, 2);

        // Tools are offered in preference order
        let tools: Vec<String> = service.requests()[0].tools.iter().map(|t| t.name.clone()).collect();
        assert_eq!(tools, vec!["tavily_news_search", "fmp_stock_news"]);
    }

    #[tokio::test]
    async fn test_fallback_tool_after_failure() {
        let service = ScriptedService::new(
            vec![call("tavily_news_search"), call("fmp_stock_news")],
            Ok(CompletionResponse::text(NEWS_JSON)),
        );
        let registry = ToolRegistry::new()
            .with_tool(search(NewsToolKind::Tavily, Err(Error::upstream("tavily", "HTTP 502"))))
            .with_tool(search(NewsToolKind::Fmp, Ok(vec![article(7)])));

        let report = branch(service, registry, 4).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.evidence.tool_calls.len(), 2);
        assert!(!report.evidence.tool_calls[0].outcome.is_success());
        assert!(report.evidence.tool_calls[1].outcome.is_success());
    }

    #[tokio::test]
    async fn test_all_calls_failed_degrades() {
        let service = ScriptedService::new(vec![call("tavily_news_search")], Ok(CompletionResponse::text(NEWS_JSON)));
        let registry = ToolRegistry::new()
            .with_tool(search(NewsToolKind::Tavily, Err(Error::upstream("tavily", "HTTP 502"))));

        let report = branch(service, registry, 4).analyze(&aapl()).await;
        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.cause.as_deref(), Some("every news tool call failed"));
    }

    #[tokio::test]
    async fn test_bound_exceeded_builds_from_observations() {
        // Never stops asking for tools
        let service = ScriptedService::new(vec![], call("tavily_news_search"));
        let registry = ToolRegistry::new().with_tool(search(NewsToolKind::Tavily, Ok(vec![article(1), article(2)])));

        let report = branch(service.clone(), registry, 2).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.evidence.round_trips, 2);
        assert_eq!(service.calls(), 3);
        assert_eq!(report.analysis.confidence, Confidence::Low);
        // The same articles came back every round; each is listed once
        assert_eq!(report.analysis.key_developments, vec!["Headline 1", "Headline 2"]);
        assert_eq!(
            report.cause.as_deref(),
            Some(Error::LoopBoundExceeded(2).to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_reasoning_failure_without_observations() {
        let registry = ToolRegistry::new().with_tool(search(NewsToolKind::Tavily, Ok(vec![])));
        let report = branch(ScriptedService::failing(), registry, 4).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.analysis.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_reasoning_failure_after_observations() {
        let service = ScriptedService::new(vec![call("fmp_stock_news")], Err("HTTP 503".to_string()));
        let registry = ToolRegistry::new().with_tool(search(NewsToolKind::Fmp, Ok(vec![article(3)])));

        let report = branch(service, registry, 4).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.analysis.key_developments, vec!["Headline 3"]);
    }

    #[tokio::test]
    async fn test_unparseable_answer() {
        let registry = ToolRegistry::new().with_tool(search(NewsToolKind::Fmp, Ok(vec![])));
        let report = branch(ScriptedService::answering("Mostly good news."), registry, 4)
            .analyze(&aapl())
            .await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.analysis.sentiment, Sentiment::Neutral);
        assert_eq!(report.analysis.confidence, Confidence::Low);
    }
}
