//! Fundamental analysis branch

use super::{AnalysisBranch, conclude};
use crate::market::{FundamentalsSource, with_deadline};
use crate::prompts;
use crate::reasoning::ReasoningClient;
use crate::reports::{BranchReport, FundamentalAnalysis, FundamentalEvidence, FundamentalReport};
use async_trait::async_trait;
use research_core::{BranchSlot, Ticker};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Fetches statements and ratios, then asks for a growth/risk assessment
pub struct FundamentalBranch {
    source: Arc<dyn FundamentalsSource>,
    reasoning: ReasoningClient,
    fetch_timeout: Duration,
}

impl FundamentalBranch {
    /// Create the branch
    pub fn new(
        source: Arc<dyn FundamentalsSource>,
        reasoning: ReasoningClient,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            reasoning,
            fetch_timeout,
        }
    }

    /// Produce the typed report
    pub async fn analyze(&self, ticker: &Ticker) -> FundamentalReport {
        let fetched = with_deadline(
            "fundamentals fetch",
            self.fetch_timeout,
            self.source.fundamentals(ticker),
        )
        .await;
        let document = match fetched {
            Ok(document) => document,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Fundamentals unavailable, skipping analysis");
                return FundamentalReport::failed(ticker.as_str(), FundamentalEvidence::default(), e.to_string());
            }
        };

        let evidence = FundamentalEvidence {
            sources: document.section_names(),
            unavailable: document.unavailable.keys().cloned().collect(),
        };
        info!(
            ticker = %ticker,
            sections = evidence.sources.len(),
            unavailable = evidence.unavailable.len(),
            "Fundamentals fetched"
        );

        let partial = (!evidence.unavailable.is_empty())
            .then(|| format!("sections unavailable: {}", evidence.unavailable.join(", ")));

        let result = match prompts::fundamental_prompt(ticker, &document) {
            Ok(prompt) => {
                self.reasoning
                    .ask_structured::<FundamentalAnalysis>(
                        prompts::FUNDAMENTAL_ANALYST,
                        &prompt,
                        "fundamental analysis",
                    )
                    .await
            }
            Err(e) => Err(e.into()),
        };

        conclude(BranchSlot::Fundamental, ticker, evidence, result, partial)
    }
}

#[async_trait]
impl AnalysisBranch for FundamentalBranch {
    fn slot(&self) -> BranchSlot {
        BranchSlot::Fundamental
    }

    async fn run(&self, ticker: &Ticker) -> BranchReport {
        BranchReport::Fundamental(self.analyze(ticker).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::market::FundamentalsDocument;
    use crate::reports::ReportStatus;
    use crate::testing::{FUNDAMENTAL_JSON, ScriptedService, StaticFundamentals};
    use std::sync::atomic::Ordering;

    fn branch(source: Arc<StaticFundamentals>, service: Arc<ScriptedService>) -> FundamentalBranch {
        let config = ResearchConfig::default();
        FundamentalBranch::new(
            source,
            ReasoningClient::new(service, &config),
            Duration::from_millis(200),
        )
    }

    fn aapl() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[tokio::test]
    async fn test_ok_report() {
        let service = ScriptedService::answering(FUNDAMENTAL_JSON);
        let report = branch(StaticFundamentals::ok(), service.clone()).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.analysis.growth_score.score, 8);
        assert_eq!(report.evidence.sources, vec!["financial_ratios", "income_statement"]);

        let request = &service.requests()[0];
        assert_eq!(request.system.as_deref(), Some(prompts::FUNDAMENTAL_ANALYST));
        assert!(request.messages[0].text().unwrap().contains("peRatio"));
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_reasoning() {
        let service = ScriptedService::answering(FUNDAMENTAL_JSON);
        let source = StaticFundamentals::failing();
        let report = branch(source.clone(), service.clone()).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.cause.unwrap().contains("fmp failed"));
        assert_eq!(service.calls(), 0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_uses_fallback() {
        let service = ScriptedService::answering("The company looks healthy overall.");
        let report = branch(StaticFundamentals::ok(), service).analyze(&aapl()).await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.analysis.growth_score.score, 5);
        assert_eq!(report.analysis.risk_score.score, 5);
    }

    #[tokio::test]
    async fn test_reasoning_failure() {
        let report = branch(StaticFundamentals::ok(), ScriptedService::failing())
            .analyze(&aapl())
            .await;
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.evidence.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_slow_reasoning_fails_at_deadline() {
        let config = ResearchConfig::builder()
            .reasoning_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let service = ScriptedService::slow(FUNDAMENTAL_JSON, Duration::from_secs(5));
        let branch = FundamentalBranch::new(
            StaticFundamentals::ok(),
            ReasoningClient::new(service.clone(), &config),
            Duration::from_millis(200),
        );

        let started = std::time::Instant::now();
        let report = branch.analyze(&aapl()).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.status, ReportStatus::Failed);
        assert_eq!(report.cause.as_deref(), Some("reasoning call timed out after 50ms"));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_partial_sections_degrade() {
        let mut document = FundamentalsDocument::default();
        document
            .sections
            .insert("company_profile".to_string(), serde_json::json!([{"sector": "Technology"}]));
        document
            .unavailable
            .insert("ratios".to_string(), "fmp failed: HTTP 500".to_string());

        let report = branch(
            StaticFundamentals::with(Ok(document)),
            ScriptedService::answering(FUNDAMENTAL_JSON),
        )
        .analyze(&aapl())
        .await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.cause.as_deref(), Some("sections unavailable: ratios"));
        assert_eq!(report.analysis.growth_score.score, 8);
    }
}
