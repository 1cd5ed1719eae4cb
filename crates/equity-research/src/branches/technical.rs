//! Technical analysis branch

use super::{AnalysisBranch, conclude};
use crate::indicators::{IndicatorEngine, TimeSeries};
use crate::market::{DateRange, PriceHistorySource, with_deadline};
use crate::prompts;
use crate::reasoning::ReasoningClient;
use crate::reports::{BranchReport, TechnicalAnalysis, TechnicalEvidence, TechnicalReport};
use async_trait::async_trait;
use research_core::{BranchSlot, Ticker};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Computes indicators over recent daily bars and asks for a trading call
pub struct TechnicalBranch {
    source: Arc<dyn PriceHistorySource>,
    reasoning: ReasoningClient,
    fetch_timeout: Duration,
    history_days: u32,
}

impl TechnicalBranch {
    /// Create the branch
    pub fn new(
        source: Arc<dyn PriceHistorySource>,
        reasoning: ReasoningClient,
        fetch_timeout: Duration,
        history_days: u32,
    ) -> Self {
        Self {
            source,
            reasoning,
            fetch_timeout,
            history_days,
        }
    }

    /// Produce the typed report
    pub async fn analyze(&self, ticker: &Ticker) -> TechnicalReport {
        let range = DateRange::last_days(self.history_days);
        let fetched = with_deadline(
            "price history fetch",
            self.fetch_timeout,
            self.source.price_history(ticker, range),
        )
        .await;

        let series = match fetched.and_then(TimeSeries::from_unordered) {
            Ok(series) => series,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "No usable price history");
                return TechnicalReport::failed(ticker.as_str(), TechnicalEvidence::default(), e.to_string());
            }
        };

        let indicators = match IndicatorEngine::compute_series(&series) {
            Ok(indicators) => indicators,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Indicator computation failed");
                return TechnicalReport::failed(ticker.as_str(), TechnicalEvidence::default(), e.to_string());
            }
        };
        info!(ticker = %ticker, bars = series.len(), rsi14 = ?indicators.rsi14, "Indicators computed");

        let evidence = TechnicalEvidence {
            indicators: Some(indicators.clone()),
            latest_bar: series.latest().copied(),
            period: series.period(),
            bar_count: series.len(),
        };
        let document = json!({
            "ticker": ticker,
            "data_period": series.period().map(|(from, to)| format!("{from} to {to}")),
            "total_days": series.len(),
            "latest_data": series.latest(),
            "technical_indicators": indicators,
        });

        let result = match prompts::technical_prompt(ticker, &document) {
            Ok(prompt) => {
                self.reasoning
                    .ask_structured::<TechnicalAnalysis>(
                        prompts::TECHNICAL_ANALYST,
                        &prompt,
                        "technical analysis",
                    )
                    .await
            }
            Err(e) => Err(e.into()),
        };

        conclude(BranchSlot::Technical, ticker, evidence, result, None)
    }
}

#[async_trait]
impl AnalysisBranch for TechnicalBranch {
    fn slot(&self) -> BranchSlot {
        BranchSlot::Technical
    }

    async fn run(&self, ticker: &Ticker) -> BranchReport {
        BranchReport::Technical(self.analyze(ticker).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::reports::{Recommendation, ReportStatus};
    use crate::testing::{ScriptedService, StaticPrices, TECHNICAL_JSON, rising_bars};
    use research_core::Error;

    fn branch(source: Arc<StaticPrices>, service: Arc<ScriptedService>) -> TechnicalBranch {
        let config = ResearchConfig::default();
        TechnicalBranch::new(
            source,
            ReasoningClient::new(service, &config),
            Duration::from_millis(200),
            90,
        )
    }

    fn msft() -> Ticker {
        Ticker::parse("MSFT").unwrap()
    }

    #[tokio::test]
    async fn test_ok_report_carries_indicators() {
        let service = ScriptedService::answering(TECHNICAL_JSON);
        let report = branch(StaticPrices::ok(60), service.clone()).analyze(&msft()).await;

        assert_eq!(report.status, ReportStatus::Ok);
        assert_eq!(report.analysis.recommendation, Recommendation::Buy);
        let indicators = report.evidence.indicators.unwrap();
        assert_eq!(indicators.rsi14, Some(100.0));
        assert_eq!(report.evidence.latest_bar.unwrap().close, 159.0);
        assert_eq!(report.evidence.bar_count, 60);

        let prompt = service.requests()[0].messages[0].text().unwrap();
        assert!(prompt.contains("\"rsi14\": 100.0"));
        assert!(prompt.contains("\"total_days\": 60"));
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_indicators() {
        let report = branch(StaticPrices::ok(30), ScriptedService::answering("BUY!"))
            .analyze(&msft())
            .await;

        assert_eq!(report.status, ReportStatus::Degraded);
        assert_eq!(report.analysis.recommendation, Recommendation::None);
        assert!(report.evidence.indicators.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_bars_fail_without_reasoning() {
        let mut bars = rising_bars(5);
        bars.push(bars[0]);
        let service = ScriptedService::answering(TECHNICAL_JSON);
        let report = branch(StaticPrices::with(Ok(bars)), service.clone())
            .analyze(&msft())
            .await;

        assert_eq!(report.status, ReportStatus::Failed);
        assert!(report.cause.unwrap().contains("duplicate"));
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_history_fails() {
        let report = branch(StaticPrices::with(Ok(vec![])), ScriptedService::answering(TECHNICAL_JSON))
            .analyze(&msft())
            .await;
        assert_eq!(report.status, ReportStatus::Failed);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let source = Arc::new(StaticPrices {
            result: Ok(rising_bars(30)),
            delay: Duration::from_secs(5),
        });
        let report = branch(source, ScriptedService::answering(TECHNICAL_JSON))
            .analyze(&msft())
            .await;

        assert_eq!(report.status, ReportStatus::Failed);
        let expected = Error::timeout("price history fetch", Duration::from_millis(200)).to_string();
        assert_eq!(report.cause.as_deref(), Some(expected.as_str()));
    }
}
