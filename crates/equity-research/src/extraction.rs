//! Ticker extraction
//!
//! Extractors only propose a candidate symbol. Whether the candidate is a
//! ticker is decided by [`research_core::Ticker::parse`] in the orchestrator.

use crate::config::ExtractionMode;
use crate::prompts;
use crate::reasoning::ReasoningClient;
use async_trait::async_trait;
use regex::Regex;
use research_core::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Answer the extractor prompt uses for "no ticker"
const UNKNOWN: &str = "UNKNOWN";

/// Uppercase words that are never tickers
const STOPWORDS: &[&str] = &[
    "THE", "AND", "OR", "FOR", "TO", "FROM", "WITH", "BY", "AT", "IN", "ON", "IS", "ARE", "WAS",
    "WERE", "BE", "BEEN", "HAVE", "HAS", "HAD", "DO", "DOES", "DID", "WILL", "WOULD", "COULD",
    "SHOULD", "MAY", "MIGHT", "CAN", "MUST", "SHALL", "GET", "GOT", "PUT", "SET", "LET", "RUN",
    "GO", "SEE", "SAY", "SAID", "TELL", "TOLD", "GIVE", "GAVE", "TAKE", "TOOK", "COME", "CAME",
    "WENT", "WANT", "KNOW", "THINK", "LOOK", "USE", "USED", "WORK", "MAKE", "MADE", "FIND", "CALL",
    "TRY", "ASK", "NEED", "FEEL", "SEEM", "TURN", "KEEP", "SHOW", "MOVE", "PLAY", "LIVE", "HELP",
    "TALK", "BRING", "HAPPEN", "CARRY", "SEND", "BUILD", "STAY", "FALL", "CUT", "REACH", "KILL",
    "REMAIN", "SUGGEST", "RAISE", "PASS", "SELL", "BUY", "HOLD", "REQUIRE", "REPORT", "DECIDE",
    "PULL", "ME", "MY", "YOU", "YOUR", "ALL", "BUT", "NOT", "OUT", "SO", "UP", "NO", "IF", "NOW",
    "WAY", "WHO", "OIL", "NEW", "TWO", "HOW", "ITS", "OUR", "HIS", "HER", "HIM", "SHE", "HE",
];

/// Proposes a ticker candidate for a free-text request
#[async_trait]
pub trait TickerExtractor: Send + Sync {
    /// Candidate symbol, or `None` when the request names none
    async fn extract(&self, request: &str) -> Result<Option<String>>;

    /// Extractor name for logs
    fn name(&self) -> &str;
}

/// First uppercase 2-5 letter word that is not a common English word
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    pattern: Regex,
    stopwords: HashSet<&'static str>,
}

impl PatternExtractor {
    /// Create the extractor
    #[allow(clippy::unwrap_used)]
    pub fn new() -> Self {
        Self {
            // Literal pattern, always compiles
            pattern: Regex::new(r"\b[A-Z]{2,5}\b").unwrap(),
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Candidate without the async wrapper
    pub fn find(&self, request: &str) -> Option<String> {
        self.pattern
            .find_iter(request)
            .map(|m| m.as_str())
            .find(|word| !self.stopwords.contains(word))
            .map(str::to_string)
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TickerExtractor for PatternExtractor {
    async fn extract(&self, request: &str) -> Result<Option<String>> {
        Ok(self.find(request))
    }

    fn name(&self) -> &str {
        "pattern"
    }
}

/// Asks the reasoning service for the symbol
#[derive(Debug, Clone)]
pub struct ReasoningExtractor {
    reasoning: ReasoningClient,
}

impl ReasoningExtractor {
    /// Create the extractor
    pub fn new(reasoning: ReasoningClient) -> Self {
        Self { reasoning }
    }
}

#[async_trait]
impl TickerExtractor for ReasoningExtractor {
    async fn extract(&self, request: &str) -> Result<Option<String>> {
        let answer = self.reasoning.ask(prompts::TICKER_EXTRACTOR, request).await?;
        let candidate = answer
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '$')
            .trim();
        debug!(answer = %candidate, "Extractor answered");

        if candidate.is_empty() || candidate.eq_ignore_ascii_case(UNKNOWN) {
            Ok(None)
        } else {
            Ok(Some(candidate.to_string()))
        }
    }

    fn name(&self) -> &str {
        "reasoning"
    }
}

/// Build the extractor for `mode`
pub fn extractor_for(mode: ExtractionMode, reasoning: &ReasoningClient) -> Arc<dyn TickerExtractor> {
    match mode {
        ExtractionMode::Pattern => Arc::new(PatternExtractor::new()),
        ExtractionMode::Reasoning => Arc::new(ReasoningExtractor::new(reasoning.clone())),
    }
}

/// The candidate, or the validation error that rejects the request
pub(crate) fn into_candidate(result: Result<Option<String>>) -> Result<String> {
    match result {
        Ok(Some(candidate)) => Ok(candidate),
        Ok(None) => Err(Error::Validation("no ticker symbol found in request".to_string())),
        Err(e) => Err(Error::Validation(format!("ticker extraction failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::testing::ScriptedService;

    fn reasoning(service: Arc<ScriptedService>) -> ReasoningClient {
        ReasoningClient::new(service, &ResearchConfig::default())
    }

    #[test]
    fn test_pattern_finds_ticker() {
        let extractor = PatternExtractor::new();
        assert_eq!(extractor.find("analyze AAPL"), Some("AAPL".to_string()));
        assert_eq!(extractor.find("Can you analyze GOOGL for me?"), Some("GOOGL".to_string()));
    }

    #[test]
    fn test_pattern_skips_stopwords() {
        let extractor = PatternExtractor::new();
        assert_eq!(extractor.find("SHOULD I SELL TSLA NOW"), Some("TSLA".to_string()));
        assert_eq!(extractor.find("WHO CAN HELP"), None);
        assert_eq!(extractor.find("Should I BUY AAPL?"), Some("AAPL".to_string()));
        assert_eq!(extractor.find("HOLD or SELL MSFT"), Some("MSFT".to_string()));
    }

    #[test]
    fn test_pattern_needs_whole_uppercase_word() {
        let extractor = PatternExtractor::new();
        assert_eq!(extractor.find("tell me about apple"), None);
        assert_eq!(extractor.find("analyze X"), None);
        assert_eq!(extractor.find("analyze ABCDEFG"), None);
        assert_eq!(extractor.find(""), None);
    }

    #[tokio::test]
    async fn test_reasoning_extractor() {
        let extractor = ReasoningExtractor::new(reasoning(ScriptedService::answering(" \"MSFT\"\n")));
        assert_eq!(extractor.extract("What about Microsoft?").await.unwrap(), Some("MSFT".to_string()));

        let extractor = ReasoningExtractor::new(reasoning(ScriptedService::answering("UNKNOWN")));
        assert_eq!(extractor.extract("hello").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reasoning_failure_is_error() {
        let extractor = ReasoningExtractor::new(reasoning(ScriptedService::failing()));
        let result = extractor.extract("analyze AAPL").await;
        assert!(result.is_err());

        let rejected = into_candidate(result).unwrap_err();
        assert!(matches!(rejected, Error::Validation(_)));
    }
}
