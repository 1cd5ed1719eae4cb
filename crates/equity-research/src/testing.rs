//! Stub collaborators for unit tests

use crate::indicators::OhlcvBar;
use crate::market::{DateRange, FundamentalsDocument, FundamentalsSource, PriceHistorySource};
use async_trait::async_trait;
use chrono::NaiveDate;
use research_core::{Error, Result, Ticker};
use research_llm::{CompletionRequest, CompletionResponse, LLMError, ReasoningService};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const FUNDAMENTAL_JSON: &str = r#"{
  "growth_score": {"score": 8, "justification": "Revenue growing double digits"},
  "risk_score": {"score": 3, "justification": "Net cash position"},
  "summary": "Strong fundamentals.",
  "notes": ["Gross margin 45%"],
  "strengths_and_weaknesses": {"strengths": ["Brand"], "weaknesses": ["China exposure"]}
}"#;

pub const TECHNICAL_JSON: &str = r#"{
  "recommendation": "BUY",
  "confidence": "HIGH",
  "summary": "Price above both moving averages.",
  "key_indicators": ["RSI 62", "MACD positive"],
  "price_target": "210-220",
  "risk_level": "MEDIUM"
}"#;

pub const NEWS_JSON: &str = r#"{
  "sentiment": "Positive",
  "confidence": "Medium",
  "key_developments": ["Record quarter"],
  "potential_catalysts": ["Product launch"],
  "risks": ["Regulation"],
  "summary": "News flow is constructive."
}"#;

pub const FINAL_JSON: &str = r#"{
  "final_recommendation": "BUY",
  "confidence": "HIGH",
  "growth_score": {"score": 8, "justification": "Growth"},
  "risk_score": {"score": 3, "justification": "Low risk"},
  "short_summary": "Buy on strength.",
  "detailed_analysis": {"investment_timeline": "long-term"}
}"#;

/// Answers from a script, then repeats the fallback
pub struct ScriptedService {
    script: Mutex<VecDeque<std::result::Result<CompletionResponse, String>>>,
    fallback: std::result::Result<CompletionResponse, String>,
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new(
        script: Vec<std::result::Result<CompletionResponse, String>>,
        fallback: std::result::Result<CompletionResponse, String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Always answers with `text`
    pub fn answering(text: &str) -> Arc<Self> {
        Self::new(vec![], Ok(CompletionResponse::text(text)))
    }

    /// Always errors
    pub fn failing() -> Arc<Self> {
        Self::new(vec![], Err("HTTP 503".to_string()))
    }

    /// Answers `text` after `delay`
    pub fn slow(text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(CompletionResponse::text(text)),
            delay,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReasoningService for ScriptedService {
    async fn complete(&self, request: CompletionRequest) -> research_llm::Result<CompletionResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next.unwrap_or_else(|| self.fallback.clone()) {
            Ok(response) => Ok(response),
            Err(e) => Err(LLMError::RequestFailed(e)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Fixed fundamentals answer
pub struct StaticFundamentals {
    pub result: Result<FundamentalsDocument>,
    pub calls: AtomicUsize,
}

impl StaticFundamentals {
    pub fn ok() -> Arc<Self> {
        let mut document = FundamentalsDocument {
            ticker: "AAPL".to_string(),
            ..FundamentalsDocument::default()
        };
        document
            .sections
            .insert("income_statement".to_string(), json!([{"revenue": 383_285_000_000_u64}]));
        document
            .sections
            .insert("financial_ratios".to_string(), json!([{"peRatio": 28.1}]));
        Self::with(Ok(document))
    }

    pub fn with(result: Result<FundamentalsDocument>) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Self::with(Err(Error::upstream("fmp", "HTTP 500")))
    }
}

#[async_trait]
impl FundamentalsSource for StaticFundamentals {
    async fn fundamentals(&self, _ticker: &Ticker) -> Result<FundamentalsDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Fixed price history answer
pub struct StaticPrices {
    pub result: Result<Vec<OhlcvBar>>,
    pub delay: Duration,
}

impl StaticPrices {
    pub fn ok(len: usize) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(rising_bars(len)),
            delay: Duration::ZERO,
        })
    }

    pub fn with(result: Result<Vec<OhlcvBar>>) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay: Duration::ZERO,
        })
    }
}

#[async_trait]
impl PriceHistorySource for StaticPrices {
    async fn price_history(&self, _ticker: &Ticker, _range: DateRange) -> Result<Vec<OhlcvBar>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// `len` daily bars with closes rising by 1, newest first like FMP returns them
pub fn rising_bars(len: usize) -> Vec<OhlcvBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut bars: Vec<OhlcvBar> = (0..len)
        .map(|i| {
            let close = 100.0 + i as f64;
            OhlcvBar {
                date: start + chrono::Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000,
            }
        })
        .collect();
    bars.reverse();
    bars
}
