//! Analysis report types
//!
//! Every branch produces an [`AnalysisReport`]: the structured payload the
//! reasoning service returned (or its documented fallback), a
//! [`ReportStatus`] and the evidence the analysis was based on. Payload field
//! names are the snake_case JSON keys the prompts ask for.

use crate::indicators::{IndicatorSet, OhlcvBar};
use crate::synthesizer::SignalDigest;
use chrono::NaiveDate;
use research_core::{BranchSlot, Error, Result};
use research_tools::ToolCallRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Health of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    /// Produced as intended
    Ok,
    /// Produced from partial data or a documented fallback
    Degraded,
    /// Could not be produced; content is a placeholder
    Failed,
}

impl ReportStatus {
    /// Whether the report is fully usable
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Trading recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    /// Bullish
    #[serde(alias = "Buy", alias = "buy")]
    Buy,
    /// Neutral
    #[serde(alias = "Hold", alias = "hold")]
    Hold,
    /// Bearish
    #[serde(alias = "Sell", alias = "sell")]
    Sell,
    /// Not enough information
    #[serde(alias = "None", alias = "none")]
    None,
}

/// Confidence level, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// Low
    #[serde(alias = "Low", alias = "low")]
    Low,
    /// Medium
    #[serde(alias = "Medium", alias = "medium")]
    Medium,
    /// High
    #[serde(alias = "High", alias = "high")]
    High,
}

/// News sentiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    /// Good news for the stock
    #[serde(alias = "POSITIVE", alias = "positive")]
    Positive,
    /// Mixed or no news
    #[serde(alias = "NEUTRAL", alias = "neutral")]
    Neutral,
    /// Bad news for the stock
    #[serde(alias = "NEGATIVE", alias = "negative")]
    Negative,
}

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Low
    #[serde(alias = "Low", alias = "low")]
    Low,
    /// Medium
    #[serde(alias = "Medium", alias = "medium")]
    Medium,
    /// High
    #[serde(alias = "High", alias = "high")]
    High,
}

/// Range checks a parsed payload must pass
pub trait Validate {
    /// Check the payload's ranges
    fn validate(&self) -> Result<()>;
}

/// Documented payload used when the real one cannot be produced
pub trait Fallback {
    /// Fallback payload mentioning `reason`
    fn fallback(reason: &str) -> Self;
}

/// Strictly parse and range-check a reasoning answer
pub fn parse_payload<T>(text: &str, expected: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let payload: T = research_llm::parse_structured(text, expected)?;
    payload.validate()?;
    Ok(payload)
}

/// A 0-10 score with its justification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredJudgement {
    /// Score between 0 and 10
    pub score: u8,
    /// Brief explanation
    #[serde(default)]
    pub justification: String,
}

impl ScoredJudgement {
    /// Highest allowed score
    pub const MAX: u8 = 10;

    /// Create a judgement
    pub fn new(score: u8, justification: impl Into<String>) -> Self {
        Self {
            score,
            justification: justification.into(),
        }
    }

    fn check(&self, field: &str) -> Result<()> {
        if self.score > Self::MAX {
            return Err(Error::parse(
                field,
                format!("score {} is outside 0..={}", self.score, Self::MAX),
            ));
        }
        Ok(())
    }
}

/// Strengths and weaknesses lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrengthsAndWeaknesses {
    /// Strengths
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Weaknesses
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

/// Accept either a list of strings or one string (split into lines)
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Either {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Either::deserialize(deserializer)? {
        Either::Many(items) => items,
        Either::One(text) => text
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
    })
}

/// Accept a string, a number or null
fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// Fundamental analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalAnalysis {
    /// Growth potential
    pub growth_score: ScoredJudgement,
    /// Risk
    pub risk_score: ScoredJudgement,
    /// 3-5 sentence summary
    pub summary: String,
    /// Key metrics and evidence
    #[serde(default, deserialize_with = "string_or_list")]
    pub notes: Vec<String>,
    /// Notable strengths and weaknesses
    #[serde(default)]
    pub strengths_and_weaknesses: StrengthsAndWeaknesses,
}

impl Validate for FundamentalAnalysis {
    fn validate(&self) -> Result<()> {
        self.growth_score.check("growth_score")?;
        self.risk_score.check("risk_score")
    }
}

impl Fallback for FundamentalAnalysis {
    fn fallback(reason: &str) -> Self {
        Self {
            growth_score: ScoredJudgement::new(5, "Analysis failed to parse"),
            risk_score: ScoredJudgement::new(5, "Analysis failed to parse"),
            summary: "Failed to parse fundamental analysis".to_string(),
            notes: vec![reason.to_string()],
            strengths_and_weaknesses: StrengthsAndWeaknesses::default(),
        }
    }
}

/// Technical analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    /// Trading recommendation
    pub recommendation: Recommendation,
    /// Confidence in it
    pub confidence: Confidence,
    /// 2-3 sentence explanation
    pub summary: String,
    /// Most important signals
    #[serde(default, deserialize_with = "string_or_list")]
    pub key_indicators: Vec<String>,
    /// Target price or range
    #[serde(default, deserialize_with = "optional_text")]
    pub price_target: Option<String>,
    /// Risk level
    pub risk_level: RiskLevel,
}

impl Validate for TechnicalAnalysis {
    fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(Error::parse("technical analysis", "summary is empty"));
        }
        Ok(())
    }
}

impl Fallback for TechnicalAnalysis {
    fn fallback(reason: &str) -> Self {
        Self {
            recommendation: Recommendation::None,
            confidence: Confidence::Low,
            summary: "Failed to parse technical analysis".to_string(),
            key_indicators: vec![reason.to_string()],
            price_target: None,
            risk_level: RiskLevel::High,
        }
    }
}

/// News analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsAnalysis {
    /// Overall sentiment
    pub sentiment: Sentiment,
    /// Confidence in it
    pub confidence: Confidence,
    /// Important news items
    #[serde(default, deserialize_with = "string_or_list")]
    pub key_developments: Vec<String>,
    /// Upcoming events or developments
    #[serde(default, deserialize_with = "string_or_list")]
    pub potential_catalysts: Vec<String>,
    /// Risk factors from the news
    #[serde(default, deserialize_with = "string_or_list")]
    pub risks: Vec<String>,
    /// 2-3 sentence summary
    pub summary: String,
}

impl Validate for NewsAnalysis {
    fn validate(&self) -> Result<()> {
        if self.summary.trim().is_empty() {
            return Err(Error::parse("news analysis", "summary is empty"));
        }
        Ok(())
    }
}

impl Fallback for NewsAnalysis {
    fn fallback(reason: &str) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            confidence: Confidence::Low,
            key_developments: Vec::new(),
            potential_catalysts: Vec::new(),
            risks: Vec::new(),
            summary: format!("News analysis unavailable: {reason}"),
        }
    }
}

/// Evidence behind a fundamental report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalEvidence {
    /// Data sections that were fetched
    pub sources: Vec<String>,
    /// Sections that could not be fetched
    pub unavailable: Vec<String>,
}

/// Evidence behind a technical report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalEvidence {
    /// Computed indicators
    pub indicators: Option<IndicatorSet>,
    /// Most recent bar
    pub latest_bar: Option<OhlcvBar>,
    /// First and last day of the series
    pub period: Option<(NaiveDate, NaiveDate)>,
    /// Number of bars used
    pub bar_count: usize,
}

/// Evidence behind a news report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsEvidence {
    /// Every executed tool call
    pub tool_calls: Vec<ToolCallRecord>,
    /// Round trips the loop used
    pub round_trips: usize,
    /// Articles gathered across all successful calls
    pub articles_gathered: usize,
}

/// A branch's report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport<P, E> {
    /// Analysed ticker
    pub ticker: String,
    /// Report health
    pub status: ReportStatus,
    /// Why the report is degraded or failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Structured analysis
    pub analysis: P,
    /// What the analysis was based on
    pub evidence: E,
}

impl<P, E> AnalysisReport<P, E> {
    /// Fully successful report
    pub fn ok(ticker: impl Into<String>, analysis: P, evidence: E) -> Self {
        Self {
            ticker: ticker.into(),
            status: ReportStatus::Ok,
            cause: None,
            analysis,
            evidence,
        }
    }

    /// Report built from partial data or a fallback
    pub fn degraded(
        ticker: impl Into<String>,
        analysis: P,
        evidence: E,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            status: ReportStatus::Degraded,
            cause: Some(cause.into()),
            analysis,
            evidence,
        }
    }
}

impl<P: Fallback, E> AnalysisReport<P, E> {
    /// Failed report carrying the fallback payload
    pub fn failed(ticker: impl Into<String>, evidence: E, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self {
            ticker: ticker.into(),
            status: ReportStatus::Failed,
            analysis: P::fallback(&cause),
            cause: Some(cause),
            evidence,
        }
    }

    /// Degraded report carrying the fallback payload
    pub fn fallback(ticker: impl Into<String>, evidence: E, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        Self::degraded(ticker, P::fallback(&cause), evidence, cause)
    }
}

/// Fundamental branch report
pub type FundamentalReport = AnalysisReport<FundamentalAnalysis, FundamentalEvidence>;
/// Technical branch report
pub type TechnicalReport = AnalysisReport<TechnicalAnalysis, TechnicalEvidence>;
/// News branch report
pub type NewsReport = AnalysisReport<NewsAnalysis, NewsEvidence>;

/// Report of any branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "branch", rename_all = "lowercase")]
pub enum BranchReport {
    /// Fundamentals
    Fundamental(FundamentalReport),
    /// Technicals
    Technical(TechnicalReport),
    /// News
    News(NewsReport),
}

impl BranchReport {
    /// Failed placeholder for a slot
    pub fn failed(slot: BranchSlot, ticker: &str, cause: impl Into<String>) -> Self {
        match slot {
            BranchSlot::Fundamental => {
                Self::Fundamental(FundamentalReport::failed(ticker, FundamentalEvidence::default(), cause))
            }
            BranchSlot::Technical => {
                Self::Technical(TechnicalReport::failed(ticker, TechnicalEvidence::default(), cause))
            }
            BranchSlot::News => Self::News(NewsReport::failed(ticker, NewsEvidence::default(), cause)),
        }
    }

    /// Slot this report fills
    pub fn slot(&self) -> BranchSlot {
        match self {
            Self::Fundamental(_) => BranchSlot::Fundamental,
            Self::Technical(_) => BranchSlot::Technical,
            Self::News(_) => BranchSlot::News,
        }
    }

    /// Report health
    pub fn status(&self) -> ReportStatus {
        match self {
            Self::Fundamental(r) => r.status,
            Self::Technical(r) => r.status,
            Self::News(r) => r.status,
        }
    }

    /// Why the report is degraded or failed
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Fundamental(r) => r.cause.as_deref(),
            Self::Technical(r) => r.cause.as_deref(),
            Self::News(r) => r.cause.as_deref(),
        }
    }
}

/// Report health of each input to the synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputStatuses {
    /// Fundamental report status
    pub fundamental: ReportStatus,
    /// Technical report status
    pub technical: ReportStatus,
    /// News report status
    pub news: ReportStatus,
}

impl InputStatuses {
    /// Statuses in slot order
    pub fn all(&self) -> [ReportStatus; 3] {
        [self.fundamental, self.technical, self.news]
    }

    /// Number of failed inputs
    pub fn failed_count(&self) -> usize {
        self.all().iter().filter(|s| **s == ReportStatus::Failed).count()
    }

    /// Whether every input is ok
    pub fn all_ok(&self) -> bool {
        self.all().iter().all(|s| s.is_ok())
    }
}

/// Detailed part of the final analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    /// Fundamental points behind the decision
    #[serde(default, deserialize_with = "string_or_list")]
    pub fundamental_highlights: Vec<String>,
    /// Technical points behind the decision
    #[serde(default, deserialize_with = "string_or_list")]
    pub technical_highlights: Vec<String>,
    /// News points behind the decision
    #[serde(default, deserialize_with = "string_or_list")]
    pub news_highlights: Vec<String>,
    /// Main risk factors
    #[serde(default, deserialize_with = "string_or_list")]
    pub risks: Vec<String>,
    /// Potential positive catalysts
    #[serde(default, deserialize_with = "string_or_list")]
    pub catalysts: Vec<String>,
    /// Fair value or target range
    #[serde(default, deserialize_with = "optional_text")]
    pub price_target: Option<String>,
    /// Short, medium or long term
    #[serde(default)]
    pub investment_timeline: String,
}

/// Final synthesized analysis payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnalysis {
    /// Overall recommendation
    pub final_recommendation: Recommendation,
    /// Confidence in it
    pub confidence: Confidence,
    /// Growth potential
    pub growth_score: ScoredJudgement,
    /// Risk
    pub risk_score: ScoredJudgement,
    /// 2-3 sentence explanation
    pub short_summary: String,
    /// Supporting detail
    #[serde(default)]
    pub detailed_analysis: DetailedAnalysis,
    /// Conflicting signals between the inputs
    #[serde(default)]
    pub conflicts: Vec<String>,
    /// How the conflicts were resolved
    #[serde(default, deserialize_with = "optional_text")]
    pub conflict_rationale: Option<String>,
}

impl Validate for FinalAnalysis {
    fn validate(&self) -> Result<()> {
        self.growth_score.check("growth_score")?;
        self.risk_score.check("risk_score")?;
        if self.short_summary.trim().is_empty() {
            return Err(Error::parse("final analysis", "short_summary is empty"));
        }
        Ok(())
    }
}

/// Output of a completed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalReport {
    /// Analysed ticker
    pub ticker: String,
    /// `ok` only if every input was ok and the synthesis answered
    pub status: ReportStatus,
    /// Why the report is degraded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Synthesized analysis
    pub analysis: FinalAnalysis,
    /// Deterministic summary of the inputs
    pub digest: SignalDigest,
    /// Health of each input
    pub inputs: InputStatuses,
}
