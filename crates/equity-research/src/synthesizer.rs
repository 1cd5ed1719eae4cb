//! Final synthesis
//!
//! The synthesizer first reduces the three branch reports to a deterministic
//! [`SignalDigest`]. The digest bounds what the reasoning service may claim
//! (its confidence ceiling) and is the sole source of the fallback report
//! when the service cannot produce one.

use crate::prompts::{self, SynthesisInput};
use crate::reasoning::ReasoningClient;
use crate::reports::{
    AnalysisReport, Confidence, DetailedAnalysis, FinalAnalysis, FinalReport, FundamentalReport,
    InputStatuses, NewsReport, Recommendation, ReportStatus, ScoredJudgement, Sentiment,
    TechnicalReport,
};
use research_core::{BranchSlot, Error, Ticker};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Weight of each input in the digest score
pub const FUNDAMENTAL_WEIGHT: f64 = 0.5;
/// Technical weight
pub const TECHNICAL_WEIGHT: f64 = 0.3;
/// News weight
pub const NEWS_WEIGHT: f64 = 0.2;

/// Growth minus risk needed for a directional fundamental signal
const SCORE_SPREAD: i16 = 2;
/// Digest score beyond which the fallback leans BUY or SELL
const LEAN_THRESHOLD: f64 = 0.25;

/// Direction of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Points up
    Bullish,
    /// No clear direction
    Neutral,
    /// Points down
    Bearish,
    /// Input failed or gave no call
    Unknown,
}

impl Signal {
    /// Numeric value used in the weighted score
    pub fn value(self) -> f64 {
        match self {
            Self::Bullish => 1.0,
            Self::Bearish => -1.0,
            Self::Neutral | Self::Unknown => 0.0,
        }
    }

    fn opposes(self, other: Signal) -> bool {
        matches!(
            (self, other),
            (Self::Bullish, Self::Bearish) | (Self::Bearish, Self::Bullish)
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Health and direction of one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignal {
    /// Report status
    pub health: ReportStatus,
    /// Direction read from the report
    pub signal: Signal,
}

/// Deterministic summary of the three inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDigest {
    /// Fundamental input
    pub fundamental: InputSignal,
    /// Technical input
    pub technical: InputSignal,
    /// News input
    pub news: InputSignal,
    /// Weighted direction in `-1.0..=1.0`
    pub weighted_score: f64,
    /// Pairs of inputs pointing in opposite directions
    pub conflicts: Vec<String>,
    /// Highest confidence the final report may state
    pub confidence_ceiling: Confidence,
}

impl SignalDigest {
    /// Digest the three reports
    pub fn from_reports(
        fundamental: &FundamentalReport,
        technical: &TechnicalReport,
        news: &NewsReport,
    ) -> Self {
        let fundamental = InputSignal {
            health: fundamental.status,
            signal: known(fundamental, |a| {
                let spread = i16::from(a.growth_score.score) - i16::from(a.risk_score.score);
                if spread >= SCORE_SPREAD {
                    Signal::Bullish
                } else if spread <= -SCORE_SPREAD {
                    Signal::Bearish
                } else {
                    Signal::Neutral
                }
            }),
        };
        let technical = InputSignal {
            health: technical.status,
            signal: known(technical, |a| match a.recommendation {
                Recommendation::Buy => Signal::Bullish,
                Recommendation::Hold => Signal::Neutral,
                Recommendation::Sell => Signal::Bearish,
                Recommendation::None => Signal::Unknown,
            }),
        };
        let news = InputSignal {
            health: news.status,
            signal: known(news, |a| match a.sentiment {
                Sentiment::Positive => Signal::Bullish,
                Sentiment::Neutral => Signal::Neutral,
                Sentiment::Negative => Signal::Bearish,
            }),
        };

        let weighted_score = round2(
            FUNDAMENTAL_WEIGHT * fundamental.signal.value()
                + TECHNICAL_WEIGHT * technical.signal.value()
                + NEWS_WEIGHT * news.signal.value(),
        );

        let named = [
            (BranchSlot::Fundamental, fundamental.signal),
            (BranchSlot::Technical, technical.signal),
            (BranchSlot::News, news.signal),
        ];
        let mut conflicts = Vec::new();
        for (i, (slot_a, a)) in named.iter().enumerate() {
            for (slot_b, b) in &named[i + 1..] {
                if a.opposes(*b) {
                    conflicts.push(format!("{slot_a} is {a} but {slot_b} is {b}"));
                }
            }
        }

        let inputs = InputStatuses {
            fundamental: fundamental.health,
            technical: technical.health,
            news: news.health,
        };
        let confidence_ceiling = if inputs.all_ok() {
            Confidence::High
        } else if inputs.failed_count() >= 2 {
            Confidence::Low
        } else {
            Confidence::Medium
        };

        Self {
            fundamental,
            technical,
            news,
            weighted_score,
            conflicts,
            confidence_ceiling,
        }
    }

    /// Statuses of the three inputs
    pub fn inputs(&self) -> InputStatuses {
        InputStatuses {
            fundamental: self.fundamental.health,
            technical: self.technical.health,
            news: self.news.health,
        }
    }

    /// Recommendation implied by the weighted score alone
    pub fn leaning(&self) -> Recommendation {
        let signals = [self.fundamental.signal, self.technical.signal, self.news.signal];
        if signals.iter().all(|s| *s == Signal::Unknown) {
            Recommendation::None
        } else if self.weighted_score >= LEAN_THRESHOLD {
            Recommendation::Buy
        } else if self.weighted_score <= -LEAN_THRESHOLD {
            Recommendation::Sell
        } else {
            Recommendation::Hold
        }
    }
}

/// Failed reports carry placeholder content, so their direction is unknown
fn known<P, E>(report: &AnalysisReport<P, E>, read: impl Fn(&P) -> Signal) -> Signal {
    if report.status == ReportStatus::Failed {
        Signal::Unknown
    } else {
        read(&report.analysis)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Merges the three branch reports into the final report
#[derive(Debug, Clone)]
pub struct Synthesizer {
    reasoning: ReasoningClient,
}

impl Synthesizer {
    /// Create a synthesizer
    pub fn new(reasoning: ReasoningClient) -> Self {
        Self { reasoning }
    }

    /// Produce the final report; never fails
    pub async fn run(
        &self,
        ticker: &Ticker,
        fundamental: &FundamentalReport,
        technical: &TechnicalReport,
        news: &NewsReport,
    ) -> FinalReport {
        let digest = SignalDigest::from_reports(fundamental, technical, news);
        let inputs = digest.inputs();
        info!(
            ticker = %ticker,
            weighted_score = digest.weighted_score,
            conflicts = digest.conflicts.len(),
            ceiling = ?digest.confidence_ceiling,
            "Signal digest built"
        );

        let answer = self.ask(ticker, fundamental, technical, news, &digest).await;

        let (analysis, synthesis_error) = match answer {
            Ok(analysis) => (bounded(analysis, &digest), None),
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Synthesis failed, using digest fallback");
                (fallback(fundamental, &digest, &e), Some(e))
            }
        };

        let mut problems: Vec<String> = [
            (BranchSlot::Fundamental, inputs.fundamental),
            (BranchSlot::Technical, inputs.technical),
            (BranchSlot::News, inputs.news),
        ]
        .into_iter()
        .filter(|(_, status)| !status.is_ok())
        .map(|(slot, status)| format!("{slot} input {status}"))
        .collect();
        if let Some(e) = &synthesis_error {
            problems.push(format!("synthesis fallback: {e}"));
        }

        let (status, cause) = if problems.is_empty() {
            (ReportStatus::Ok, None)
        } else {
            (ReportStatus::Degraded, Some(problems.join("; ")))
        };

        FinalReport {
            ticker: ticker.to_string(),
            status,
            cause,
            analysis,
            digest,
            inputs,
        }
    }

    async fn ask(
        &self,
        ticker: &Ticker,
        fundamental: &FundamentalReport,
        technical: &TechnicalReport,
        news: &NewsReport,
        digest: &SignalDigest,
    ) -> research_core::Result<FinalAnalysis> {
        let fundamental_status = fundamental.status.to_string();
        let technical_status = technical.status.to_string();
        let news_status = news.status.to_string();

        let prompt = prompts::synthesis_prompt(
            ticker,
            SynthesisInput { status: &fundamental_status, report: fundamental },
            SynthesisInput { status: &technical_status, report: technical },
            SynthesisInput { status: &news_status, report: news },
            digest,
        )?;

        self.reasoning
            .ask_structured(prompts::SYNTHESIZER, &prompt, "final analysis")
            .await
    }
}

/// Clamp confidence and make sure detected conflicts are carried
fn bounded(mut analysis: FinalAnalysis, digest: &SignalDigest) -> FinalAnalysis {
    analysis.confidence = analysis.confidence.min(digest.confidence_ceiling);

    for conflict in &digest.conflicts {
        if !analysis.conflicts.contains(conflict) {
            analysis.conflicts.push(conflict.clone());
        }
    }
    if !analysis.conflicts.is_empty() && analysis.conflict_rationale.is_none() {
        analysis.conflict_rationale = Some(weighting_rationale(digest));
    }
    analysis
}

fn weighting_rationale(digest: &SignalDigest) -> String {
    format!(
        "Resolved by weighting fundamental {FUNDAMENTAL_WEIGHT}, technical {TECHNICAL_WEIGHT} \
         and news {NEWS_WEIGHT}; weighted score {:.2}",
        digest.weighted_score
    )
}

/// Final analysis derived from the digest alone
fn fallback(fundamental: &FundamentalReport, digest: &SignalDigest, cause: &Error) -> FinalAnalysis {
    let (growth_score, risk_score) = if fundamental.status == ReportStatus::Failed {
        (
            ScoredJudgement::new(5, "Fundamental analysis unavailable"),
            ScoredJudgement::new(5, "Fundamental analysis unavailable"),
        )
    } else {
        (
            fundamental.analysis.growth_score.clone(),
            fundamental.analysis.risk_score.clone(),
        )
    };

    let recommendation = digest.leaning();
    let conflict_rationale = (!digest.conflicts.is_empty()).then(|| weighting_rationale(digest));

    FinalAnalysis {
        final_recommendation: recommendation,
        confidence: Confidence::Low,
        growth_score,
        risk_score,
        short_summary: format!(
            "Automated synthesis was unavailable ({cause}). The {} recommendation follows the \
             weighted direction of the inputs (score {:.2}).",
            recommendation_label(recommendation),
            digest.weighted_score
        ),
        detailed_analysis: DetailedAnalysis {
            fundamental_highlights: vec![format!("Fundamental signal: {}", digest.fundamental.signal)],
            technical_highlights: vec![format!("Technical signal: {}", digest.technical.signal)],
            news_highlights: vec![format!("News signal: {}", digest.news.signal)],
            ..DetailedAnalysis::default()
        },
        conflicts: digest.conflicts.clone(),
        conflict_rationale,
    }
}

fn recommendation_label(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::Buy => "BUY",
        Recommendation::Hold => "HOLD",
        Recommendation::Sell => "SELL",
        Recommendation::None => "NONE",
    }
}
