//! Equity research pipeline
//!
//! Turns a free-text request such as `"analyze AAPL"` into a structured
//! investment report. The pipeline:
//!
//! - extracts and validates a ticker ([`extraction`], [`research_core::Ticker`])
//! - runs fundamental, technical and news analyses in parallel ([`branches`])
//! - computes price indicators locally ([`indicators`])
//! - lets the news analyst search through a bounded tool loop
//!   ([`research_runtime::ToolCallLoop`], [`tools`])
//! - merges the three reports into one recommendation ([`synthesizer`])
//!
//! Every stage after validation is total: failures show up as `failed` or
//! `degraded` reports, never as errors, so a valid request always ends with
//! a final report.
//!
//! # Example
//!
//! ```rust,ignore
//! use equity_research::{DataSources, FmpClient, Orchestrator, ResearchConfig, TavilyClient};
//! use equity_research::config::NewsToolKind;
//! use research_llm::providers::OpenAIProvider;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResearchConfig::from_env()?;
//!     let fmp = Arc::new(FmpClient::from_env(config.fmp_requests_per_minute)?);
//!     let tavily = Arc::new(TavilyClient::from_env()?);
//!
//!     let orchestrator = Orchestrator::from_config(
//!         &config,
//!         Arc::new(OpenAIProvider::from_env()?),
//!         DataSources {
//!             prices: fmp.clone(),
//!             fundamentals: fmp.clone(),
//!             news: vec![(NewsToolKind::Tavily, tavily), (NewsToolKind::Fmp, fmp)],
//!         },
//!     )?;
//!
//!     let report = orchestrator.analyze("analyze AAPL").await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod branches;
pub mod config;
pub mod error;
pub mod extraction;
pub mod indicators;
pub mod market;
pub mod orchestrator;
pub mod prompts;
pub mod reasoning;
pub mod reports;
pub mod synthesizer;
pub mod tools;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use branches::{AnalysisBranch, FundamentalBranch, NewsBranch, TechnicalBranch};
pub use config::{ExtractionMode, NewsToolKind, ResearchConfig};
pub use error::{ResearchError, Result};
pub use extraction::{PatternExtractor, ReasoningExtractor, TickerExtractor};
pub use indicators::{IndicatorEngine, IndicatorSet, OhlcvBar, TimeSeries};
pub use market::{FmpClient, TavilyClient};
pub use orchestrator::{DataSources, Orchestrator, RequestOutcome, RequestState};
pub use reasoning::ReasoningClient;
pub use reports::{BranchReport, FinalReport, ReportStatus};
pub use synthesizer::{SignalDigest, Synthesizer};
