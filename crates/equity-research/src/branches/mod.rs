//! Analysis branches
//!
//! A branch turns a validated ticker into a [`BranchReport`]. Branches never
//! fail: fetch, reasoning and parse problems end up in the report's status and
//! cause, so the join after dispatch always has three reports to work with.

mod fundamental;
mod news;
mod technical;

pub use fundamental::FundamentalBranch;
pub use news::NewsBranch;
pub use technical::TechnicalBranch;

use crate::reports::{AnalysisReport, BranchReport, Fallback};
use async_trait::async_trait;
use research_core::{BranchSlot, Error, Result, Ticker};
use tracing::warn;

/// One of the parallel analyses
#[async_trait]
pub trait AnalysisBranch: Send + Sync {
    /// Slot the report is written to
    fn slot(&self) -> BranchSlot;

    /// Produce the report for `ticker`
    async fn run(&self, ticker: &Ticker) -> BranchReport;
}

/// Turn the outcome of a structured reasoning call into a report
///
/// Parse errors give the documented fallback (`degraded`); anything else is
/// `failed`. `partial` marks an otherwise good report as degraded.
pub(crate) fn conclude<P: Fallback, E>(
    slot: BranchSlot,
    ticker: &Ticker,
    evidence: E,
    result: Result<P>,
    partial: Option<String>,
) -> AnalysisReport<P, E> {
    match (result, partial) {
        (Ok(analysis), None) => AnalysisReport::ok(ticker.as_str(), analysis, evidence),
        (Ok(analysis), Some(cause)) => {
            warn!(branch = %slot, ticker = %ticker, cause = %cause, "Analysis degraded");
            AnalysisReport::degraded(ticker.as_str(), analysis, evidence, cause)
        }
        (Err(e @ Error::Parse { .. }), _) => {
            warn!(branch = %slot, ticker = %ticker, error = %e, "Unparseable analysis, using fallback");
            AnalysisReport::fallback(ticker.as_str(), evidence, e.to_string())
        }
        (Err(e), _) => {
            warn!(branch = %slot, ticker = %ticker, error = %e, "Analysis failed");
            AnalysisReport::failed(ticker.as_str(), evidence, e.to_string())
        }
    }
}
