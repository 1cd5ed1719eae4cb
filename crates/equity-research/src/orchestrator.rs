//! Request orchestration
//!
//! One request walks an explicit state table:
//!
//! ```text
//! Start -> Extracting -> Rejected
//!                     -> Dispatched -> Joining -> Synthesizing -> Done
//! ```
//!
//! The three branches run as independent tokio tasks. They never see the
//! shared state; their reports are written to their slots after the join,
//! and only then does synthesis start.

use crate::branches::{AnalysisBranch, FundamentalBranch, NewsBranch, TechnicalBranch};
use crate::config::{NewsToolKind, ResearchConfig};
use crate::extraction::{TickerExtractor, extractor_for, into_candidate};
use crate::market::{FundamentalsSource, NewsSearch, PriceHistorySource};
use crate::reasoning::ReasoningClient;
use crate::reports::{
    BranchReport, FinalReport, FundamentalEvidence, FundamentalReport, NewsEvidence, NewsReport,
    TechnicalEvidence, TechnicalReport,
};
use crate::synthesizer::Synthesizer;
use crate::tools::{NewsSearchTool, SearchDefaults};
use futures::future::join_all;
use research_core::state::keys;
use research_core::{BranchSlot, Error, Result, SharedState, Ticker};
use research_llm::ReasoningService;
use research_tools::ToolRegistry;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Default outer bound on one branch
pub const DEFAULT_BRANCH_TIMEOUT: Duration = Duration::from_secs(180);

/// Request states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    /// Request received
    Start,
    /// Looking for a ticker
    Extracting,
    /// No valid ticker; terminal
    Rejected,
    /// Branch tasks spawned
    Dispatched,
    /// Waiting for every branch
    Joining,
    /// Merging the branch reports
    Synthesizing,
    /// Final report written; terminal
    Done,
}

/// Inputs that drive [`RequestState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// Extraction started
    Received,
    /// The candidate passed validation
    TickerAccepted,
    /// No candidate, or it failed validation
    TickerRejected,
    /// All branch tasks are running
    BranchesSpawned,
    /// Every slot holds a report
    BranchesJoined,
    /// The final report is written
    Synthesized,
}

impl RequestState {
    /// Transition table; `None` means the event is not valid in this state
    pub fn on(self, event: RequestEvent) -> Option<RequestState> {
        use RequestEvent as E;
        use RequestState as S;

        match (self, event) {
            (S::Start, E::Received) => Some(S::Extracting),
            (S::Extracting, E::TickerRejected) => Some(S::Rejected),
            (S::Extracting, E::TickerAccepted) => Some(S::Dispatched),
            (S::Dispatched, E::BranchesSpawned) => Some(S::Joining),
            (S::Joining, E::BranchesJoined) => Some(S::Synthesizing),
            (S::Synthesizing, E::Synthesized) => Some(S::Done),
            _ => None,
        }
    }

    /// Whether the state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Done)
    }
}

/// Everything a request produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOutcome {
    /// Unique id of the request
    pub request_id: String,
    /// Visited states, starting with `Start`
    pub trace: Vec<RequestState>,
    /// Request-scoped state, slots included
    pub state: SharedState,
    /// Final report, when the request was not rejected
    pub report: Option<FinalReport>,
    /// Why the request was rejected
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "as_display")]
    pub rejection: Option<Error>,
}

#[allow(clippy::ref_option)]
fn as_display<S>(error: &Option<Error>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

impl RequestOutcome {
    /// Whether the request stopped at extraction
    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }

    /// State the request ended in
    pub fn final_state(&self) -> RequestState {
        self.trace.last().copied().unwrap_or(RequestState::Start)
    }
}

/// Bookkeeping for one request
struct Run {
    state: RequestState,
    trace: Vec<RequestState>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: RequestState::Start,
            trace: vec![RequestState::Start],
        }
    }

    fn fire(&mut self, event: RequestEvent) {
        match self.state.on(event) {
            Some(next) => {
                info!(from = ?self.state, to = ?next, "Request transition");
                self.state = next;
                self.trace.push(next);
            }
            None => warn!(state = ?self.state, event = ?event, "Ignoring invalid request event"),
        }
    }
}

/// Data collaborators the pipeline is wired to
pub struct DataSources {
    /// Daily bars for the technical branch
    pub prices: Arc<dyn PriceHistorySource>,
    /// Statements and ratios for the fundamental branch
    pub fundamentals: Arc<dyn FundamentalsSource>,
    /// Search backends, keyed by the tool they back
    pub news: Vec<(NewsToolKind, Arc<dyn NewsSearch>)>,
}

/// Runs research requests end to end
pub struct Orchestrator {
    extractor: Arc<dyn TickerExtractor>,
    fundamental: Arc<dyn AnalysisBranch>,
    technical: Arc<dyn AnalysisBranch>,
    news: Arc<dyn AnalysisBranch>,
    synthesizer: Synthesizer,
    branch_timeout: Duration,
}

impl Orchestrator {
    /// Create a builder
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Wire the full pipeline from configuration
    ///
    /// News tools are registered in the order `config.news_tools` lists them;
    /// kinds without a backend in `sources.news` are skipped.
    pub fn from_config(
        config: &ResearchConfig,
        service: Arc<dyn ReasoningService>,
        sources: DataSources,
    ) -> Result<Self> {
        let reasoning = ReasoningClient::new(Arc::clone(&service), config);
        let defaults = SearchDefaults {
            lookback_days: config.news_lookback_days,
            max_results: config.news_max_results,
        };

        let mut registry = ToolRegistry::new();
        for kind in &config.news_tools {
            match sources.news.iter().find(|(k, _)| k == kind) {
                Some((_, backend)) => registry.register(Arc::new(
                    NewsSearchTool::for_kind(*kind, Arc::clone(backend)).with_defaults(defaults),
                )),
                None => warn!(tool = ?kind, "No backend for news tool, skipping"),
            }
        }
        if registry.is_empty() {
            return Err(Error::InvalidInput("no news search tool is available".to_string()));
        }
        info!(tools = ?registry.names(), "News tools registered");

        Self::builder()
            .extractor(extractor_for(config.extraction, &reasoning))
            .branch(Arc::new(FundamentalBranch::new(
                sources.fundamentals,
                reasoning.clone(),
                config.fetch_timeout,
            )))
            .branch(Arc::new(TechnicalBranch::new(
                sources.prices,
                reasoning.clone(),
                config.fetch_timeout,
                config.history_days,
            )))
            .branch(Arc::new(NewsBranch::new(service, Arc::new(registry), config)?))
            .synthesizer(Synthesizer::new(reasoning))
            .branch_timeout(config.branch_timeout)
            .build()
    }

    /// Run a request to a terminal state
    pub async fn run(&self, request: &str) -> RequestOutcome {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("research_request", request_id = %request_id);
        self.run_inner(request, request_id).instrument(span).await
    }

    /// Run a request and return its final report
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the request names no valid ticker.
    pub async fn analyze(&self, request: &str) -> Result<FinalReport> {
        let outcome = self.run(request).await;
        match (outcome.report, outcome.rejection) {
            (Some(report), _) => Ok(report),
            (None, Some(rejection)) => Err(rejection),
            (None, None) => Err(Error::Generic("request ended without a report".to_string())),
        }
    }

    async fn run_inner(&self, request: &str, request_id: String) -> RequestOutcome {
        let mut run = Run::new();
        let mut state = SharedState::new()
            .with_request(request)
            .with_request_id(request_id.clone());

        run.fire(RequestEvent::Received);
        let ticker = match self.extract(request).await {
            Ok(ticker) => ticker,
            Err(rejection) => {
                warn!(extractor = self.extractor.name(), error = %rejection, "Request rejected");
                run.fire(RequestEvent::TickerRejected);
                return RequestOutcome {
                    request_id,
                    trace: run.trace,
                    state,
                    report: None,
                    rejection: Some(rejection),
                };
            }
        };
        state.set_ticker(&ticker);
        run.fire(RequestEvent::TickerAccepted);
        info!(ticker = %ticker, "Dispatching analysis branches");

        let handles: Vec<_> = [&self.fundamental, &self.technical, &self.news]
            .into_iter()
            .map(|branch| self.spawn_branch(Arc::clone(branch), &ticker))
            .collect();
        run.fire(RequestEvent::BranchesSpawned);

        let reports = join_all(handles.into_iter().map(|(slot, handle)| {
            let ticker = ticker.clone();
            async move {
                handle.await.unwrap_or_else(|e| {
                    warn!(slot = %slot, error = %e, "Branch task aborted");
                    BranchReport::failed(slot, ticker.as_str(), format!("{slot} branch aborted: {e}"))
                })
            }
        }))
        .await;

        let (fundamental, technical, news) = by_slot(reports, &ticker);
        fill(&mut state, BranchSlot::Fundamental, &fundamental);
        fill(&mut state, BranchSlot::Technical, &technical);
        fill(&mut state, BranchSlot::News, &news);
        run.fire(RequestEvent::BranchesJoined);

        let report = self
            .synthesizer
            .run(&ticker, &fundamental, &technical, &news)
            .await;
        if let Err(e) = state.insert_typed(keys::FINAL_REPORT, &report) {
            warn!(error = %e, "Could not store final report in state");
        }
        run.fire(RequestEvent::Synthesized);
        info!(
            ticker = %ticker,
            status = %report.status,
            recommendation = ?report.analysis.final_recommendation,
            "Research request finished"
        );

        RequestOutcome {
            request_id,
            trace: run.trace,
            state,
            report: Some(report),
            rejection: None,
        }
    }

    /// Extract a candidate and validate it
    async fn extract(&self, request: &str) -> Result<Ticker> {
        let candidate = into_candidate(self.extractor.extract(request).await)?;
        Ticker::parse(&candidate)
    }

    fn spawn_branch(
        &self,
        branch: Arc<dyn AnalysisBranch>,
        ticker: &Ticker,
    ) -> (BranchSlot, tokio::task::JoinHandle<BranchReport>) {
        let slot = branch.slot();
        let ticker = ticker.clone();
        let timeout = self.branch_timeout;
        let span = info_span!("branch", slot = %slot, ticker = %ticker);

        let handle = tokio::spawn(
            async move {
                match tokio::time::timeout(timeout, branch.run(&ticker)).await {
                    Ok(report) => {
                        info!(status = %report.status(), "Branch finished");
                        report
                    }
                    Err(_) => {
                        let cause = Error::timeout(format!("{slot} branch"), timeout);
                        warn!(error = %cause, "Branch timed out");
                        BranchReport::failed(slot, ticker.as_str(), cause.to_string())
                    }
                }
            }
            .instrument(span),
        );
        (slot, handle)
    }
}

/// Typed reports per slot; a missing slot gets a failed placeholder
fn by_slot(reports: Vec<BranchReport>, ticker: &Ticker) -> (FundamentalReport, TechnicalReport, NewsReport) {
    let mut fundamental = None;
    let mut technical = None;
    let mut news = None;
    for report in reports {
        match report {
            BranchReport::Fundamental(r) => fundamental = Some(r),
            BranchReport::Technical(r) => technical = Some(r),
            BranchReport::News(r) => news = Some(r),
        }
    }

    let missing = |slot: BranchSlot| format!("{slot} branch produced no report");
    (
        fundamental.unwrap_or_else(|| {
            FundamentalReport::failed(ticker.as_str(), FundamentalEvidence::default(), missing(BranchSlot::Fundamental))
        }),
        technical.unwrap_or_else(|| {
            TechnicalReport::failed(ticker.as_str(), TechnicalEvidence::default(), missing(BranchSlot::Technical))
        }),
        news.unwrap_or_else(|| NewsReport::failed(ticker.as_str(), NewsEvidence::default(), missing(BranchSlot::News))),
    )
}

fn fill<T: Serialize>(state: &mut SharedState, slot: BranchSlot, report: &T) {
    if let Err(e) = state.fill_slot(slot, report) {
        warn!(slot = %slot, error = %e, "Could not store branch report in state");
    }
}

/// Builder for [`Orchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    extractor: Option<Arc<dyn TickerExtractor>>,
    fundamental: Option<Arc<dyn AnalysisBranch>>,
    technical: Option<Arc<dyn AnalysisBranch>>,
    news: Option<Arc<dyn AnalysisBranch>>,
    synthesizer: Option<Synthesizer>,
    branch_timeout: Option<Duration>,
}

impl OrchestratorBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticker extractor
    pub fn extractor(mut self, extractor: Arc<dyn TickerExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Branch for its own slot
    pub fn branch(mut self, branch: Arc<dyn AnalysisBranch>) -> Self {
        match branch.slot() {
            BranchSlot::Fundamental => self.fundamental = Some(branch),
            BranchSlot::Technical => self.technical = Some(branch),
            BranchSlot::News => self.news = Some(branch),
        }
        self
    }

    /// Synthesizer
    pub fn synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Outer bound on each branch
    pub fn branch_timeout(mut self, timeout: Duration) -> Self {
        self.branch_timeout = Some(timeout);
        self
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<Orchestrator> {
        let missing = |what: &str| Error::InvalidInput(format!("orchestrator needs {what}"));
        Ok(Orchestrator {
            extractor: self.extractor.ok_or_else(|| missing("a ticker extractor"))?,
            fundamental: self.fundamental.ok_or_else(|| missing("a fundamental branch"))?,
            technical: self.technical.ok_or_else(|| missing("a technical branch"))?,
            news: self.news.ok_or_else(|| missing("a news branch"))?,
            synthesizer: self.synthesizer.ok_or_else(|| missing("a synthesizer"))?,
            branch_timeout: self.branch_timeout.unwrap_or(DEFAULT_BRANCH_TIMEOUT),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PatternExtractor;
    use crate::reports::ReportStatus;
    use crate::testing::{FINAL_JSON, FUNDAMENTAL_JSON, ScriptedService, StaticFundamentals, StaticPrices};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Branch with a fixed behaviour, counting its runs
    struct StubBranch {
        slot: BranchSlot,
        delay: Duration,
        panics: bool,
        runs: AtomicUsize,
    }

    impl StubBranch {
        fn new(slot: BranchSlot) -> Arc<Self> {
            Arc::new(Self {
                slot,
                delay: Duration::ZERO,
                panics: false,
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AnalysisBranch for StubBranch {
        fn slot(&self) -> BranchSlot {
            self.slot
        }

        async fn run(&self, ticker: &Ticker) -> BranchReport {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            assert!(!self.panics, "stub branch panicked");
            BranchReport::failed(self.slot, ticker.as_str(), "stub")
        }
    }

    fn synthesizer(text: &str) -> Synthesizer {
        Synthesizer::new(ReasoningClient::new(ScriptedService::answering(text), &ResearchConfig::default()))
    }

    fn stubs() -> [Arc<StubBranch>; 3] {
        BranchSlot::ALL.map(StubBranch::new)
    }

    fn orchestrator(branches: &[Arc<StubBranch>; 3], timeout: Duration) -> Orchestrator {
        let mut builder = Orchestrator::builder()
            .extractor(Arc::new(PatternExtractor::new()))
            .synthesizer(synthesizer(FINAL_JSON))
            .branch_timeout(timeout);
        for branch in branches {
            builder = builder.branch(branch.clone());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_transition_table() {
        use RequestEvent as E;
        use RequestState as S;

        assert_eq!(S::Start.on(E::Received), Some(S::Extracting));
        assert_eq!(S::Extracting.on(E::TickerRejected), Some(S::Rejected));
        assert_eq!(S::Extracting.on(E::TickerAccepted), Some(S::Dispatched));
        assert_eq!(S::Joining.on(E::BranchesJoined), Some(S::Synthesizing));
        assert_eq!(S::Rejected.on(E::BranchesSpawned), None);
        assert_eq!(S::Start.on(E::Synthesized), None);
        assert!(S::Done.is_terminal());
        assert!(!S::Synthesizing.is_terminal());
    }

    #[tokio::test]
    async fn test_rejection_spawns_nothing() {
        let branches = stubs();
        let outcome = orchestrator(&branches, DEFAULT_BRANCH_TIMEOUT)
            .run("how is the market doing?")
            .await;

        assert!(outcome.is_rejected());
        assert_eq!(
            outcome.trace,
            vec![RequestState::Start, RequestState::Extracting, RequestState::Rejected]
        );
        assert!(outcome.report.is_none());
        assert!(branches.iter().all(|b| b.runs.load(Ordering::SeqCst) == 0));
        assert_eq!(outcome.state.missing_slots(&BranchSlot::ALL).len(), 3);
    }

    #[tokio::test]
    async fn test_full_trace_and_slots() {
        let branches = stubs();
        let outcome = orchestrator(&branches, DEFAULT_BRANCH_TIMEOUT).run("analyze AAPL").await;

        assert_eq!(
            outcome.trace,
            vec![
                RequestState::Start,
                RequestState::Extracting,
                RequestState::Dispatched,
                RequestState::Joining,
                RequestState::Synthesizing,
                RequestState::Done,
            ]
        );
        assert_eq!(outcome.state.ticker(), Some("AAPL"));
        assert!(outcome.state.missing_slots(&BranchSlot::ALL).is_empty());
        assert!(outcome.state.contains_key(keys::FINAL_REPORT));
        assert_eq!(outcome.state.request_id(), Some(outcome.request_id.as_str()));
        assert!(branches.iter().all(|b| b.runs.load(Ordering::SeqCst) == 1));
    }

    #[tokio::test]
    async fn test_slow_branch_gets_placeholder() {
        let mut branches = stubs();
        branches[1] = Arc::new(StubBranch {
            slot: BranchSlot::Technical,
            delay: Duration::from_secs(5),
            panics: false,
            runs: AtomicUsize::new(0),
        });

        let outcome = orchestrator(&branches, Duration::from_millis(100)).run("analyze MSFT").await;
        let technical: TechnicalReport = outcome.state.slot(BranchSlot::Technical).unwrap().unwrap();

        assert_eq!(technical.status, ReportStatus::Failed);
        assert!(technical.cause.unwrap().contains("timed out"));
        assert_eq!(outcome.final_state(), RequestState::Done);
    }

    #[tokio::test]
    async fn test_panicking_branch_gets_placeholder() {
        let mut branches = stubs();
        branches[2] = Arc::new(StubBranch {
            slot: BranchSlot::News,
            delay: Duration::ZERO,
            panics: true,
            runs: AtomicUsize::new(0),
        });

        let report = orchestrator(&branches, DEFAULT_BRANCH_TIMEOUT)
            .analyze("analyze TSLA")
            .await
            .unwrap();

        assert_eq!(report.inputs.news, ReportStatus::Failed);
        assert_eq!(report.status, ReportStatus::Degraded);
    }

    #[tokio::test]
    async fn test_analyze_surfaces_validation_error() {
        let err = orchestrator(&stubs(), DEFAULT_BRANCH_TIMEOUT)
            .analyze("tell me about apple")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_real_branches_fill_slots() {
        let config = ResearchConfig::default();
        let fundamental = FundamentalBranch::new(
            StaticFundamentals::ok(),
            ReasoningClient::new(ScriptedService::answering(FUNDAMENTAL_JSON), &config),
            config.fetch_timeout,
        );
        // Unparseable technical answer degrades but still fills its slot
        let technical = TechnicalBranch::new(
            StaticPrices::ok(40),
            ReasoningClient::new(ScriptedService::answering("no idea"), &config),
            config.fetch_timeout,
            config.history_days,
        );

        let outcome = Orchestrator::builder()
            .extractor(Arc::new(PatternExtractor::new()))
            .branch(Arc::new(fundamental))
            .branch(Arc::new(technical))
            .branch(StubBranch::new(BranchSlot::News))
            .synthesizer(synthesizer(FINAL_JSON))
            .build()
            .unwrap()
            .run("analyze AAPL")
            .await;

        let fundamental: FundamentalReport = outcome.state.slot(BranchSlot::Fundamental).unwrap().unwrap();
        let technical: TechnicalReport = outcome.state.slot(BranchSlot::Technical).unwrap().unwrap();
        assert_eq!(fundamental.status, ReportStatus::Ok);
        assert_eq!(technical.status, ReportStatus::Degraded);
        assert!(technical.evidence.indicators.is_some());

        let report = outcome.report.unwrap();
        assert_eq!(report.inputs.technical, ReportStatus::Degraded);
    }

    #[test]
    fn test_builder_requires_branches() {
        let result = Orchestrator::builder()
            .extractor(Arc::new(PatternExtractor::new()))
            .synthesizer(synthesizer(FINAL_JSON))
            .build();
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
