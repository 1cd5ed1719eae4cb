//! Bounded reasoning/tool-call loop
//!
//! The loop alternates between asking the reasoning service for its next
//! move and executing the tools it requests:
//!
//! ```text
//! Thinking --tool calls--> WantsTool --budget left--> Invoking --observations--> Thinking
//!    |                         |
//!    +--answer / failure--> Done <--budget exhausted
//! ```
//!
//! Tool preference is expressed to the service through the order of the tool
//! specs and the prompt; the loop itself runs whatever is requested. The
//! number of `Thinking -> Invoking` round trips is capped by
//! [`LoopConfig::max_round_trips`], so the loop ends even when the service
//! never stops asking for tools.

use futures::future::join_all;
use research_core::{Error, Result};
use research_llm::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, ReasoningService, ToolCall,
    ToolSpec,
};
use research_tools::{ToolCallLog, ToolCallRecord, ToolOutcome, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default round-trip bound
pub const DEFAULT_MAX_ROUND_TRIPS: usize = 4;

/// Configuration for a tool loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum number of `Thinking -> Invoking` round trips (must be >= 1)
    pub max_round_trips: usize,

    /// Maximum tool calls executed per round trip
    pub max_calls_per_round: usize,

    /// Model to use
    pub model: String,

    /// System prompt
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature
    pub temperature: Option<f32>,

    /// Deadline for a single reasoning call
    pub reasoning_timeout: Duration,

    /// Deadline for a single tool call
    pub tool_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_round_trips: DEFAULT_MAX_ROUND_TRIPS,
            max_calls_per_round: 4,
            model: "gpt-4o-mini".to_string(),
            system_prompt: None,
            max_tokens: 2048,
            temperature: Some(0.0),
            reasoning_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(10),
        }
    }
}

impl LoopConfig {
    /// Capacity of the call log implied by the bounds
    pub fn max_tool_calls(&self) -> usize {
        self.max_round_trips * self.max_calls_per_round
    }
}

/// Loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    /// Waiting on the reasoning service
    Thinking,
    /// The service asked for tools; budget not yet checked
    WantsTool,
    /// Executing requested tools
    Invoking,
    /// Terminal
    Done,
}

/// Inputs that drive [`LoopState`] transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEvent {
    /// The service replied with at least one tool call
    ToolCallsRequested,
    /// The service replied without tool calls
    FinalAnswer,
    /// The service errored or timed out
    ServiceFailed,
    /// Round-trip budget remains
    BudgetAvailable,
    /// Round-trip budget used up
    BudgetExhausted,
    /// Tool observations were appended to the conversation
    ObservationsRecorded,
}

impl LoopState {
    /// Transition table; `None` means the event is not valid in this state
    pub fn on(self, event: LoopEvent) -> Option<LoopState> {
        use LoopEvent as E;
        use LoopState as S;

        match (self, event) {
            (S::Thinking, E::ToolCallsRequested) => Some(S::WantsTool),
            (S::Thinking, E::FinalAnswer | E::ServiceFailed) => Some(S::Done),
            (S::WantsTool, E::BudgetAvailable) => Some(S::Invoking),
            (S::WantsTool, E::BudgetExhausted) => Some(S::Done),
            (S::Invoking, E::ObservationsRecorded) => Some(S::Thinking),
            _ => None,
        }
    }

    /// Whether the state is terminal
    pub fn is_terminal(self) -> bool {
        self == LoopState::Done
    }
}

/// How the loop ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum LoopTermination {
    /// The service gave a final answer (text of its last message)
    Answered(String),
    /// The service still wanted tools after the last allowed round trip
    BoundExceeded,
    /// The service errored or timed out
    ReasoningFailed(String),
}

/// Result of a loop run
///
/// A run never errors; every way of ending is described here, together with
/// every tool call that was made.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopOutcome {
    /// How the loop ended
    pub termination: LoopTermination,
    /// Every executed tool call, in order
    pub records: Vec<ToolCallRecord>,
    /// Completed `Thinking -> Invoking -> Thinking` round trips
    pub round_trips: usize,
    /// Calls made to the reasoning service
    pub reasoning_calls: usize,
    /// Visited states, starting with `Thinking` and ending with `Done`
    pub trace: Vec<LoopState>,
    /// The configured bound
    pub max_round_trips: usize,
}

impl LoopOutcome {
    /// Final answer text, if the service produced one
    pub fn answer(&self) -> Option<&str> {
        match &self.termination {
            LoopTermination::Answered(text) => Some(text),
            _ => None,
        }
    }

    /// The error describing a non-answer ending
    pub fn error(&self) -> Option<Error> {
        match &self.termination {
            LoopTermination::Answered(_) => None,
            LoopTermination::BoundExceeded => Some(Error::LoopBoundExceeded(self.max_round_trips)),
            LoopTermination::ReasoningFailed(cause) => {
                Some(Error::upstream("reasoning service", cause.clone()))
            }
        }
    }

    /// Successful tool results, in order
    pub fn successful_results(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.records.iter().filter_map(|r| match &r.outcome {
            ToolOutcome::Success { result } => Some(result),
            ToolOutcome::Failure { .. } => None,
        })
    }

    /// Whether at least one call was made and every call failed
    pub fn all_calls_failed(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| !r.outcome.is_success())
    }
}

/// Bookkeeping for one run
struct Run {
    state: LoopState,
    trace: Vec<LoopState>,
}

impl Run {
    fn new() -> Self {
        Self {
            state: LoopState::Thinking,
            trace: vec![LoopState::Thinking],
        }
    }

    fn fire(&mut self, event: LoopEvent) {
        match self.state.on(event) {
            Some(next) => {
                debug!(from = ?self.state, to = ?next, event = ?event, "Tool loop transition");
                self.state = next;
                self.trace.push(next);
            }
            None => {
                // The loop below only fires events valid for the current state
                warn!(state = ?self.state, event = ?event, "Ignoring invalid tool loop event");
            }
        }
    }
}

/// Runs the reasoning service against an ordered set of tools
pub struct ToolCallLoop {
    service: Arc<dyn ReasoningService>,
    registry: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl ToolCallLoop {
    /// Create a new tool loop
    pub fn new(
        service: Arc<dyn ReasoningService>,
        registry: Arc<ToolRegistry>,
        config: LoopConfig,
    ) -> Self {
        Self {
            service,
            registry,
            config,
        }
    }

    /// Create a builder
    pub fn builder() -> ToolCallLoopBuilder {
        ToolCallLoopBuilder::new()
    }

    /// Current configuration
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Tool specs in registry (preference) order
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry
            .list_tools()
            .iter()
            .map(|tool| ToolSpec::new(tool.name(), tool.description(), tool.input_schema()))
            .collect()
    }

    /// Run the loop starting from a single user prompt
    pub async fn run(&self, prompt: impl Into<String>) -> LoopOutcome {
        self.run_conversation(vec![Message::user(prompt)]).await
    }

    /// Run the loop on an existing conversation
    pub async fn run_conversation(&self, initial: Vec<Message>) -> LoopOutcome {
        let mut conversation = initial;
        let mut run = Run::new();
        let mut log = ToolCallLog::with_capacity(self.config.max_tool_calls());
        let mut round_trips = 0;
        let mut reasoning_calls = 0;
        let tools = self.tool_specs();

        let termination = loop {
            reasoning_calls += 1;
            info!(
                round_trip = round_trips + 1,
                max_round_trips = self.config.max_round_trips,
                tool_count = tools.len(),
                "Tool loop thinking"
            );

            let response = match self.think(&conversation, &tools).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Reasoning service failed, ending tool loop");
                    run.fire(LoopEvent::ServiceFailed);
                    break LoopTermination::ReasoningFailed(e.to_string());
                }
            };

            let calls = response.message.tool_calls();
            conversation.push(response.message.clone());

            if calls.is_empty() {
                run.fire(LoopEvent::FinalAnswer);
                let text = response.message.text().unwrap_or_default();
                info!(
                    round_trips,
                    answer_length = text.len(),
                    "Tool loop answered"
                );
                break LoopTermination::Answered(text);
            }

            run.fire(LoopEvent::ToolCallsRequested);
            if round_trips >= self.config.max_round_trips {
                warn!(
                    max_round_trips = self.config.max_round_trips,
                    pending_calls = calls.len(),
                    "Tool loop bound reached"
                );
                run.fire(LoopEvent::BudgetExhausted);
                break LoopTermination::BoundExceeded;
            }

            run.fire(LoopEvent::BudgetAvailable);
            round_trips += 1;
            let observations = self.invoke(calls, round_trips, &mut log).await;
            conversation.push(Message::tool_results(observations));
            run.fire(LoopEvent::ObservationsRecorded);
        };

        LoopOutcome {
            termination,
            records: log.into_records(),
            round_trips,
            reasoning_calls,
            trace: run.trace,
            max_round_trips: self.config.max_round_trips,
        }
    }

    /// One reasoning call under the reasoning deadline
    async fn think(&self, conversation: &[Message], tools: &[ToolSpec]) -> Result<CompletionResponse> {
        let mut builder = CompletionRequest::builder(&self.config.model)
            .messages(conversation.to_vec())
            .max_tokens(self.config.max_tokens)
            .tools(tools.to_vec());
        if let Some(system) = &self.config.system_prompt {
            builder = builder.system(system.clone());
        }
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }

        let response = tokio::time::timeout(
            self.config.reasoning_timeout,
            self.service.complete(builder.build()),
        )
        .await
        .map_err(|_| Error::timeout("reasoning call", self.config.reasoning_timeout))??;

        debug!(
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Reasoning response received"
        );
        Ok(response)
    }

    /// Execute the requested calls and build one observation per call
    async fn invoke(
        &self,
        calls: Vec<ToolCall>,
        round_trip: usize,
        log: &mut ToolCallLog,
    ) -> Vec<ContentBlock> {
        let cap = self.config.max_calls_per_round;
        info!(
            requested = calls.len(),
            executed = calls.len().min(cap),
            round_trip,
            "Invoking tools"
        );

        let (run_now, skipped) = calls.split_at(calls.len().min(cap));
        let outcomes = join_all(run_now.iter().map(|call| self.invoke_one(call))).await;

        let mut observations = Vec::with_capacity(calls.len());
        for (call, outcome) in run_now.iter().zip(outcomes) {
            let observation = match &outcome {
                ToolOutcome::Success { result } => {
                    ContentBlock::tool_result(&call.id, result.to_string())
                }
                ToolOutcome::Failure { error } => {
                    ContentBlock::tool_error(&call.id, format!("Error: {error}"))
                }
            };
            if log
                .append(&call.name, call.input.clone(), outcome, round_trip)
                .is_none()
            {
                warn!(tool_name = %call.name, "Tool call log is full, record dropped");
            }
            observations.push(observation);
        }

        for call in skipped {
            warn!(tool_name = %call.name, cap, "Skipping tool call beyond per-round cap");
            observations.push(ContentBlock::tool_error(
                &call.id,
                format!("Error: not executed, at most {cap} tool calls are allowed per turn"),
            ));
        }

        observations
    }

    async fn invoke_one(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool_name = %call.name, "Reasoning service requested an unknown tool");
            return ToolOutcome::Failure {
                error: format!(
                    "Unknown tool '{}'. Available tools: {}",
                    call.name,
                    self.registry.names().join(", ")
                ),
            };
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(self.config.tool_timeout, tool.execute(call.input.clone()))
            .await
            .unwrap_or_else(|_| {
                Err(Error::timeout(
                    format!("tool '{}'", call.name),
                    self.config.tool_timeout,
                ))
            });
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                info!(tool_name = %call.name, duration_ms, "Tool call succeeded");
                ToolOutcome::Success { result }
            }
            Err(e) => {
                warn!(tool_name = %call.name, duration_ms, error = %e, "Tool call failed");
                ToolOutcome::Failure {
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Builder for ToolCallLoop
pub struct ToolCallLoopBuilder {
    service: Option<Arc<dyn ReasoningService>>,
    registry: Arc<ToolRegistry>,
    config: LoopConfig,
}

impl ToolCallLoopBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            service: None,
            registry: Arc::new(ToolRegistry::new()),
            config: LoopConfig::default(),
        }
    }

    /// Set the reasoning service
    pub fn service(mut self, service: Arc<dyn ReasoningService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Set the tool registry
    pub fn registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the round-trip bound
    pub fn max_round_trips(mut self, max: usize) -> Self {
        self.config.max_round_trips = max;
        self
    }

    /// Set the model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the system prompt
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set the per-tool deadline
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    /// Set the per-reasoning-call deadline
    pub fn reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.config.reasoning_timeout = timeout;
        self
    }

    /// Build the loop
    pub fn build(self) -> Result<ToolCallLoop> {
        let service = self
            .service
            .ok_or_else(|| Error::InvalidInput("Reasoning service not set".to_string()))?;
        if self.config.max_round_trips == 0 {
            return Err(Error::InvalidInput(
                "max_round_trips must be at least 1".to_string(),
            ));
        }
        if self.config.max_calls_per_round == 0 {
            return Err(Error::InvalidInput(
                "max_calls_per_round must be at least 1".to_string(),
            ));
        }

        Ok(ToolCallLoop::new(service, self.registry, self.config))
    }
}

impl Default for ToolCallLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
