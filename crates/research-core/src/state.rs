//! Request-scoped shared state
//!
//! `SharedState` is the single place a research request accumulates its
//! results. Each analysis branch owns exactly one [`BranchSlot`]; the
//! orchestrator owns the remaining well-known keys. Branch tasks never touch
//! the state while running: they hand back their report and the orchestrator
//! writes the slot after the join, so writers never race on a key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::Ticker;

/// Well-known state keys
pub mod keys {
    /// Raw request text
    pub const REQUEST: &str = "request";
    /// Unique id of the request
    pub const REQUEST_ID: &str = "requestId";
    /// Validated ticker
    pub const TICKER: &str = "ticker";
    /// Fundamental branch slot
    pub const FUNDAMENTAL_ANALYSIS: &str = "fundamentalAnalysis";
    /// Technical branch slot
    pub const TECHNICAL_ANALYSIS: &str = "technicalAnalysis";
    /// News branch slot
    pub const NEWS_ANALYSIS: &str = "newsAnalysis";
    /// Synthesized final report
    pub const FINAL_REPORT: &str = "finalReport";
}

/// Identity of an analysis branch and the state slot it writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSlot {
    /// Financial statements and ratios
    Fundamental,
    /// Price action and indicators
    Technical,
    /// Recent news flow
    News,
}

impl BranchSlot {
    /// Every slot, in dispatch order
    pub const ALL: [BranchSlot; 3] = [Self::Fundamental, Self::Technical, Self::News];

    /// State key this slot is stored under
    pub fn key(self) -> &'static str {
        match self {
            Self::Fundamental => keys::FUNDAMENTAL_ANALYSIS,
            Self::Technical => keys::TECHNICAL_ANALYSIS,
            Self::News => keys::NEWS_ANALYSIS,
        }
    }

    /// Short lowercase name, used in logs
    pub fn name(self) -> &'static str {
        match self {
            Self::Fundamental => "fundamental",
            Self::Technical => "technical",
            Self::News => "news",
        }
    }
}

impl fmt::Display for BranchSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request-scoped key-value store for pipeline results
///
/// # Example
///
/// ```
/// use research_core::{BranchSlot, SharedState, Ticker};
///
/// let state = SharedState::new()
///     .with_request("analyze AAPL")
///     .with_ticker(&Ticker::parse("AAPL").unwrap());
///
/// assert_eq!(state.ticker(), Some("AAPL"));
/// assert_eq!(state.missing_slots(&BranchSlot::ALL).len(), 3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedState {
    data: HashMap<String, serde_json::Value>,
}

impl SharedState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    // =========== Builder Methods ===========

    /// Set the raw request text
    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.insert(keys::REQUEST, serde_json::json!(request.into()));
        self
    }

    /// Set the request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.insert(keys::REQUEST_ID, serde_json::json!(request_id.into()));
        self
    }

    /// Set the validated ticker
    pub fn with_ticker(mut self, ticker: &Ticker) -> Self {
        self.set_ticker(ticker);
        self
    }

    // =========== Common Accessors ===========

    /// Get the raw request text
    pub fn request(&self) -> Option<&str> {
        self.get(keys::REQUEST).and_then(|v| v.as_str())
    }

    /// Get the request id
    pub fn request_id(&self) -> Option<&str> {
        self.get(keys::REQUEST_ID).and_then(|v| v.as_str())
    }

    /// Get the validated ticker
    pub fn ticker(&self) -> Option<&str> {
        self.get(keys::TICKER).and_then(|v| v.as_str())
    }

    /// Set the validated ticker
    pub fn set_ticker(&mut self, ticker: &Ticker) {
        self.insert(keys::TICKER, serde_json::json!(ticker.as_str()));
    }

    // =========== Branch Slots ===========

    /// Write a branch report into its slot, replacing any previous value
    pub fn fill_slot<T: Serialize>(&mut self, slot: BranchSlot, report: &T) -> crate::Result<()> {
        tracing::debug!(slot = %slot, "Filling branch slot");
        self.insert_typed(slot.key(), report)
    }

    /// Read a branch report back out of its slot
    pub fn slot<T: for<'de> Deserialize<'de>>(&self, slot: BranchSlot) -> crate::Result<Option<T>> {
        self.get_typed(slot.key())
    }

    /// Whether the slot holds a value
    pub fn is_filled(&self, slot: BranchSlot) -> bool {
        self.contains_key(slot.key())
    }

    /// Slots from `expected` that are still empty
    pub fn missing_slots(&self, expected: &[BranchSlot]) -> Vec<BranchSlot> {
        expected
            .iter()
            .copied()
            .filter(|slot| !self.is_filled(*slot))
            .collect()
    }

    // =========== Generic Key-Value Operations ===========

    /// Insert a value into the state
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the state
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Insert a typed value into the state
    ///
    /// Serializes the value to JSON before storing.
    pub fn insert_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<()> {
        let json_value = serde_json::to_value(value).map_err(|e| {
            crate::Error::Generic(format!("Failed to serialize state value: {e}"))
        })?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Get a typed value from the state
    ///
    /// Deserializes the JSON value into the specified type.
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone()).map_err(|e| {
                    crate::Error::parse(key, format!("Failed to deserialize state value: {e}"))
                })?;
                Ok(Some(typed))
            }
        }
    }

    /// Check if a key exists in the state
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Get the number of entries in the state
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the state is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Merge another state into this one (other values override)
    ///
    /// Branch outputs are built as one-slot partial states, so merging them
    /// in any order yields the same result.
    pub fn merge(&mut self, other: SharedState) {
        self.data.extend(other.data);
    }

    /// Snapshot the whole state as a JSON object with sorted keys
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
