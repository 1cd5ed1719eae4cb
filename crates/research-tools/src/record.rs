//! Tool call records

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    /// The tool returned a payload
    Success {
        /// Returned payload
        result: Value,
    },
    /// The tool failed, timed out or did not exist
    Failure {
        /// Human-readable cause
        error: String,
    },
}

impl ToolOutcome {
    /// Whether the call succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// One entry of the tool call log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    /// Name the reasoning service asked for
    pub tool_name: String,
    /// Arguments it supplied
    pub arguments: Value,
    /// What happened
    pub outcome: ToolOutcome,
    /// Position in the log, starting at 0
    pub attempt_index: usize,
    /// Round trip (1-based) the call belonged to
    pub round_trip: usize,
}

/// Append-only, bounded log of tool calls
///
/// Capacity is fixed at construction. Once full, further appends are refused
/// and the caller is expected to stop issuing calls.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallLog {
    records: Vec<ToolCallRecord>,
    #[serde(skip)]
    capacity: usize,
}

impl ToolCallLog {
    /// Create an empty log holding at most `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, assigning its attempt index
    ///
    /// Returns `None` and leaves the log untouched when it is full.
    pub fn append(
        &mut self,
        tool_name: impl Into<String>,
        arguments: Value,
        outcome: ToolOutcome,
        round_trip: usize,
    ) -> Option<&ToolCallRecord> {
        if self.is_full() {
            return None;
        }
        self.records.push(ToolCallRecord {
            tool_name: tool_name.into(),
            arguments,
            outcome,
            attempt_index: self.records.len(),
            round_trip,
        });
        self.records.last()
    }

    /// Records in append order
    pub fn records(&self) -> &[ToolCallRecord] {
        &self.records
    }

    /// Consume the log into its records
    pub fn into_records(self) -> Vec<ToolCallRecord> {
        self.records
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no call was recorded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether further appends will be refused
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    /// Number of successful calls
    pub fn success_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome.is_success())
            .count()
    }
}
