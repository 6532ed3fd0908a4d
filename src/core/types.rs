//! Shared types used across Axon modules
//!
//! Contains the loop phase taxonomy, history entries, and run status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which stage of the loop produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    UserInput,
    Reasoning,
    Action,
    Reflection,
    Correction,
    ResponseGeneration,
    SystemMessage,
    ToolOutputAnalysis,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Phase::UserInput => "userInput",
            Phase::Reasoning => "reasoning",
            Phase::Action => "action",
            Phase::Reflection => "reflection",
            Phase::Correction => "correction",
            Phase::ResponseGeneration => "responseGeneration",
            Phase::SystemMessage => "systemMessage",
            Phase::ToolOutputAnalysis => "toolOutputAnalysis",
        };
        write!(f, "{}", tag)
    }
}

/// Outcome marker on a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Success,
    Error,
    Skipped,
}

/// Terminal status of a conversation run
///
/// `Completed` and `Failed` are one-way: once set they never change for
/// that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    /// Whether the run has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Append-only audit log line for a conversation
///
/// Entries are never mutated or removed after insertion: the log doubles as
/// prompting context and as the post-hoc trace of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Stage of the loop that produced this entry
    pub phase: Phase,
    /// Iteration number the entry belongs to (0 before the loop starts)
    pub iteration: u32,
    /// Server-assigned insertion time
    pub timestamp: DateTime<Utc>,
    /// Free-form content
    pub content: String,
    /// Outcome marker, if the phase has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    /// Error text for failed phases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Metadata bag; may carry a nested tool-execution record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl HistoryEntry {
    /// Create a new entry stamped with the current time
    pub fn new(phase: Phase, iteration: u32, content: impl Into<String>) -> Self {
        Self {
            phase,
            iteration,
            timestamp: Utc::now(),
            content: content.into(),
            status: None,
            error: None,
            metadata: None,
        }
    }

    /// Attach an outcome marker
    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach error text (also marks the entry as an error)
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.status = Some(EntryStatus::Error);
        self.error = Some(error.into());
        self
    }

    /// Attach a metadata bag
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
