//! Conversation state - the mutable per-conversation record
//!
//! One `ConversationState` exists per conversation id. The iteration counter
//! is monotonically non-decreasing within a run, the history log is
//! append-only, and the completion status is a one-way valve: once
//! `Completed` or `Failed`, it never changes for that run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::reasoning::ReasoningStep;
use crate::core::types::{HistoryEntry, RunStatus};
use crate::tools::types::ToolResult;

/// Mutable record of one conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    /// Conversation id
    pub id: String,
    /// Objective distilled from the user's request
    pub objective: String,
    /// The original user message that started the run
    pub original_message: String,
    /// Current iteration (0 before the loop starts)
    pub iteration: u32,
    /// Iteration ceiling for the loop
    pub max_iterations: u32,
    /// Run status; terminal values are final
    pub status: RunStatus,
    /// Most recent error text, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Most recent reasoning result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reasoning: Option<ReasoningStep>,
    /// Most recent action result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_action: Option<ToolResult>,
    /// Most recent reflection note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reflection: Option<String>,
    /// Most recent correction note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_correction: Option<String>,
    /// Append-only audit trail
    pub history: Vec<HistoryEntry>,
    /// Snapshot of project context, if the host supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_context: Option<serde_json::Value>,
    /// Snapshot of editor context, if the host supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_context: Option<serde_json::Value>,
    /// Final output of the run, once produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,
    /// When the conversation record was created
    pub created_at: DateTime<Utc>,
}

impl ConversationState {
    /// Create a fresh record for a conversation
    pub fn new(id: impl Into<String>, message: impl Into<String>, max_iterations: u32) -> Self {
        let message = message.into();
        Self {
            id: id.into(),
            objective: message.clone(),
            original_message: message,
            iteration: 0,
            max_iterations,
            status: RunStatus::InProgress,
            error: None,
            last_reasoning: None,
            last_action: None,
            last_reflection: None,
            last_correction: None,
            history: Vec::new(),
            project_context: None,
            editor_context: None,
            final_output: None,
            created_at: Utc::now(),
        }
    }

    /// Append a history entry (entries are never mutated or removed)
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// The last `window` history entries, oldest first
    pub fn recent_history(&self, window: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(window);
        &self.history[start..]
    }

    /// Whether the loop may start another iteration
    pub fn can_iterate(&self) -> bool {
        !self.status.is_terminal() && self.iteration < self.max_iterations
    }

    /// Start the next iteration and return its number
    pub fn begin_iteration(&mut self) -> u32 {
        self.iteration += 1;
        self.iteration
    }

    /// Mark the run completed; no-op once terminal
    pub fn complete(&mut self, final_output: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        if final_output.is_some() {
            self.final_output = final_output;
        }
        self.status = RunStatus::Completed;
    }

    /// Mark the run failed; no-op once terminal
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.error = Some(error.into());
        self.status = RunStatus::Failed;
    }

    /// Record a non-fatal error without terminating the run
    pub fn note_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Reset per-run fields so a new run can start on the same conversation
    pub fn begin_run(&mut self, message: impl Into<String>) {
        self.original_message = message.into();
        self.objective = self.original_message.clone();
        self.iteration = 0;
        self.status = RunStatus::InProgress;
        self.error = None;
        self.final_output = None;
        self.last_reasoning = None;
        self.last_action = None;
        self.last_reflection = None;
        self.last_correction = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Phase;

    #[test]
    fn test_new_state_is_in_progress_at_iteration_zero() {
        let state = ConversationState::new("conv-1", "list files", 10);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.status, RunStatus::InProgress);
        assert!(state.can_iterate());
    }

    #[test]
    fn test_iteration_bound() {
        let mut state = ConversationState::new("conv-1", "x", 2);
        assert_eq!(state.begin_iteration(), 1);
        assert!(state.can_iterate());
        assert_eq!(state.begin_iteration(), 2);
        assert!(!state.can_iterate());
    }

    #[test]
    fn test_terminal_status_is_one_way() {
        let mut state = ConversationState::new("conv-1", "x", 10);
        state.complete(Some("done".into()));
        assert_eq!(state.status, RunStatus::Completed);

        state.fail("too late");
        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!(state.final_output.as_deref(), Some("done"));

        let mut failed = ConversationState::new("conv-2", "x", 10);
        failed.fail("boom");
        failed.complete(Some("nope".into()));
        assert_eq!(failed.status, RunStatus::Failed);
        assert!(failed.final_output.is_none());
    }

    #[test]
    fn test_history_is_append_only_and_windowed() {
        let mut state = ConversationState::new("conv-1", "x", 10);
        for i in 0..8 {
            state.record(HistoryEntry::new(Phase::Reasoning, i, format!("thought {}", i)));
        }
        assert_eq!(state.history.len(), 8);

        let recent = state.recent_history(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "thought 5");
        assert_eq!(recent[2].content, "thought 7");

        // A window wider than the log returns everything.
        assert_eq!(state.recent_history(100).len(), 8);
    }

    #[test]
    fn test_begin_run_resets_run_fields_but_keeps_history() {
        let mut state = ConversationState::new("conv-1", "first", 10);
        state.record(HistoryEntry::new(Phase::UserInput, 0, "first"));
        state.begin_iteration();
        state.complete(Some("answer".into()));

        state.begin_run("second");
        assert_eq!(state.status, RunStatus::InProgress);
        assert_eq!(state.iteration, 0);
        assert_eq!(state.original_message, "second");
        assert!(state.final_output.is_none());
        assert_eq!(state.history.len(), 1);
    }
}
