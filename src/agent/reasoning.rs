//! Reasoning service contract
//!
//! The reasoning service is an external collaborator: the core never builds
//! model prompts or speaks a vendor wire protocol. It receives the current
//! state, the available capability descriptors, and a bounded window of
//! recent history, and returns a thought with an optional capability choice.
//! Malformed model output degrades into an error-carrying step rather than
//! an error return.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::core::types::HistoryEntry;
use crate::state::conversation::ConversationState;
use crate::tools::types::ToolDescriptor;

/// One reasoning result: a thought plus an optional capability selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// The model's thought (may be raw text when parsing failed)
    pub thought: String,
    /// Selected capability name, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Input for the selected capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    /// Parse or format error, if the service output was malformed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReasoningStep {
    /// A plain thought with no capability selection
    pub fn thought(text: impl Into<String>) -> Self {
        Self {
            thought: text.into(),
            ..Self::default()
        }
    }

    /// A thought that selects a capability
    pub fn action(
        text: impl Into<String>,
        tool: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            thought: text.into(),
            tool: Some(tool.into()),
            tool_input: Some(input),
            error: None,
        }
    }

    /// Parse raw service output; malformed text becomes an error-carrying
    /// step instead of a hard failure
    pub fn from_json_text(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => Self {
                thought: value
                    .get("thought")
                    .and_then(|t| t.as_str())
                    .unwrap_or_default()
                    .to_string(),
                tool: value
                    .get("tool")
                    .and_then(|t| t.as_str())
                    .map(|s| s.to_string()),
                tool_input: value.get("input").cloned().filter(|v| !v.is_null()),
                error: None,
            },
            Err(e) => Self {
                thought: text.trim().to_string(),
                tool: None,
                tool_input: None,
                error: Some(format!("unparseable reasoning output: {}", e)),
            },
        }
    }
}

/// External reasoning collaborator
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Produce the next reasoning step for a conversation
    async fn generate_reasoning(
        &self,
        state: &ConversationState,
        tools: &[ToolDescriptor],
        recent_history: &[HistoryEntry],
        memory_digest: &str,
    ) -> Result<ReasoningStep>;

    /// Produce the final answer once the loop decides it is done
    async fn generate_final_response(&self, state: &ConversationState) -> Result<String>;
}

/// Queue-backed reasoning service for tests and demos
///
/// Pops one pre-scripted step per reasoning call; once the queue is empty it
/// keeps returning a capability-less "ready to answer" step.
pub struct ScriptedReasoner {
    steps: Mutex<VecDeque<ReasoningStep>>,
    final_response: String,
}

impl ScriptedReasoner {
    /// Create with a canned final response
    pub fn new(final_response: impl Into<String>) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            final_response: final_response.into(),
        }
    }

    /// Queue the next step
    pub fn push_step(self, step: ReasoningStep) -> Self {
        self.steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
        self
    }

    /// Steps remaining in the queue
    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoner {
    async fn generate_reasoning(
        &self,
        _state: &ConversationState,
        _tools: &[ToolDescriptor],
        _recent_history: &[HistoryEntry],
        _memory_digest: &str,
    ) -> Result<ReasoningStep> {
        let next = self
            .steps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        Ok(next.unwrap_or_else(|| ReasoningStep::thought("I have what I need to answer.")))
    }

    async fn generate_final_response(&self, _state: &ConversationState) -> Result<String> {
        Ok(self.final_response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_text_well_formed() {
        let step = ReasoningStep::from_json_text(
            r#"{"thought": "need the file list", "tool": "listFiles", "input": {"path": "."}}"#,
        );
        assert_eq!(step.thought, "need the file list");
        assert_eq!(step.tool.as_deref(), Some("listFiles"));
        assert_eq!(step.tool_input, Some(json!({"path": "."})));
        assert!(step.error.is_none());
    }

    #[test]
    fn test_from_json_text_malformed_degrades() {
        let step = ReasoningStep::from_json_text("I think therefore I am {not json");
        assert!(step.error.is_some());
        assert!(step.tool.is_none());
        assert_eq!(step.thought, "I think therefore I am {not json");
    }

    #[test]
    fn test_from_json_text_null_input_is_dropped() {
        let step = ReasoningStep::from_json_text(r#"{"thought": "t", "tool": "x", "input": null}"#);
        assert!(step.tool_input.is_none());
    }

    #[tokio::test]
    async fn test_scripted_reasoner_pops_then_defaults() {
        let reasoner = ScriptedReasoner::new("all done")
            .push_step(ReasoningStep::action("run it", "echo", json!({"text": "hi"})));
        let state = ConversationState::new("conv-1", "x", 10);

        let first = reasoner
            .generate_reasoning(&state, &[], &[], "")
            .await
            .unwrap();
        assert_eq!(first.tool.as_deref(), Some("echo"));

        let second = reasoner
            .generate_reasoning(&state, &[], &[], "")
            .await
            .unwrap();
        assert!(second.tool.is_none());
        assert!(!second.thought.is_empty());

        assert_eq!(
            reasoner.generate_final_response(&state).await.unwrap(),
            "all done"
        );
    }
}
