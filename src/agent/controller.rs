//! Reasoning-action loop controller - the orchestration kernel
//!
//! Drives bounded reason → decide → act iterations against the tool
//! registry, updates conversation state, and pauses explicitly on
//! interactive capabilities. The loop always leaves the state terminal:
//! either a final answer was produced (`Completed`) or the run carries an
//! explanatory error (`Failed`). Terminal events are published by the
//! engine, after the strategy returns.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::json;

use crate::agent::interaction::InteractionBroker;
use crate::agent::reasoning::{ReasoningService, ReasoningStep};
use crate::agent::RunStrategy;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{EntryStatus, HistoryEntry, Phase};
use crate::events::{EventDispatcher, EventPayload, EventType};
use crate::memory::{MemoryItem, MemoryKind, MemoryManager};
use crate::state::conversation::ConversationState;
use crate::tools::builtin::RESPOND_TOOL;
use crate::tools::context::ExecutionContext;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{Permission, ToolResult};

/// Longest output preview carried in history metadata and memory items
const OUTPUT_PREVIEW_CHARS: usize = 200;

/// Permission set shared between the engine and its strategies
pub type SharedPermissions = Arc<RwLock<HashSet<Permission>>>;

/// The iterative reasoning-action strategy
pub struct LoopController {
    config: Config,
    registry: Arc<ToolRegistry>,
    memory: Arc<MemoryManager>,
    dispatcher: Arc<EventDispatcher>,
    reasoning: Arc<dyn ReasoningService>,
    interactions: Arc<InteractionBroker>,
    permissions: SharedPermissions,
}

impl LoopController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: Arc<ToolRegistry>,
        memory: Arc<MemoryManager>,
        dispatcher: Arc<EventDispatcher>,
        reasoning: Arc<dyn ReasoningService>,
        interactions: Arc<InteractionBroker>,
        permissions: SharedPermissions,
    ) -> Self {
        Self {
            config,
            registry,
            memory,
            dispatcher,
            reasoning,
            interactions,
            permissions,
        }
    }

    /// Call the reasoning service with a bounded history window; timeouts
    /// and call errors degrade into error-carrying steps
    async fn reason(&self, state: &ConversationState) -> ReasoningStep {
        let tools = self.registry.descriptors();
        let digest = self
            .memory
            .summary(&state.id, &state.objective)
            .await
            .unwrap_or_default();
        let recent = state.recent_history(self.config.agent.history_window);

        let call = self
            .reasoning
            .generate_reasoning(state, &tools, recent, &digest);
        match tokio::time::timeout(self.config.reasoning_timeout(), call).await {
            Ok(Ok(step)) => step,
            Ok(Err(e)) => ReasoningStep {
                error: Some(e.to_string()),
                ..ReasoningStep::default()
            },
            Err(_) => ReasoningStep {
                error: Some(format!(
                    "reasoning call timed out after {}s",
                    self.config.timeouts.reasoning_secs
                )),
                ..ReasoningStep::default()
            },
        }
    }

    /// Execute the selected capability and handle its outcome; returns false
    /// when the run reached a terminal state
    async fn act(
        &self,
        state: &mut ConversationState,
        iteration: u32,
        tool_name: &str,
        params: serde_json::Value,
    ) -> Result<bool> {
        let granted = self
            .permissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let ctx = ExecutionContext::new(&state.id, Arc::clone(&self.dispatcher), granted);

        // Park a continuation up front so an answer cannot race the pause.
        let receiver = self.interactions.register(&ctx.correlation_id, &state.id);
        let correlation_id = ctx.correlation_id.clone();

        let result = self.registry.execute(tool_name, params.clone(), ctx).await;
        state.last_action = Some(result.clone());
        self.record_action(state, iteration, tool_name, &params, &result);

        self.memory.remember_short(
            &state.id,
            MemoryItem::new(
                MemoryKind::ToolResult,
                format!("{}: {}", tool_name, preview(&result.output)),
                if result.success { 0.6 } else { 0.4 },
            ),
        );

        if tool_name == RESPOND_TOOL {
            self.interactions.cancel(&correlation_id);
            if result.success {
                state.complete(Some(result.output));
            } else {
                state.fail(format!("final response delivery failed: {}", result.output));
            }
            return Ok(false);
        }

        if result.denied {
            self.interactions.cancel(&correlation_id);
            state.record(
                HistoryEntry::new(
                    Phase::SystemMessage,
                    iteration,
                    format!("Run aborted at the authorization boundary by '{}'", tool_name),
                )
                .with_status(EntryStatus::Error),
            );
            state.fail(result.output);
            return Ok(false);
        }

        if result.is_pending() {
            return self.pause(state, iteration, receiver).await;
        }
        self.interactions.cancel(&correlation_id);

        if result.success {
            state.record(
                HistoryEntry::new(
                    Phase::ToolOutputAnalysis,
                    iteration,
                    format!("{} produced: {}", tool_name, preview(&result.output)),
                )
                .with_status(EntryStatus::Success),
            );
        } else {
            // Recoverable by design: the failure is fed back into the next
            // reasoning step as context.
            state.note_error(result.output.clone());
            let reflection = format!(
                "Tool '{}' failed ({}); reconsidering the approach",
                tool_name,
                preview(&result.output)
            );
            state.last_reflection = Some(reflection.clone());
            state.record(
                HistoryEntry::new(Phase::Reflection, iteration, reflection)
                    .with_status(EntryStatus::Error),
            );
        }
        Ok(true)
    }

    /// Wait, bounded, for the user's answer to a pending interactive
    /// operation; returns false when the run became terminal
    async fn pause(
        &self,
        state: &mut ConversationState,
        iteration: u32,
        receiver: tokio::sync::oneshot::Receiver<String>,
    ) -> Result<bool> {
        tracing::debug!(conversation = %state.id, "run paused for user input");
        match tokio::time::timeout(self.config.interaction_timeout(), receiver).await {
            Ok(Ok(answer)) => {
                state.record(
                    HistoryEntry::new(Phase::UserInput, iteration, answer.clone())
                        .with_status(EntryStatus::Success),
                );
                self.memory.remember_short(
                    &state.id,
                    MemoryItem::new(MemoryKind::Context, format!("user answered: {}", answer), 0.7),
                );
                Ok(true)
            }
            Ok(Err(_)) => {
                state.fail("interactive operation was cancelled before an answer arrived");
                Ok(false)
            }
            Err(_) => {
                self.dispatcher.dispatch(
                    EventType::SystemWarning,
                    EventPayload::new(json!({"reason": "user input wait timed out"}))
                        .for_conversation(&state.id),
                );
                state.fail(format!(
                    "timed out after {}s waiting for user input",
                    self.config.timeouts.interaction_secs
                ));
                Ok(false)
            }
        }
    }

    fn record_action(
        &self,
        state: &mut ConversationState,
        iteration: u32,
        tool_name: &str,
        params: &serde_json::Value,
        result: &ToolResult,
    ) {
        let execution = json!({
            "tool": tool_name,
            "params": params,
            "success": result.success,
            "denied": result.denied,
            "duration_ms": result.duration_ms,
            "output": preview(&result.output),
        });
        let mut entry = HistoryEntry::new(
            Phase::Action,
            iteration,
            format!("Executed '{}'", tool_name),
        )
        .with_metadata(json!({ "execution": execution }));
        entry = if result.success {
            entry.with_status(EntryStatus::Success)
        } else {
            entry.with_error(result.output.clone())
        };
        state.record(entry);
    }

    /// One extra reasoning-service call in "produce final answer" mode
    async fn generate_final_response(&self, state: &mut ConversationState) {
        let call = self.reasoning.generate_final_response(state);
        match tokio::time::timeout(self.config.reasoning_timeout(), call).await {
            Ok(Ok(response)) => {
                state.record(
                    HistoryEntry::new(
                        Phase::ResponseGeneration,
                        state.iteration,
                        preview(&response).to_string(),
                    )
                    .with_status(EntryStatus::Success),
                );
                state.complete(Some(response));
            }
            Ok(Err(e)) => {
                state.record(
                    HistoryEntry::new(Phase::ResponseGeneration, state.iteration, "")
                        .with_error(e.to_string()),
                );
                state.fail(format!("final response generation failed: {}", e));
            }
            Err(_) => {
                state.fail(format!(
                    "final response generation timed out after {}s",
                    self.config.timeouts.reasoning_secs
                ));
            }
        }
    }
}

#[async_trait]
impl RunStrategy for LoopController {
    async fn run(&self, state: &mut ConversationState) -> Result<()> {
        loop {
            if !state.can_iterate() {
                if state.status.is_terminal() {
                    return Ok(());
                }
                // Exhaustion never ends a run silently: force a final answer.
                state.record(
                    HistoryEntry::new(
                        Phase::SystemMessage,
                        state.iteration,
                        format!("Max iterations ({}) reached", state.max_iterations),
                    )
                    .with_status(EntryStatus::Success),
                );
                self.dispatcher.dispatch(
                    EventType::SystemWarning,
                    EventPayload::new(json!({"reason": "max iterations reached"}))
                        .for_conversation(&state.id),
                );
                break;
            }

            let iteration = state.begin_iteration();
            let step = self.reason(state).await;
            state.last_reasoning = Some(step.clone());

            let mut entry = HistoryEntry::new(Phase::Reasoning, iteration, step.thought.clone());
            entry = match &step.error {
                Some(error) => entry.with_error(error.clone()),
                None => entry.with_status(EntryStatus::Success),
            };
            state.record(entry);
            self.dispatcher.dispatch(
                EventType::ReasoningGenerated,
                EventPayload::new(json!({
                    "thought": preview(&step.thought),
                    "tool": step.tool,
                    "iteration": iteration,
                }))
                .for_conversation(&state.id),
            );

            let Some(tool_name) = step.tool else {
                if let Some(error) = step.error {
                    // No capability and no valid thought: the run fails.
                    state.fail(format!("reasoning produced no usable output: {}", error));
                    return Ok(());
                }
                if step.thought.trim().is_empty() {
                    // Nothing actionable this round; note it and keep going
                    // under the iteration bound.
                    state.record(
                        HistoryEntry::new(
                            Phase::SystemMessage,
                            iteration,
                            "Reasoning selected no capability and offered no conclusion",
                        )
                        .with_status(EntryStatus::Skipped),
                    );
                    continue;
                }
                // A concluding thought with no capability means ready to
                // answer.
                break;
            };

            let params = step.tool_input.unwrap_or_else(|| json!({}));
            if !self.act(state, iteration, &tool_name, params).await? {
                return Ok(());
            }
        }

        if state.final_output.is_none() && !state.status.is_terminal() {
            self.generate_final_response(state).await;
        }
        Ok(())
    }
}

/// Bounded preview of tool or model output
fn preview(text: &str) -> String {
    if text.chars().count() <= OUTPUT_PREVIEW_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_output() {
        let long = "x".repeat(500);
        let shown = preview(&long);
        assert!(shown.ends_with("..."));
        assert_eq!(shown.chars().count(), OUTPUT_PREVIEW_CHARS + 3);

        assert_eq!(preview("short"), "short");
    }
}
