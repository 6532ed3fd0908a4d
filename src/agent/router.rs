//! Request routing - direct dispatch, plan execution, or the full loop
//!
//! Not every request deserves the iterative loop. The router classifies the
//! incoming message first: an explicit slash command maps straight onto one
//! capability, a planner may lay out a short fixed sequence, and everything
//! else falls through to the reasoning loop. Routing is a fast path, never a
//! different contract: a routed run updates the same conversation state,
//! publishes the same events, and pauses on interactive capabilities the
//! same way a looped one does.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent::controller::SharedPermissions;
use crate::agent::interaction::InteractionBroker;
use crate::agent::reasoning::ReasoningService;
use crate::agent::RunStrategy;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::{EntryStatus, HistoryEntry, Phase};
use crate::events::EventDispatcher;
use crate::state::conversation::ConversationState;
use crate::tools::context::ExecutionContext;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{ToolDescriptor, ToolResult};

/// Where a request should be handled
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Dispatch one capability directly, skipping reasoning
    Direct { tool: String, params: Value },
    /// Hand the request to the planner (or the loop if no plan emerges)
    Plan,
}

/// Classifies an incoming message before any reasoning happens
pub trait RequestClassifier: Send + Sync {
    fn classify(&self, message: &str, registry: &ToolRegistry) -> RouteDecision;
}

/// Slash-command classifier: `/toolName {json params}` dispatches directly
/// when the named capability exists; anything else routes to planning
#[derive(Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl RequestClassifier for HeuristicClassifier {
    fn classify(&self, message: &str, registry: &ToolRegistry) -> RouteDecision {
        let trimmed = message.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return RouteDecision::Plan;
        };

        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        if name.is_empty() || !registry.contains(name) {
            return RouteDecision::Plan;
        }

        let params = if rest.is_empty() {
            json!({})
        } else {
            match serde_json::from_str(rest) {
                Ok(value) => value,
                // Unparseable arguments are not a dispatchable command.
                Err(_) => return RouteDecision::Plan,
            }
        };

        RouteDecision::Direct {
            tool: name.to_string(),
            params,
        }
    }
}

/// One step of a fixed plan
#[derive(Debug, Clone)]
pub struct PlanStep {
    /// Capability to execute
    pub tool: String,
    /// Input for the capability
    pub params: Value,
    /// What this step accomplishes
    pub description: String,
    /// Index of an alternative step to try once if this one fails
    pub fallback: Option<usize>,
    /// Whether the plan fails when this step (and its fallback) fail
    pub required: bool,
}

impl PlanStep {
    pub fn new(tool: impl Into<String>, params: Value, description: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params,
            description: description.into(),
            fallback: None,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_fallback(mut self, step_index: usize) -> Self {
        self.fallback = Some(step_index);
        self
    }
}

/// Produces a fixed capability sequence for a request, when one exists
#[async_trait]
pub trait Planner: Send + Sync {
    /// An empty plan means "no fixed sequence applies, use the loop"
    async fn plan(
        &self,
        state: &ConversationState,
        tools: &[ToolDescriptor],
    ) -> Result<Vec<PlanStep>>;
}

/// How one routed step left the run
enum StepOutcome {
    /// The run reached a terminal state inside the step (denial, interaction
    /// timeout, cancelled continuation)
    Terminal,
    /// The step finished; a pending interactive result has already been
    /// resolved into the user's answer
    Finished(ToolResult),
}

/// Strategy that tries direct dispatch, then a plan, then the loop
pub struct RoutedStrategy {
    config: Config,
    registry: Arc<ToolRegistry>,
    dispatcher: Arc<EventDispatcher>,
    reasoning: Arc<dyn ReasoningService>,
    interactions: Arc<InteractionBroker>,
    permissions: SharedPermissions,
    classifier: Box<dyn RequestClassifier>,
    planner: Option<Arc<dyn Planner>>,
    /// The loop strategy everything falls back to
    inner: Arc<dyn RunStrategy>,
}

impl RoutedStrategy {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: Arc<ToolRegistry>,
        dispatcher: Arc<EventDispatcher>,
        reasoning: Arc<dyn ReasoningService>,
        interactions: Arc<InteractionBroker>,
        permissions: SharedPermissions,
        classifier: Box<dyn RequestClassifier>,
        planner: Option<Arc<dyn Planner>>,
        inner: Arc<dyn RunStrategy>,
    ) -> Self {
        Self {
            config,
            registry,
            dispatcher,
            reasoning,
            interactions,
            permissions,
            classifier,
            planner,
            inner,
        }
    }

    /// Execute one capability, handling denial and interactive pauses; an
    /// interactive step blocks here until the user's answer arrives and
    /// finishes with that answer as its output
    async fn execute_step(
        &self,
        state: &mut ConversationState,
        tool: &str,
        params: Value,
    ) -> StepOutcome {
        let granted = self
            .permissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let ctx = ExecutionContext::new(&state.id, Arc::clone(&self.dispatcher), granted);

        // Park a continuation up front so an answer cannot race the pause.
        let receiver = self.interactions.register(&ctx.correlation_id, &state.id);
        let correlation_id = ctx.correlation_id.clone();

        let result = self.registry.execute(tool, params.clone(), ctx).await;
        state.last_action = Some(result.clone());

        let mut entry = HistoryEntry::new(
            Phase::Action,
            state.iteration,
            format!("Executed '{}'", tool),
        )
        .with_metadata(json!({
            "execution": {
                "tool": tool,
                "params": params,
                "success": result.success,
                "denied": result.denied,
                "duration_ms": result.duration_ms,
            }
        }));
        entry = if result.success {
            entry.with_status(EntryStatus::Success)
        } else {
            entry.with_error(result.output.clone())
        };
        state.record(entry);

        if result.denied {
            self.interactions.cancel(&correlation_id);
            state.fail(result.output);
            return StepOutcome::Terminal;
        }

        if result.is_pending() {
            tracing::debug!(conversation = %state.id, tool, "routed step paused for user input");
            return match tokio::time::timeout(self.config.interaction_timeout(), receiver).await {
                Ok(Ok(answer)) => {
                    state.record(
                        HistoryEntry::new(Phase::UserInput, state.iteration, answer.clone())
                            .with_status(EntryStatus::Success),
                    );
                    StepOutcome::Finished(ToolResult::success(tool, answer))
                }
                Ok(Err(_)) => {
                    state.fail("interactive operation was cancelled before an answer arrived");
                    StepOutcome::Terminal
                }
                Err(_) => {
                    state.fail(format!(
                        "timed out after {}s waiting for user input",
                        self.config.timeouts.interaction_secs
                    ));
                    StepOutcome::Terminal
                }
            };
        }
        self.interactions.cancel(&correlation_id);

        StepOutcome::Finished(result)
    }

    /// Run a direct dispatch; returns false when the result should fall
    /// through to planning instead
    async fn run_direct(
        &self,
        state: &mut ConversationState,
        tool: &str,
        params: Value,
    ) -> Result<bool> {
        state.begin_iteration();
        let result = match self.execute_step(state, tool, params).await {
            StepOutcome::Terminal => return Ok(true),
            StepOutcome::Finished(result) => result,
        };

        if result.success {
            state.complete(Some(result.output));
            return Ok(true);
        }

        // A failed fast path is not a failed run; reconsider with a plan.
        state.note_error(result.output);
        state.record(
            HistoryEntry::new(
                Phase::SystemMessage,
                state.iteration,
                format!("Direct dispatch of '{}' failed; replanning", tool),
            )
            .with_status(EntryStatus::Skipped),
        );
        Ok(false)
    }

    /// Execute a fixed plan sequentially with one-hop fallbacks
    async fn run_plan(&self, state: &mut ConversationState, steps: Vec<PlanStep>) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            if !state.can_iterate() {
                state.fail(format!(
                    "plan exceeded the iteration bound at step {} of {}",
                    index + 1,
                    steps.len()
                ));
                return Ok(());
            }
            state.begin_iteration();

            let result = match self
                .execute_step(state, &step.tool, step.params.clone())
                .await
            {
                StepOutcome::Terminal => return Ok(()),
                StepOutcome::Finished(result) => result,
            };
            if result.success {
                continue;
            }

            // One hop only: a fallback's own fallback is never followed.
            let recovered = match step.fallback.and_then(|i| steps.get(i)) {
                Some(alternative)
                    if alternative.tool != step.tool || alternative.params != step.params =>
                {
                    match self
                        .execute_step(state, &alternative.tool, alternative.params.clone())
                        .await
                    {
                        StepOutcome::Terminal => return Ok(()),
                        StepOutcome::Finished(retry) => retry.success,
                    }
                }
                _ => false,
            };

            if recovered {
                continue;
            }
            if step.required {
                state.fail(format!(
                    "required plan step '{}' failed: {}",
                    step.tool, result.output
                ));
                return Ok(());
            }
            state.record(
                HistoryEntry::new(
                    Phase::SystemMessage,
                    state.iteration,
                    format!("Optional plan step '{}' skipped after failure", step.tool),
                )
                .with_status(EntryStatus::Skipped),
            );
        }

        match tokio::time::timeout(
            self.config.reasoning_timeout(),
            self.reasoning.generate_final_response(state),
        )
        .await
        {
            Ok(Ok(response)) => {
                state.record(
                    HistoryEntry::new(Phase::ResponseGeneration, state.iteration, response.clone())
                        .with_status(EntryStatus::Success),
                );
                state.complete(Some(response));
            }
            Ok(Err(e)) => state.fail(format!("final response generation failed: {}", e)),
            Err(_) => state.fail(format!(
                "final response generation timed out after {}s",
                self.config.timeouts.reasoning_secs
            )),
        }
        Ok(())
    }
}

#[async_trait]
impl RunStrategy for RoutedStrategy {
    async fn run(&self, state: &mut ConversationState) -> Result<()> {
        let decision = self
            .classifier
            .classify(&state.original_message, &self.registry);
        tracing::debug!(conversation = %state.id, ?decision, "request routed");

        if let RouteDecision::Direct { tool, params } = decision {
            if self.run_direct(state, &tool, params).await? {
                return Ok(());
            }
        }

        if let Some(ref planner) = self.planner {
            let steps = planner.plan(state, &self.registry.descriptors()).await?;
            if !steps.is_empty() {
                state.record(
                    HistoryEntry::new(
                        Phase::SystemMessage,
                        state.iteration,
                        steps
                            .iter()
                            .enumerate()
                            .map(|(i, s)| format!("{}. {} ({})", i + 1, s.description, s.tool))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    )
                    .with_status(EntryStatus::Success),
                );
                return self.run_plan(state, steps).await;
            }
        }

        self.inner.run(state).await
    }
}
