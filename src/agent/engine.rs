//! Engine - the single entry point hosts embed
//!
//! Owns the registry, dispatcher, memory, state store, and interaction
//! broker, and delegates run execution to a pluggable strategy. The engine
//! enforces the run envelope: a `ConversationStarted` event at entry, exactly
//! one terminal event (`ResponseGenerated` on success or `SystemError` on
//! failure), and a closing `ConversationEnded` carrying the status and
//! duration, no matter how the strategy returned.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde_json::json;

use crate::agent::controller::{LoopController, SharedPermissions};
use crate::agent::interaction::InteractionBroker;
use crate::agent::reasoning::ReasoningService;
use crate::agent::router::{Planner, RequestClassifier, RoutedStrategy};
use crate::agent::RunStrategy;
use crate::core::config::Config;
use crate::core::error::{AxonError, Result};
use crate::core::types::{EntryStatus, HistoryEntry, Phase, RunStatus};
use crate::events::{EventDispatcher, EventPayload, EventType};
use crate::memory::{InMemoryKvStore, KvStore, MemoryManager};
use crate::state::StateStore;
use crate::tools::builtin::register_builtin_tools;
use crate::tools::registry::ToolRegistry;
use crate::tools::types::Permission;

/// Orchestration facade over the subsystems
pub struct Engine {
    config: Config,
    registry: Arc<ToolRegistry>,
    dispatcher: Arc<EventDispatcher>,
    memory: Arc<MemoryManager>,
    states: StateStore,
    interactions: Arc<InteractionBroker>,
    permissions: SharedPermissions,
    reasoning: Arc<dyn ReasoningService>,
    strategy: Arc<dyn RunStrategy>,
}

impl Engine {
    /// Build an engine with the in-memory long-term store
    pub fn new(config: Config, reasoning: Arc<dyn ReasoningService>) -> Result<Self> {
        Self::with_store(config, reasoning, Arc::new(InMemoryKvStore::new()))
    }

    /// Build an engine over a caller-supplied long-term store
    pub fn with_store(
        config: Config,
        reasoning: Arc<dyn ReasoningService>,
        store: Arc<dyn KvStore>,
    ) -> Result<Self> {
        let dispatcher = Arc::new(EventDispatcher::new(config.events.history_capacity));
        let registry = Arc::new(ToolRegistry::new(config.tool_timeout()));
        register_builtin_tools(&registry)?;

        let memory = Arc::new(
            MemoryManager::new(config.memory.clone(), store).with_dispatcher(Arc::clone(&dispatcher)),
        );
        let interactions = Arc::new(InteractionBroker::new());
        let permissions: SharedPermissions = Arc::new(RwLock::new(HashSet::new()));

        let strategy: Arc<dyn RunStrategy> = Arc::new(LoopController::new(
            config.clone(),
            Arc::clone(&registry),
            Arc::clone(&memory),
            Arc::clone(&dispatcher),
            Arc::clone(&reasoning),
            Arc::clone(&interactions),
            Arc::clone(&permissions),
        ));

        Ok(Self {
            config,
            registry,
            dispatcher,
            memory,
            states: StateStore::new(),
            interactions,
            permissions,
            reasoning,
            strategy,
        })
    }

    /// Route requests through a classifier and optional planner before the
    /// loop; the existing strategy becomes the fallback
    pub fn with_router(
        mut self,
        classifier: Box<dyn RequestClassifier>,
        planner: Option<Arc<dyn Planner>>,
    ) -> Self {
        self.strategy = Arc::new(RoutedStrategy::new(
            self.config.clone(),
            Arc::clone(&self.registry),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.reasoning),
            Arc::clone(&self.interactions),
            Arc::clone(&self.permissions),
            classifier,
            planner,
            Arc::clone(&self.strategy),
        ));
        self
    }

    /// Process one user message for a conversation; returns the final output
    ///
    /// A second call for the same conversation while a run is active is
    /// rejected with `ConversationBusy` rather than queued.
    pub async fn process(&self, conversation_id: &str, message: &str) -> Result<String> {
        let shared = self.states.get_or_create(
            conversation_id,
            message,
            self.config.agent.max_iterations,
        );
        let mut state = self.states.try_begin_run(&shared, conversation_id)?;
        state.begin_run(message);
        state.record(
            HistoryEntry::new(Phase::UserInput, 0, message).with_status(EntryStatus::Success),
        );

        let started = Instant::now();
        self.dispatcher.dispatch(
            EventType::ConversationStarted,
            EventPayload::new(json!({"message": message})).for_conversation(conversation_id),
        );
        tracing::info!(conversation = %conversation_id, "run started");

        if let Err(error) = self.strategy.run(&mut state).await {
            tracing::error!(conversation = %conversation_id, %error, "strategy aborted");
            state.fail(error.to_string());
        }
        // The strategy contract is "leave the state terminal"; hold the line
        // here even if a strategy breaks it.
        if !state.status.is_terminal() {
            state.fail("run ended without reaching a terminal status");
        }

        match state.status {
            RunStatus::Completed => {
                let response = state.final_output.clone().unwrap_or_default();
                self.dispatcher.dispatch(
                    EventType::ResponseGenerated,
                    EventPayload::new(json!({"response": response, "final": true}))
                        .for_conversation(conversation_id),
                );
            }
            _ => {
                let error = state
                    .error
                    .clone()
                    .unwrap_or_else(|| "run failed".to_string());
                self.dispatcher.dispatch(
                    EventType::SystemError,
                    EventPayload::new(json!({"error": error})).for_conversation(conversation_id),
                );
            }
        }
        self.dispatcher.dispatch(
            EventType::ConversationEnded,
            EventPayload::new(json!({
                "status": state.status,
                "iterations": state.iteration,
                "duration_ms": started.elapsed().as_millis() as u64,
            }))
            .for_conversation(conversation_id),
        );
        tracing::info!(
            conversation = %conversation_id,
            status = ?state.status,
            iterations = state.iteration,
            "run finished"
        );

        match state.status {
            RunStatus::Completed => Ok(state.final_output.clone().unwrap_or_default()),
            _ => Err(AxonError::Other(
                state
                    .error
                    .clone()
                    .unwrap_or_else(|| "run failed".to_string()),
            )),
        }
    }

    /// Deliver the user's answer to a paused interactive operation
    ///
    /// Returns true when a run was actually waiting on this correlation id.
    pub fn resolve_interaction(&self, correlation_id: &str, answer: &str) -> bool {
        match self.interactions.resolve(correlation_id, answer) {
            Some(conversation_id) => {
                self.dispatcher.dispatch(
                    EventType::UserInputReceived,
                    EventPayload::new(json!({"answer": answer}))
                        .for_conversation(conversation_id)
                        .with_correlation(correlation_id),
                );
                true
            }
            None => false,
        }
    }

    /// Grant a permission for subsequent tool executions
    pub fn grant_permission(&self, permission: Permission) {
        let mut granted = self
            .permissions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        granted.insert(permission);
    }

    /// Revoke a previously granted permission
    pub fn revoke_permission(&self, permission: Permission) {
        let mut granted = self
            .permissions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        granted.remove(&permission);
    }

    /// Snapshot of the currently granted permissions
    pub fn granted_permissions(&self) -> HashSet<Permission> {
        self.permissions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Mark a conversation ended (completed unless already terminal)
    pub async fn end_conversation(&self, conversation_id: &str) -> Result<()> {
        self.states.end(conversation_id).await
    }

    /// Drop a conversation's state, short-term memory, and context
    pub fn clear_conversation(&self, conversation_id: &str) {
        self.states.clear(conversation_id);
        self.memory.clear_conversation(conversation_id);
    }

    /// The tool registry, for host-side capability registration
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The event dispatcher, for host-side subscriptions and history queries
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// The memory manager
    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// The conversation state store
    pub fn states(&self) -> &StateStore {
        &self.states
    }
}
