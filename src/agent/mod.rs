//! Agent module - the orchestration layer
//!
//! The engine is the entry point; it delegates each run to a `RunStrategy`.
//! The loop controller is the default strategy, and the router wraps it with
//! direct-dispatch and plan-execution fast paths.

pub mod controller;
pub mod engine;
pub mod interaction;
pub mod reasoning;
pub mod router;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::state::conversation::ConversationState;

/// How a run is executed once the engine has acquired the conversation
///
/// A strategy must leave the state terminal: `Completed` with a final output
/// or `Failed` with an error. An `Err` return is reserved for infrastructure
/// failures the strategy could not record in the state itself.
#[async_trait]
pub trait RunStrategy: Send + Sync {
    async fn run(&self, state: &mut ConversationState) -> Result<()>;
}

pub use controller::LoopController;
pub use engine::Engine;
pub use interaction::InteractionBroker;
pub use reasoning::{ReasoningService, ReasoningStep, ScriptedReasoner};
pub use router::{
    HeuristicClassifier, Planner, PlanStep, RequestClassifier, RouteDecision, RoutedStrategy,
};
