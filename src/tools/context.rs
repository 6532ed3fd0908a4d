//! Execution context handed to capability bodies
//!
//! Supplies the conversation id, a correlation id for interactive
//! operations, the granted permission set, and a handle back to the event
//! dispatcher so a capability can publish progress events itself.
//! Host-specific surfaces (file I/O, terminal, diagnostics) stay outside the
//! core: embedders capture those in the handlers they register.

use std::collections::HashSet;
use std::sync::Arc;

use crate::events::{Event, EventDispatcher, EventPayload, EventType};
use crate::tools::types::Permission;

/// Context supplied to every tool execution
#[derive(Clone)]
pub struct ExecutionContext {
    /// Conversation the execution belongs to
    pub conversation_id: String,
    /// Correlation id for interactive operations started by this execution
    pub correlation_id: String,
    /// Dispatcher handle for publishing progress events
    pub dispatcher: Arc<EventDispatcher>,
    /// Permissions granted to this execution
    pub granted_permissions: HashSet<Permission>,
}

impl ExecutionContext {
    /// Create a context with a fresh correlation id
    pub fn new(
        conversation_id: impl Into<String>,
        dispatcher: Arc<EventDispatcher>,
        granted_permissions: HashSet<Permission>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            correlation_id: uuid::Uuid::new_v4().to_string(),
            dispatcher,
            granted_permissions,
        }
    }

    /// Whether a single permission is granted
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.granted_permissions.contains(&permission)
    }

    /// Required permissions not covered by the granted set
    pub fn missing_permissions(&self, required: &HashSet<Permission>) -> Vec<Permission> {
        let mut missing: Vec<Permission> = required
            .difference(&self.granted_permissions)
            .copied()
            .collect();
        missing.sort_by_key(|p| p.to_string());
        missing
    }

    /// Publish an event stamped with this context's conversation and
    /// correlation ids
    pub fn publish(&self, kind: EventType, data: serde_json::Value) -> Event {
        self.dispatcher.dispatch(
            kind,
            EventPayload::new(data)
                .for_conversation(&self.conversation_id)
                .with_correlation(&self.correlation_id),
        )
    }
}
