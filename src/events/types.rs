//! Event types for the dispatcher
//!
//! Events are immutable records from a closed enumeration. Every payload
//! carries an optional conversation id so consumers can filter to the
//! conversation they care about, and an optional correlation id threading
//! interactive operations to their eventual answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed enumeration of event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A conversation run has started
    ConversationStarted,
    /// The reasoning service produced a thought (and possibly a tool choice)
    ReasoningGenerated,
    /// A tool execution is about to run
    ToolExecutionStarted,
    /// A tool execution finished (success or failure)
    ToolExecutionCompleted,
    /// An interactive tool needs input from the user
    UserInputRequested,
    /// The user answered an interactive request
    UserInputReceived,
    /// Final response content is available
    ResponseGenerated,
    /// A recoverable problem worth surfacing
    SystemWarning,
    /// A terminal or unexpected failure
    SystemError,
    /// A long-term memory item was persisted
    MemoryStored,
    /// The run reached its terminal status
    ConversationEnded,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        write!(f, "{}", tag.trim_matches('"'))
    }
}

/// Payload attached to an event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    /// Conversation the event belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Correlation id for interactive operations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Type-specific data
    pub data: serde_json::Value,
}

impl EventPayload {
    /// Create a payload carrying only data
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            conversation_id: None,
            correlation_id: None,
            data,
        }
    }

    /// Attach the conversation id
    pub fn for_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Attach a correlation id
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// An immutable dispatched event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique id (caller may force one to correlate with an external op)
    pub id: String,
    /// Event type
    pub kind: EventType,
    /// Payload, stamped with the same timestamp as the event
    pub payload: EventPayload,
    /// Dispatcher-assigned timestamp
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Conversation id shortcut
    pub fn conversation_id(&self) -> Option<&str> {
        self.payload.conversation_id.as_deref()
    }

    /// Correlation id shortcut
    pub fn correlation_id(&self) -> Option<&str> {
        self.payload.correlation_id.as_deref()
    }
}

/// Filter for querying dispatcher history
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to these event types
    pub types: Option<Vec<EventType>>,
    /// Restrict to one conversation (system errors are always visible)
    pub conversation_id: Option<String>,
}

impl EventFilter {
    /// Match everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a set of types
    pub fn types(types: impl IntoIterator<Item = EventType>) -> Self {
        Self {
            types: Some(types.into_iter().collect()),
            conversation_id: None,
        }
    }

    /// Restrict to one conversation
    pub fn conversation(conversation_id: impl Into<String>) -> Self {
        Self {
            types: None,
            conversation_id: Some(conversation_id.into()),
        }
    }

    /// Whether an event passes this filter
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.types {
            if !types.contains(&event.kind) {
                return false;
            }
        }
        if let Some(ref conversation_id) = self.conversation_id {
            // System errors stay visible regardless of conversation scope.
            if event.kind != EventType::SystemError
                && event.conversation_id() != Some(conversation_id.as_str())
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventType, conversation_id: Option<&str>) -> Event {
        let mut payload = EventPayload::new(serde_json::json!({}));
        if let Some(id) = conversation_id {
            payload = payload.for_conversation(id);
        }
        Event {
            id: "ev-1".into(),
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_filter_by_type() {
        let filter = EventFilter::types([EventType::ResponseGenerated]);
        assert!(filter.matches(&event(EventType::ResponseGenerated, None)));
        assert!(!filter.matches(&event(EventType::SystemWarning, None)));
    }

    #[test]
    fn test_filter_by_conversation() {
        let filter = EventFilter::conversation("conv-1");
        assert!(filter.matches(&event(EventType::ResponseGenerated, Some("conv-1"))));
        assert!(!filter.matches(&event(EventType::ResponseGenerated, Some("conv-2"))));
        assert!(!filter.matches(&event(EventType::ResponseGenerated, None)));
    }

    #[test]
    fn test_system_errors_always_visible() {
        let filter = EventFilter::conversation("conv-1");
        assert!(filter.matches(&event(EventType::SystemError, Some("conv-2"))));
        assert!(filter.matches(&event(EventType::SystemError, None)));
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::UserInputRequested.to_string(), "user_input_requested");
    }
}
