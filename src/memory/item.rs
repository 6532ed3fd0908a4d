//! Memory items
//!
//! A `MemoryItem` is the unit both tiers trade in: opaque content plus a
//! kind and a relevance score in [0, 1] used for retention and retrieval
//! priority.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of knowledge a memory item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Conversation or task context
    Context,
    /// Knowledge about the codebase
    Codebase,
    /// Facts about the user
    User,
    /// Distilled tool output
    ToolResult,
    /// Saved reasoning steps
    Reasoning,
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            MemoryKind::Context => "context",
            MemoryKind::Codebase => "codebase",
            MemoryKind::User => "user",
            MemoryKind::ToolResult => "tool_result",
            MemoryKind::Reasoning => "reasoning",
        };
        write!(f, "{}", tag)
    }
}

/// A single memory item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique id
    pub id: String,
    /// Memory kind
    pub kind: MemoryKind,
    /// Opaque content
    pub content: String,
    /// Relevance score in [0, 1]
    pub relevance: f64,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Arbitrary tags and extra fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MemoryItem {
    /// Create an item with a generated id; relevance is clamped to [0, 1]
    pub fn new(kind: MemoryKind, content: impl Into<String>, relevance: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            relevance: relevance.clamp(0.0, 1.0),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_is_clamped() {
        assert_eq!(MemoryItem::new(MemoryKind::User, "x", 1.7).relevance, 1.0);
        assert_eq!(MemoryItem::new(MemoryKind::User, "x", -0.2).relevance, 0.0);
        assert_eq!(MemoryItem::new(MemoryKind::User, "x", 0.4).relevance, 0.4);
    }

    #[test]
    fn test_serialization_tags() {
        let item = MemoryItem::new(MemoryKind::ToolResult, "ls output", 0.5);
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"tool_result\""));
    }
}
