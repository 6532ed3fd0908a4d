//! Custom error types for Axon
//!
//! Provides a unified error handling system across all modules.
//! Internal components never let errors escape their public contract as
//! panics: failures become typed results or error-carrying events.

use thiserror::Error;

/// Main error type for Axon operations
#[derive(Error, Debug)]
pub enum AxonError {
    /// Reasoning service call or parse errors
    #[error("Reasoning error: {0}")]
    Reasoning(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Memory subsystem errors
    #[error("Memory error: {0}")]
    Memory(String),

    /// Conversation state errors
    #[error("State error: {0}")]
    State(String),

    /// A run is already active for the conversation
    #[error("Conversation '{0}' already has an active run")]
    ConversationBusy(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Axon operations
pub type Result<T> = std::result::Result<T, AxonError>;

impl AxonError {
    /// Create a reasoning error
    pub fn reasoning(msg: impl Into<String>) -> Self {
        Self::Reasoning(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a memory error
    pub fn memory(msg: impl Into<String>) -> Self {
        Self::Memory(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
