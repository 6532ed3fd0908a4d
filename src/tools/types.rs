//! Tool types - capability descriptors, handlers, and execution results

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::tools::context::ExecutionContext;

/// Permissions a capability may require before it is allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Read files in the workspace
    ReadWorkspace,
    /// Modify files in the workspace
    WriteWorkspace,
    /// Run terminal commands
    ExecuteCommands,
    /// Reach the network
    NetworkAccess,
    /// Ask the user questions mid-run
    UserInteraction,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Permission::ReadWorkspace => "read_workspace",
            Permission::WriteWorkspace => "write_workspace",
            Permission::ExecuteCommands => "execute_commands",
            Permission::NetworkAccess => "network_access",
            Permission::UserInteraction => "user_interaction",
        };
        write!(f, "{}", tag)
    }
}

/// What a capability body produced
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Human-readable output
    pub output: String,
    /// Optional structured data
    pub data: Option<serde_json::Value>,
    /// Set when the capability returned without completing and expects an
    /// external answer keyed by this correlation id
    pub pending_correlation: Option<String>,
}

impl ToolOutput {
    /// Plain text output
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
            pending_correlation: None,
        }
    }

    /// Text output with structured data attached
    pub fn with_data(output: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            output: output.into(),
            data: Some(data),
            pending_correlation: None,
        }
    }

    /// A non-blocking interactive result: the run should pause until the
    /// answer for this correlation id arrives
    pub fn pending(correlation_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
            pending_correlation: Some(correlation_id.into()),
        }
    }
}

/// Executable body of a capability
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the capability with validated params and the execution context
    async fn run(&self, params: serde_json::Value, ctx: ExecutionContext) -> Result<ToolOutput>;
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<ToolOutput>> + Send>>;

/// Adapter turning a closure into a `ToolHandler`
pub struct FnHandler {
    func: Box<dyn Fn(serde_json::Value, ExecutionContext) -> HandlerFuture + Send + Sync>,
}

impl FnHandler {
    /// Wrap an async closure
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(serde_json::Value, ExecutionContext) -> HandlerFuture + Send + Sync + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl ToolHandler for FnHandler {
    async fn run(&self, params: serde_json::Value, ctx: ExecutionContext) -> Result<ToolOutput> {
        (self.func)(params, ctx).await
    }
}

/// Capability descriptor: name, schema, permissions, and execution body
#[derive(Clone)]
pub struct ToolDefinition {
    /// Unique capability name
    pub name: String,
    /// Human description, also shown to the reasoning service
    pub description: String,
    /// JSON Schema for the parameters (validated eagerly at registration)
    pub parameters: serde_json::Value,
    /// Permissions the execution context must grant
    pub required_permissions: HashSet<Permission>,
    /// Execution body
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    /// Create a definition with no required permissions
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required_permissions: HashSet::new(),
            handler,
        }
    }

    /// Add required permissions
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.required_permissions.extend(permissions);
        self
    }

    /// Serializable descriptor used to describe the capability to the
    /// reasoning service
    pub fn descriptor(&self) -> ToolDescriptor {
        let mut permissions: Vec<Permission> =
            self.required_permissions.iter().copied().collect();
        permissions.sort_by_key(|p| p.to_string());
        ToolDescriptor {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            required_permissions: permissions,
        }
    }
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("required_permissions", &self.required_permissions)
            .finish_non_exhaustive()
    }
}

/// Handler-free view of a capability, safe to serialize into prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    pub required_permissions: Vec<Permission>,
}

/// Result of executing a tool through the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool (or the error message on failure)
    pub output: String,
    /// Optional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error text on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Permission-denied marker; the loop treats this failure as fatal
    #[serde(default)]
    pub denied: bool,
    /// Correlation id of a pending interactive operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_correlation: Option<String>,
    /// Wall-clock execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
            data: None,
            error: None,
            denied: false,
            pending_correlation: None,
            duration_ms: 0,
        }
    }

    /// Create a failed result
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: error.clone(),
            data: None,
            error: Some(error),
            denied: false,
            pending_correlation: None,
            duration_ms: 0,
        }
    }

    /// Create a permission-denied result
    pub fn denied(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::failure(tool_name, error);
        result.denied = true;
        result
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the measured duration
    pub fn with_duration(mut self, duration: std::time::Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Whether this result left an interactive operation pending
    pub fn is_pending(&self) -> bool {
        self.pending_correlation.is_some()
    }
}
