//! Tool registry - catalogue of capabilities and their execution contract
//!
//! `execute` never returns an error to the caller: unknown names, schema
//! violations, permission denials, handler failures, panics, and timeouts
//! all come back as failure `ToolResult`s. Permission denials carry a
//! distinct marker because the loop treats them as fatal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::core::error::{AxonError, Result};
use crate::events::EventType;
use crate::tools::context::ExecutionContext;
use crate::tools::schema;
use crate::tools::types::{ToolDefinition, ToolDescriptor, ToolResult};

/// Registry of available tools
pub struct ToolRegistry {
    /// Tool definitions indexed by name
    definitions: RwLock<HashMap<String, Arc<ToolDefinition>>>,
    /// Upper bound on a single capability execution
    timeout: Duration,
}

impl ToolRegistry {
    /// Create an empty registry with the given execution timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            definitions: RwLock::new(HashMap::new()),
            timeout,
        }
    }

    /// Register a tool definition
    ///
    /// Rejects duplicate names and structurally invalid schemas; name-based
    /// lookup stays at the boundary, but the handler record is validated
    /// here, eagerly.
    pub fn register(&self, definition: ToolDefinition) -> Result<()> {
        schema::check_schema(&definition.parameters).map_err(|problem| {
            AxonError::tool(format!(
                "invalid schema for tool '{}': {}",
                definition.name, problem
            ))
        })?;

        let mut definitions = self.definitions.write().unwrap_or_else(|e| e.into_inner());
        if definitions.contains_key(&definition.name) {
            return Err(AxonError::tool(format!(
                "tool '{}' is already registered",
                definition.name
            )));
        }
        definitions.insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        definitions.get(name).cloned()
    }

    /// Whether a tool with this name exists
    pub fn contains(&self, name: &str) -> bool {
        let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        definitions.contains_key(name)
    }

    /// Descriptors for all registered tools, sorted by name, for handing to
    /// the reasoning service
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        let mut descriptors: Vec<ToolDescriptor> =
            definitions.values().map(|d| d.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        let definitions = self.definitions.read().unwrap_or_else(|e| e.into_inner());
        definitions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute a tool by name
    ///
    /// Pipeline: lookup, validate params, check permissions, then invoke the
    /// body with wall-clock accounting. Interactive capabilities return
    /// immediately with a pending marker; resuming the run on the eventual
    /// answer is the controller's job, not the registry's.
    pub async fn execute(&self, name: &str, params: Value, ctx: ExecutionContext) -> ToolResult {
        let Some(definition) = self.get(name) else {
            return ToolResult::failure(name, format!("Unknown tool: {}", name));
        };

        if let Err(problem) = schema::validate_params(&definition.parameters, &params) {
            return ToolResult::failure(name, format!("Invalid parameters: {}", problem));
        }

        let missing = ctx.missing_permissions(&definition.required_permissions);
        if !missing.is_empty() {
            let listed = missing
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return ToolResult::denied(
                name,
                format!("Permission denied: missing [{}]", listed),
            );
        }

        ctx.publish(
            EventType::ToolExecutionStarted,
            serde_json::json!({"tool": name}),
        );

        let started = Instant::now();
        let result = self.invoke(&definition, params, ctx.clone()).await;
        let duration = started.elapsed();
        let result = result.with_duration(duration);

        tracing::debug!(
            tool = name,
            success = result.success,
            duration_ms = result.duration_ms,
            "tool execution finished"
        );
        ctx.publish(
            EventType::ToolExecutionCompleted,
            serde_json::json!({
                "tool": name,
                "success": result.success,
                "duration_ms": result.duration_ms,
                "pending": result.is_pending(),
            }),
        );

        result
    }

    /// Invoke the capability body on its own task so a panicking handler is
    /// contained, bounded by the registry timeout
    async fn invoke(
        &self,
        definition: &Arc<ToolDefinition>,
        params: Value,
        ctx: ExecutionContext,
    ) -> ToolResult {
        let name = definition.name.clone();
        let handler = Arc::clone(&definition.handler);
        let task = tokio::spawn(async move { handler.run(params, ctx).await });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => ToolResult::failure(
                &name,
                format!("Timed out after {}s", self.timeout.as_secs()),
            ),
            Ok(Err(join_error)) => {
                tracing::warn!(tool = %name, error = %join_error, "tool task panicked");
                ToolResult::failure(&name, format!("Tool task panicked: {}", join_error))
            }
            Ok(Ok(Err(error))) => ToolResult::failure(&name, error.to_string()),
            Ok(Ok(Ok(output))) => {
                let mut result = ToolResult::success(&name, output.output);
                result.data = output.data;
                result.pending_correlation = output.pending_correlation;
                result
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}
