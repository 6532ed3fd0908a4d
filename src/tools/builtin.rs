//! Built-in capabilities the loop controller depends on
//!
//! `respond` delivers the final answer to the user; the controller copies
//! its output into the conversation's final output and terminates the run.
//! `ask_user` is the interactive capability: it returns immediately with a
//! pending marker and publishes a `UserInputRequested` event whose id is
//! forced to the correlation id, so the eventual answer can be threaded back.

use std::sync::Arc;

use serde_json::json;

use crate::core::error::Result;
use crate::events::{EventPayload, EventType};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{FnHandler, Permission, ToolDefinition, ToolOutput};

/// Name of the deliver-final-answer capability
pub const RESPOND_TOOL: &str = "respond";

/// Name of the interactive ask-the-user capability
pub const ASK_USER_TOOL: &str = "ask_user";

/// The deliver-final-answer capability
pub fn respond_tool() -> ToolDefinition {
    ToolDefinition::new(
        RESPOND_TOOL,
        "Deliver the final answer to the user and finish the task",
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The final answer to show the user"
                }
            },
            "required": ["message"]
        }),
        Arc::new(FnHandler::new(|params, _ctx| {
            Box::pin(async move {
                let message = params
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(ToolOutput::text(message))
            })
        })),
    )
}

/// The interactive ask-the-user capability
///
/// Does not block inside `execute`; the run pauses at the controller until
/// the answer for the correlation id arrives.
pub fn ask_user_tool() -> ToolDefinition {
    ToolDefinition::new(
        ASK_USER_TOOL,
        "Ask the user a clarifying question and wait for their answer",
        json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to put to the user"
                }
            },
            "required": ["question"]
        }),
        Arc::new(FnHandler::new(|params, ctx| {
            Box::pin(async move {
                let question = params
                    .get("question")
                    .and_then(|q| q.as_str())
                    .unwrap_or_default()
                    .to_string();

                ctx.dispatcher.dispatch_with_id(
                    ctx.correlation_id.clone(),
                    EventType::UserInputRequested,
                    EventPayload::new(json!({"question": question}))
                        .for_conversation(&ctx.conversation_id)
                        .with_correlation(&ctx.correlation_id),
                );

                Ok(ToolOutput::pending(
                    ctx.correlation_id.clone(),
                    format!("Waiting for user input: {}", question),
                ))
            })
        })),
    )
    .with_permissions([Permission::UserInteraction])
}

/// Register the built-in capabilities into a registry
pub fn register_builtin_tools(registry: &ToolRegistry) -> Result<()> {
    registry.register(respond_tool())?;
    registry.register(ask_user_tool())?;
    Ok(())
}
