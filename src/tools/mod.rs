//! Tools module - capability catalogue and execution contract

pub mod builtin;
pub mod context;
pub mod registry;
pub mod schema;
pub mod types;

pub use builtin::{register_builtin_tools, ASK_USER_TOOL, RESPOND_TOOL};
pub use context::ExecutionContext;
pub use registry::ToolRegistry;
pub use types::{
    FnHandler, Permission, ToolDefinition, ToolDescriptor, ToolHandler, ToolOutput, ToolResult,
};
