//! Axon - Agentic Orchestration Core
//!
//! The reasoning-action kernel of a coding assistant: a bounded loop that
//! alternates reasoning, capability execution, and reflection until it can
//! answer. Model access stays behind the `ReasoningService` trait, so the
//! core never speaks a vendor protocol.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **Events**: Typed publish/subscribe bus with bounded history
//! - **Tools**: Capability registry with schema and permission checks
//! - **Memory**: Short-term working set plus a long-term key/value tier
//! - **State**: Per-conversation records behind a single-writer store
//! - **Agent**: The engine, loop controller, router, and interaction broker
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axon::agent::{Engine, ScriptedReasoner};
//! use axon::core::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let reasoner = Arc::new(ScriptedReasoner::new("Hello from Axon"));
//!     let engine = Engine::new(Config::load(), reasoner).unwrap();
//!
//!     let response = engine.process("conv-1", "Say hello").await.unwrap();
//!     println!("{}", response);
//! }
//! ```

pub mod agent;
pub mod core;
pub mod events;
pub mod memory;
pub mod state;
pub mod tools;

// Re-export commonly used items
pub use agent::Engine;
pub use core::{AxonError, Config, Result};
