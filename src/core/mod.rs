//! Core module - shared types, configuration, and error handling

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentConfig, Config, EventConfig, MemoryConfig, TimeoutConfig};
pub use error::{AxonError, Result};
pub use types::{EntryStatus, HistoryEntry, Phase, RunStatus};
