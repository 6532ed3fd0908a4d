//! Memory module - tiered memory with an opaque persistence collaborator

pub mod item;
pub mod manager;
pub mod short_term;
pub mod store;

pub use item::{MemoryItem, MemoryKind};
pub use manager::MemoryManager;
pub use short_term::ShortTermMemory;
pub use store::{InMemoryKvStore, KvRecord, KvStore};
