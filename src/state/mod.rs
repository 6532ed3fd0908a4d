//! State module - per-conversation records and their shared store

pub mod conversation;
pub mod store;

pub use conversation::ConversationState;
pub use store::StateStore;
