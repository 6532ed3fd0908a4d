//! Conversation state store
//!
//! Shared map keyed by conversation id. Each entry sits behind its own async
//! mutex, giving single-writer-per-key discipline: concurrent runs for the
//! same id are rejected (state mutation is not reentrant), while distinct
//! conversations proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use crate::core::error::{AxonError, Result};
use crate::state::conversation::ConversationState;

type SharedState = Arc<tokio::sync::Mutex<ConversationState>>;

/// Owns the mutable per-conversation records
#[derive(Default)]
pub struct StateStore {
    conversations: Mutex<HashMap<String, SharedState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the record for a conversation, creating it on first use
    pub fn get_or_create(
        &self,
        conversation_id: &str,
        message: &str,
        max_iterations: u32,
    ) -> SharedState {
        let mut map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(conversation_id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(ConversationState::new(
                    conversation_id,
                    message,
                    max_iterations,
                )))
            })
            .clone()
    }

    /// Get an existing record
    pub fn get(&self, conversation_id: &str) -> Option<SharedState> {
        let map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        map.get(conversation_id).cloned()
    }

    /// Acquire the single-writer guard for a run, rejecting a second
    /// concurrent run on the same conversation
    pub fn try_begin_run(&self, shared: &SharedState, conversation_id: &str) -> Result<OwnedMutexGuard<ConversationState>> {
        Arc::clone(shared)
            .try_lock_owned()
            .map_err(|_| AxonError::ConversationBusy(conversation_id.to_string()))
    }

    /// Apply an update under the conversation's lock
    pub async fn update<F, R>(&self, conversation_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut ConversationState) -> R,
    {
        let shared = self
            .get(conversation_id)
            .ok_or_else(|| AxonError::state(format!("unknown conversation '{}'", conversation_id)))?;
        let mut state = shared.lock().await;
        Ok(f(&mut state))
    }

    /// Mark a conversation's run ended (completed if not already terminal)
    pub async fn end(&self, conversation_id: &str) -> Result<()> {
        self.update(conversation_id, |state| state.complete(None)).await
    }

    /// Remove a conversation record entirely
    pub fn clear(&self, conversation_id: &str) -> bool {
        let mut map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(conversation_id).is_some()
    }

    /// Ids of all known conversations
    pub fn conversation_ids(&self) -> Vec<String> {
        let map = self.conversations.lock().unwrap_or_else(|e| e.into_inner());
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RunStatus;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = StateStore::new();
        let a = store.get_or_create("conv-1", "hello", 10);
        let b = store.get_or_create("conv-1", "different message", 10);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.lock().await.original_message, "hello");
    }

    #[tokio::test]
    async fn test_concurrent_run_for_same_id_is_rejected() {
        let store = StateStore::new();
        let shared = store.get_or_create("conv-1", "x", 10);

        let guard = store.try_begin_run(&shared, "conv-1").unwrap();
        let second = store.try_begin_run(&shared, "conv-1");
        assert!(matches!(second, Err(AxonError::ConversationBusy(_))));

        drop(guard);
        assert!(store.try_begin_run(&shared, "conv-1").is_ok());
    }

    #[tokio::test]
    async fn test_update_and_end() {
        let store = StateStore::new();
        store.get_or_create("conv-1", "x", 10);

        store
            .update("conv-1", |state| state.note_error("transient"))
            .await
            .unwrap();
        store.end("conv-1").await.unwrap();

        let status = store
            .update("conv-1", |state| state.status)
            .await
            .unwrap();
        assert_eq!(status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = StateStore::new();
        store.get_or_create("conv-1", "x", 10);
        assert!(store.clear("conv-1"));
        assert!(!store.clear("conv-1"));
        assert!(store.get("conv-1").is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_conversation_errors() {
        let store = StateStore::new();
        let result = store.update("missing", |_| ()).await;
        assert!(matches!(result, Err(AxonError::State(_))));
    }
}
