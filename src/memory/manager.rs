//! Tiered memory manager
//!
//! Short-term items live in per-conversation bounded sets; long-term items
//! are written through to the key/value collaborator and retrieved by query.
//! Long-term writes are serialized through a single async lock per manager
//! so the backing store never sees interleaved writes for the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::core::config::MemoryConfig;
use crate::core::error::{AxonError, Result};
use crate::events::{EventDispatcher, EventPayload, EventType};
use crate::memory::item::{MemoryItem, MemoryKind};
use crate::memory::short_term::ShortTermMemory;
use crate::memory::store::KvStore;

/// Governs what context survives within and across conversations
pub struct MemoryManager {
    config: MemoryConfig,
    short_term: Mutex<HashMap<String, ShortTermMemory>>,
    /// Mutable context fields per conversation (active file, workspace root…)
    context: Mutex<HashMap<String, serde_json::Map<String, Value>>>,
    store: Arc<dyn KvStore>,
    write_lock: tokio::sync::Mutex<()>,
    dispatcher: Option<Arc<EventDispatcher>>,
}

impl MemoryManager {
    /// Create a manager over the given long-term store
    pub fn new(config: MemoryConfig, store: Arc<dyn KvStore>) -> Self {
        Self {
            config,
            short_term: Mutex::new(HashMap::new()),
            context: Mutex::new(HashMap::new()),
            store,
            write_lock: tokio::sync::Mutex::new(()),
            dispatcher: None,
        }
    }

    /// Publish `MemoryStored` events through this dispatcher
    pub fn with_dispatcher(mut self, dispatcher: Arc<EventDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Insert a short-term item for a conversation
    pub fn remember_short(&self, conversation_id: &str, item: MemoryItem) {
        let mut map = self.short_term.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(conversation_id.to_string())
            .or_insert_with(|| ShortTermMemory::new(self.config.short_term_capacity))
            .insert(item);
    }

    /// Snapshot of a conversation's short-term items
    pub fn short_term(&self, conversation_id: &str) -> Vec<MemoryItem> {
        let map = self.short_term.lock().unwrap_or_else(|e| e.into_inner());
        map.get(conversation_id)
            .map(|m| m.items().to_vec())
            .unwrap_or_default()
    }

    /// Write an item through to long-term storage; returns its key
    pub async fn remember_long(&self, item: MemoryItem) -> Result<String> {
        let key = item.id.clone();
        let value = serde_json::to_value(&item)?;
        let metadata = json!({
            "kind": item.kind.to_string(),
            "relevance": item.relevance,
            "tags": item.metadata.clone().unwrap_or(Value::Null),
        });

        {
            let _guard = self.write_lock.lock().await;
            self.store.store(&key, value, metadata).await?;
        }

        if let Some(ref dispatcher) = self.dispatcher {
            dispatcher.dispatch(
                EventType::MemoryStored,
                EventPayload::new(json!({"key": key, "kind": item.kind.to_string()})),
            );
        }

        Ok(key)
    }

    /// Retrieve long-term items matching a free-text query
    pub async fn recall(&self, query: &str, limit: usize) -> Result<Vec<MemoryItem>> {
        let records = self.store.search(query, limit).await?;
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let item: MemoryItem = serde_json::from_value(record.value).map_err(|e| {
                AxonError::memory(format!("corrupt long-term record '{}': {}", record.key, e))
            })?;
            items.push(item);
        }
        Ok(items)
    }

    /// Delete a long-term item by key
    pub async fn forget(&self, key: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.store.delete(key).await
    }

    /// Compact textual digest of short-term items plus relevant long-term
    /// items, grouped by kind, for inclusion in reasoning calls.
    ///
    /// Pure projection: reads both tiers, mutates neither.
    pub async fn summary(&self, conversation_id: &str, query: &str) -> Result<String> {
        let mut items = self.short_term(conversation_id);
        items.extend(self.recall(query, self.config.recall_limit).await?);
        if items.is_empty() {
            return Ok(String::new());
        }

        let mut groups: HashMap<MemoryKind, Vec<String>> = HashMap::new();
        for item in items {
            groups.entry(item.kind).or_default().push(item.content);
        }

        let order = [
            MemoryKind::Context,
            MemoryKind::Codebase,
            MemoryKind::User,
            MemoryKind::ToolResult,
            MemoryKind::Reasoning,
        ];
        let mut digest = String::from("## Memory\n");
        for kind in order {
            if let Some(contents) = groups.get(&kind) {
                digest.push_str(&format!("\n### {}\n", kind));
                for content in contents {
                    digest.push_str(&format!("- {}\n", content));
                }
            }
        }
        Ok(digest)
    }

    /// Merge (not replace) mutable context fields for a conversation
    pub fn update_context(&self, conversation_id: &str, fields: Value) {
        let Value::Object(fields) = fields else {
            return;
        };
        let mut map = self.context.lock().unwrap_or_else(|e| e.into_inner());
        let entry = map.entry(conversation_id.to_string()).or_default();
        for (key, value) in fields {
            entry.insert(key, value);
        }
    }

    /// Current context fields for a conversation
    pub fn context(&self, conversation_id: &str) -> Value {
        let map = self.context.lock().unwrap_or_else(|e| e.into_inner());
        map.get(conversation_id)
            .map(|fields| Value::Object(fields.clone()))
            .unwrap_or_else(|| json!({}))
    }

    /// Drop a conversation's short-term items and context fields
    pub fn clear_conversation(&self, conversation_id: &str) {
        let mut short = self.short_term.lock().unwrap_or_else(|e| e.into_inner());
        short.remove(conversation_id);
        let mut context = self.context.lock().unwrap_or_else(|e| e.into_inner());
        context.remove(conversation_id);
    }
}
