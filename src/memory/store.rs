//! Persistent key/value collaborator
//!
//! Long-term memory persists through this trait; the on-disk format is the
//! collaborator's business, not the core's. Nothing beyond JSON-serializable
//! values is assumed. The in-memory implementation backs the core by default
//! and the tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::error::Result;

/// A stored record returned by search
#[derive(Debug, Clone)]
pub struct KvRecord {
    pub key: String,
    pub value: Value,
    pub metadata: Value,
}

/// Opaque key/value store contract
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store a value (and metadata) under a key, replacing any prior value
    async fn store(&self, key: &str, value: Value, metadata: Value) -> Result<()>;

    /// Retrieve a value by key
    async fn retrieve(&self, key: &str) -> Result<Option<Value>>;

    /// Free-text search over stored values; substring-style scoring is
    /// sufficient, exactness is not required
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KvRecord>>;

    /// Delete a key; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-memory `KvStore` implementation
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, (Value, Value)>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn store(&self, key: &str, value: Value, metadata: Value) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), (value, metadata));
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<KvRecord>> {
        let entries = self.entries.read().await;
        let mut scored: Vec<(usize, KvRecord)> = entries
            .iter()
            .filter_map(|(key, (value, metadata))| {
                let score = score_match(query, value);
                if score == 0 {
                    return None;
                }
                Some((
                    score,
                    KvRecord {
                        key: key.clone(),
                        value: value.clone(),
                        metadata: metadata.clone(),
                    },
                ))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.key.cmp(&b.1.key)));
        Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }
}

/// Count how many lowercase query terms occur in the serialized value
fn score_match(query: &str, value: &Value) -> usize {
    let haystack = value.to_string().to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| haystack.contains(term))
        .count()
}
