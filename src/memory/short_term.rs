//! Short-term memory - per-conversation, size-bounded, relevance-evicted
//!
//! Insertion appends; once capacity is exceeded the set is re-ranked by
//! relevance and truncated, so the least relevant items go first, not the
//! oldest.

use crate::memory::item::MemoryItem;

/// Bounded ordered set of memory items for one conversation
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    items: Vec<MemoryItem>,
    capacity: usize,
}

impl ShortTermMemory {
    /// Create with the given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert an item, evicting the least relevant items on overflow
    pub fn insert(&mut self, item: MemoryItem) {
        self.items.push(item);
        if self.items.len() > self.capacity {
            // Stable sort: among equal relevance the earlier item survives.
            self.items
                .sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
            self.items.truncate(self.capacity);
        }
    }

    /// Snapshot of current items in insertion/rank order
    pub fn items(&self) -> &[MemoryItem] {
        &self.items
    }

    /// Number of items held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all items
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::item::MemoryKind;

    fn item(content: &str, relevance: f64) -> MemoryItem {
        MemoryItem::new(MemoryKind::Context, content, relevance)
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut memory = ShortTermMemory::new(3);
        for i in 0..20 {
            memory.insert(item(&format!("item {}", i), 0.5));
            assert!(memory.len() <= 3);
        }
    }

    #[test]
    fn test_evicts_least_relevant_not_oldest() {
        let mut memory = ShortTermMemory::new(3);
        memory.insert(item("old but important", 0.9));
        memory.insert(item("middling", 0.5));
        memory.insert(item("noise", 0.1));

        // At capacity: a new higher-relevance item must push out the
        // lowest-relevance one, not the oldest.
        memory.insert(item("fresh and relevant", 0.8));

        let contents: Vec<&str> = memory.items().iter().map(|i| i.content.as_str()).collect();
        assert_eq!(memory.len(), 3);
        assert!(contents.contains(&"old but important"));
        assert!(contents.contains(&"fresh and relevant"));
        assert!(!contents.contains(&"noise"));
    }

    #[test]
    fn test_clear() {
        let mut memory = ShortTermMemory::new(4);
        memory.insert(item("a", 0.5));
        memory.clear();
        assert!(memory.is_empty());
    }
}
