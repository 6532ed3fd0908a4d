//! Event dispatcher - typed publish/subscribe with bounded history
//!
//! The dispatcher is explicitly constructed and passed by reference (one per
//! engine), never a hidden global, so tests can instantiate isolated
//! instances. Dispatch is fire-and-forget: handlers run synchronously, are
//! never awaited, and a panicking handler cannot prevent other handlers from
//! running or corrupt dispatcher state.

use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::events::types::{Event, EventFilter, EventPayload, EventType};

/// Handler invoked for matching events
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Opaque subscription id returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    /// None means "all types"
    kinds: Option<HashSet<EventType>>,
    handler: EventHandler,
    once: bool,
}

impl Subscriber {
    fn wants(&self, kind: EventType) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&kind),
            None => true,
        }
    }
}

#[derive(Default)]
struct Inner {
    subscribers: Vec<Subscriber>,
    history: VecDeque<Event>,
    next_subscription: u64,
}

/// Typed publish/subscribe bus with a bounded in-memory history ring
pub struct EventDispatcher {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl EventDispatcher {
    /// Create a dispatcher with the given history capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Dispatch an event with a generated id
    pub fn dispatch(&self, kind: EventType, payload: EventPayload) -> Event {
        self.dispatch_inner(Uuid::new_v4().to_string(), kind, payload)
    }

    /// Dispatch an event with a caller-forced id, used to correlate the
    /// event with an external operation
    pub fn dispatch_with_id(
        &self,
        forced_id: impl Into<String>,
        kind: EventType,
        payload: EventPayload,
    ) -> Event {
        self.dispatch_inner(forced_id.into(), kind, payload)
    }

    fn dispatch_inner(&self, id: String, kind: EventType, payload: EventPayload) -> Event {
        let event = Event {
            id,
            kind,
            payload,
            timestamp: Utc::now(),
        };

        // Record history and snapshot matching handlers under the lock, then
        // invoke outside it so handlers may re-enter the dispatcher.
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

            inner.history.push_back(event.clone());
            while inner.history.len() > self.capacity {
                inner.history.pop_front();
            }

            let matching: Vec<(SubscriptionId, EventHandler)> = inner
                .subscribers
                .iter()
                .filter(|s| s.wants(kind))
                .map(|s| (s.id, Arc::clone(&s.handler)))
                .collect();

            inner
                .subscribers
                .retain(|s| !(s.once && s.wants(kind)));

            matching
        };

        for (id, handler) in handlers {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                tracing::warn!(subscription = id.0, kind = %kind, "event handler panicked");
            }
        }

        event
    }

    /// Subscribe to a set of event types
    pub fn subscribe(
        &self,
        kinds: impl IntoIterator<Item = EventType>,
        handler: EventHandler,
    ) -> SubscriptionId {
        self.add_subscriber(Some(kinds.into_iter().collect()), handler, false)
    }

    /// Subscribe to all event types
    pub fn subscribe_all(&self, handler: EventHandler) -> SubscriptionId {
        self.add_subscriber(None, handler, false)
    }

    /// Subscribe to a single type for exactly one delivery
    pub fn once(&self, kind: EventType, handler: EventHandler) -> SubscriptionId {
        self.add_subscriber(Some(HashSet::from([kind])), handler, true)
    }

    fn add_subscriber(
        &self,
        kinds: Option<HashSet<EventType>>,
        handler: EventHandler,
        once: bool,
    ) -> SubscriptionId {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;
        inner.subscribers.push(Subscriber {
            id,
            kinds,
            handler,
            once,
        });
        id
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let before = inner.subscribers.len();
        inner.subscribers.retain(|s| s.id != id);
        inner.subscribers.len() != before
    }

    /// Snapshot of history entries passing the filter, oldest first
    pub fn history(&self, filter: &EventFilter) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .history
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Snapshot of history entries passing an arbitrary predicate
    pub fn history_where(&self, predicate: impl Fn(&Event) -> bool) -> Vec<Event> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.history.iter().filter(|e| predicate(e)).cloned().collect()
    }

    /// Number of events currently held in the ring
    pub fn history_len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.history.len()
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.len()
    }

    /// Clear all subscriptions and history; idempotent
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.subscribers.clear();
        inner.history.clear();
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(200)
    }
}
