//! Interaction broker - stored continuations for paused runs
//!
//! An interactive capability returns immediately with a correlation id; the
//! controller then parks the run on a oneshot continuation registered here.
//! When the host delivers the user's answer for that correlation id, the
//! waiting run resumes. This makes the paused state explicit instead of
//! leaving the loop ambiguously "waiting" in event-handler space.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

/// Registry of pending interactive operations keyed by correlation id
#[derive(Default)]
pub struct InteractionBroker {
    waiters: Mutex<HashMap<String, Waiter>>,
}

struct Waiter {
    conversation_id: String,
    sender: oneshot::Sender<String>,
}

impl InteractionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation for a correlation id; the returned receiver
    /// resolves with the user's answer
    pub fn register(
        &self,
        correlation_id: &str,
        conversation_id: &str,
    ) -> oneshot::Receiver<String> {
        let (sender, receiver) = oneshot::channel();
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.insert(
            correlation_id.to_string(),
            Waiter {
                conversation_id: conversation_id.to_string(),
                sender,
            },
        );
        receiver
    }

    /// Deliver an answer; returns the conversation id of the resumed run,
    /// or None if nothing was waiting on this correlation id
    pub fn resolve(&self, correlation_id: &str, answer: &str) -> Option<String> {
        let waiter = {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.remove(correlation_id)?
        };
        // A dropped receiver means the run already gave up (e.g. timeout).
        if waiter.sender.send(answer.to_string()).is_err() {
            return None;
        }
        Some(waiter.conversation_id)
    }

    /// Drop a continuation without resolving it
    pub fn cancel(&self, correlation_id: &str) -> bool {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.remove(correlation_id).is_some()
    }

    /// Number of parked operations
    pub fn pending_count(&self) -> usize {
        let waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.len()
    }
}
