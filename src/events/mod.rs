//! Events module - typed publish/subscribe bus with bounded history

pub mod dispatcher;
pub mod types;

pub use dispatcher::{EventDispatcher, EventHandler, SubscriptionId};
pub use types::{Event, EventFilter, EventPayload, EventType};
