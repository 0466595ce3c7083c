//! In-process publish/subscribe bus keyed by event name.
//!
//! Subscribers register a pattern:
//! - an exact name (`item.published`)
//! - a namespace wildcard (`item.*`)
//! - `*` for everything
//!
//! Handlers run synchronously on the publishing task. An error or panic in one
//! handler is logged and does not prevent delivery to the others.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{error, warn};

use super::PipelineEvent;

/// Error returned by a subscriber.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        HandlerError(s)
    }
}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        HandlerError(s.to_string())
    }
}

/// Subscriber callback.
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Handle used to remove a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Parsed subscription pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPattern {
    Exact(String),
    Namespace(String),
    All,
}

impl EventPattern {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            EventPattern::All
        } else if let Some(ns) = pattern.strip_suffix(".*") {
            EventPattern::Namespace(ns.to_string())
        } else {
            EventPattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            EventPattern::All => true,
            EventPattern::Exact(exact) => exact == name,
            EventPattern::Namespace(ns) => name
                .strip_prefix(ns.as_str())
                .is_some_and(|rest| rest.starts_with('.')),
        }
    }
}

struct Subscription {
    id: SubscriptionId,
    pattern: EventPattern,
    handler: EventHandler,
}

/// Pipeline event bus. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events matching `pattern`.
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&PipelineEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            pattern: EventPattern::parse(pattern),
            handler: Arc::new(handler),
        };

        match self.subscriptions.write() {
            Ok(mut subs) => subs.push(subscription),
            Err(poisoned) => poisoned.into_inner().push(subscription),
        }
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = match self.subscriptions.write() {
            Ok(subs) => subs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Deliver an event to every matching subscriber. Returns how many handlers succeeded.
    pub fn publish(&self, event: &PipelineEvent) -> usize {
        let name = event.name();

        // Snapshot under the lock so handlers may subscribe/unsubscribe re-entrantly.
        let handlers: Vec<EventHandler> = {
            let subs = match self.subscriptions.read() {
                Ok(subs) => subs,
                Err(poisoned) => poisoned.into_inner(),
            };
            subs.iter()
                .filter(|s| s.pattern.matches(name))
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Event handler failed for {}: {}", name, e),
                Err(_) => error!("Event handler panicked for {}", name),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
