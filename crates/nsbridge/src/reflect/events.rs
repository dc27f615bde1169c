//! Namespace-added notifications
//!
//! The managed universe publishes a namespace name whenever newly loaded code
//! contributes one. Subscribers hold a [`Subscription`]; cancelling (or
//! dropping) it removes the callback before any state the callback touches is
//! torn down.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with the added namespace
pub type NamespaceCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Identifier of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Observers {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, NamespaceCallback)>>,
}

impl Observers {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }
}

/// Observer list for namespace-added notifications
pub struct NamespaceEvents {
    observers: Arc<Observers>,
}

impl NamespaceEvents {
    /// Create an event source with no subscribers
    pub fn new() -> Self {
        Self {
            observers: Arc::new(Observers {
                next_id: AtomicU64::new(1),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a callback
    ///
    /// The callback stays registered until the returned subscription is
    /// cancelled or dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.observers.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .callbacks
            .lock()
            .push((id, Arc::new(callback)));
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
            active: true,
        }
    }

    /// Deliver a namespace to every current subscriber
    ///
    /// Callbacks run on the publishing thread, outside the observer lock, so
    /// a callback may block on the global critical section without stalling
    /// subscribe or cancel.
    pub fn publish(&self, namespace: &str) {
        let callbacks: Vec<NamespaceCallback> = self
            .observers
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        tracing::trace!(namespace, subscribers = callbacks.len(), "publishing namespace");
        for callback in callbacks {
            callback(namespace);
        }
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.observers.callbacks.lock().len()
    }
}

impl Default for NamespaceEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NamespaceEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamespaceEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Scoped registration of a namespace callback
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    observers: Weak<Observers>,
    active: bool,
}

impl Subscription {
    /// Subscription identifier
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Check if the callback is still registered
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Remove the callback
    ///
    /// Safe to call more than once.
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}
