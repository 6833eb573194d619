//! In-process update notifications.
//!
//! Independent views of the library (a listing, an auto-loader) subscribe
//! here and re-query after each successful save or delete, instead of
//! polling or sharing state.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Publish/subscribe hub for library mutations. Cloning shares the hub.
#[derive(Clone, Default)]
pub struct UpdateBus {
    registry: Arc<Mutex<Registry>>,
}

impl UpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; it stays registered until the returned handle is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Notify every current subscriber, in registration order.
    ///
    /// Delivery runs over a snapshot taken on entry, so callbacks may
    /// subscribe or unsubscribe freely. A panicking callback is logged and
    /// does not stop the rest.
    pub fn publish(&self) {
        let snapshot: Vec<(u64, Listener)> = lock(&self.registry).listeners.clone();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener())).is_err() {
                tracing::warn!(subscriber = id, "Library update subscriber panicked");
            }
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

/// Handle for a registered callback
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        // Removal happens in Drop
    }

    /// Keep the callback registered for as long as the bus lives
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

// A listener panic never happens under this lock, so poisoning is recoverable.
fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
