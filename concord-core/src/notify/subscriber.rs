//! Subscriber identity and subscription guards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use tracing::debug;

/// Unique identifier for a registered handler.
///
/// Each subscription gets a fresh ID from a process-wide counter, so IDs are
/// unique across channels and threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a handler can be removed from.
pub(crate) trait Unsubscribe: Send + Sync {
    /// Remove the handler. Returns `false` if it was not registered.
    fn unsubscribe(&self, id: SubscriberId) -> bool;
}

/// Handle to a registered handler.
///
/// Dropping the handle unregisters the handler. Call [`detach`](Self::detach)
/// to keep it registered for as long as the channel lives.
#[must_use = "dropping a Subscription unregisters its handler"]
pub struct Subscription {
    id: SubscriberId,
    source: Option<Weak<dyn Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, source: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            source: Some(source),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Whether the channel this subscription belongs to is still alive.
    pub fn is_active(&self) -> bool {
        self.source
            .as_ref()
            .is_some_and(|source| source.strong_count() > 0)
    }

    /// Unregister the handler now.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Leave the handler registered and give up the ability to remove it.
    pub fn detach(mut self) {
        self.source = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(source) = self.source.take().and_then(|weak| weak.upgrade()) {
            if source.unsubscribe(self.id) {
                debug!(subscriber = self.id.raw(), "unsubscribed");
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
