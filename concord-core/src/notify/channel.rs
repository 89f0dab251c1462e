//! Handler lists.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::subscriber::{SubscriberId, Subscription, Unsubscribe};

/// An ordered list of handlers of type `H` (usually a `dyn Fn` type).
///
/// Handlers are invoked in subscription order. Callers take a snapshot with
/// [`handlers`](Self::handlers) and invoke it after the list lock is
/// released, so a handler may subscribe or unsubscribe while running.
pub struct Channel<H: ?Sized> {
    handlers: RwLock<Vec<(SubscriberId, Arc<H>)>>,
}

impl<H> Channel<H>
where
    H: ?Sized + Send + Sync + 'static,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handlers: RwLock::new(Vec::new()),
        })
    }

    /// Register `handler`; the returned guard removes it when dropped.
    pub fn subscribe(self: &Arc<Self>, handler: Arc<H>) -> Subscription {
        let id = SubscriberId::new();
        self.handlers.write().push((id, handler));

        let source: Weak<dyn Unsubscribe> = Arc::downgrade(self) as Weak<dyn Unsubscribe>;
        Subscription::new(id, source)
    }

    /// Snapshot of the current handlers.
    pub fn handlers(&self) -> SmallVec<[Arc<H>; 4]> {
        self.handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl<H> Unsubscribe for Channel<H>
where
    H: ?Sized + Send + Sync + 'static,
{
    fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }
}
