//! Reader/writer-locked backing store with the mutation-to-notification
//! pipeline shared by every container.
//!
//! # Locking
//!
//! One `parking_lot::RwLock` guards each store. Reads take the read lock.
//! Every mutation takes the write lock once and, under that same
//! acquisition, validates its arguments, changes the store, computes the
//! exact diff and raises the immediate notifications. Dispatched
//! notifications are queued under that acquisition and posted after the lock
//! is released, so they reach the dispatch target in store order.
//!
//! Check-then-act operations ("remove if present") take an upgradable read
//! and only escalate once the precondition holds.

use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use smallvec::SmallVec;
use tracing::trace;

use crate::dispatch::SyncOperation;
use crate::error::{CollectionError, Result};
use crate::lifecycle::Lifecycle;
use crate::notify::{CollectionChange, CollectionNotifier, Outbox, PropertyChanged, StoreView};

/// A backing store a [`CollectionCore`] can guard.
pub(crate) trait Store: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn view(&self) -> &dyn StoreView<Self::Item>;

    fn len(&self) -> usize;

    /// Drop every item without raising anything.
    fn clear_silently(&mut self);
}

impl<T> Store for Vec<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn view(&self) -> &dyn StoreView<T> {
        self
    }

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn clear_silently(&mut self) {
        self.clear();
    }
}

/// The notifications one mutation raises, in raise order: properties first,
/// then the structured change.
pub(crate) struct Changes<T> {
    properties: SmallVec<[&'static str; 4]>,
    change: Option<CollectionChange<T>>,
}

impl<T> Changes<T> {
    /// Nothing changed.
    pub(crate) fn none() -> Self {
        Self {
            properties: SmallVec::new(),
            change: None,
        }
    }

    /// `change` took the item count from `old_len` to `new_len`.
    ///
    /// Raises `Count` only if the count moved, then `Item[]`, then `change`.
    pub(crate) fn of(change: CollectionChange<T>, old_len: usize, new_len: usize) -> Self {
        let mut properties = SmallVec::new();
        if old_len != new_len {
            properties.push(PropertyChanged::COUNT);
        }
        properties.push(PropertyChanged::INDEXER);
        Self {
            properties,
            change: Some(change),
        }
    }

    /// Raise an extra property after the standard ones.
    pub(crate) fn with_property(mut self, name: &'static str) -> Self {
        self.properties.push(name);
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.change.is_none() && self.properties.is_empty()
    }
}

/// Lock, store, and notifier of one container.
pub(crate) struct CollectionCore<S: Store> {
    notifier: CollectionNotifier<S::Item>,
    store: RwLock<S>,
    read_only: bool,
}

impl<S: Store> CollectionCore<S> {
    pub(crate) fn new(type_name: &'static str, sync: SyncOperation, store: S, read_only: bool) -> Self {
        Self {
            notifier: CollectionNotifier::new(type_name, sync),
            store: RwLock::new(store),
            read_only,
        }
    }

    pub(crate) fn notifier(&self) -> &CollectionNotifier<S::Item> {
        &self.notifier
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        self.notifier.base().lifecycle()
    }

    pub(crate) fn sync(&self) -> &SyncOperation {
        self.notifier.base().sync()
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.lifecycle().type_name()
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Run `f` under the read lock.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&*self.store.read())
    }

    /// Hold the read lock.
    pub(crate) fn read_guard(&self) -> RwLockReadGuard<'_, S> {
        self.store.read()
    }

    pub(crate) fn len(&self) -> usize {
        self.store.read().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<S::Item> {
        self.store.read().view().to_vec()
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.read_only {
            return Err(CollectionError::NotSupported {
                operation,
                type_name: self.type_name(),
            });
        }
        Ok(())
    }

    /// Apply a mutation through the public, read-only-checked entry point.
    pub(crate) fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S) -> Result<(R, Changes<S::Item>)>,
    ) -> Result<R> {
        self.ensure_writable(operation)?;
        self.apply(operation, f)
    }

    /// Apply a mutation regardless of the read-only flag.
    ///
    /// Derived views use this to mirror their parent.
    pub(crate) fn apply<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut S) -> Result<(R, Changes<S::Item>)>,
    ) -> Result<R> {
        let result = {
            let mut store = self.store.write();
            self.lifecycle().verify_not_disposing()?;
            let (result, changes) = f(&mut store)?;
            self.publish(operation, changes, &store);
            result
        };
        self.notifier.base().deliver_dispatched();
        Ok(result)
    }

    /// Check under an upgradable read, escalating to the write lock only when
    /// `check` yields a plan. Returns `Ok(None)` when it does not.
    pub(crate) fn mutate_if<P, R>(
        &self,
        operation: &'static str,
        check: impl FnOnce(&S) -> Result<Option<P>>,
        f: impl FnOnce(&mut S, P) -> Result<(R, Changes<S::Item>)>,
    ) -> Result<Option<R>> {
        self.ensure_writable(operation)?;

        let result = {
            let guard = self.store.upgradable_read();
            self.lifecycle().verify_not_disposing()?;
            let Some(plan) = check(&guard)? else {
                return Ok(None);
            };
            let mut store = RwLockUpgradableReadGuard::upgrade(guard);
            let (result, changes) = f(&mut store, plan)?;
            self.publish(operation, changes, &store);
            result
        };
        self.notifier.base().deliver_dispatched();
        Ok(Some(result))
    }

    /// Raise immediate notifications and queue dispatched ones. Runs under
    /// the write lock.
    fn publish(&self, operation: &'static str, changes: Changes<S::Item>, store: &S) {
        if changes.is_empty() {
            return;
        }

        trace!(
            container = self.type_name(),
            operation,
            count = store.len(),
            "mutation applied"
        );

        let mut outbox = Outbox::default();
        let base = self.notifier.base();
        for name in changes.properties {
            base.raise_property_changed(PropertyChanged::new(name), &mut outbox);
        }
        if let Some(change) = changes.change {
            self.notifier
                .raise_collection_changed(change, store.view(), &mut outbox);
        }
        base.queue_dispatched(outbox);
    }

    /// Dispose, running `before_teardown` first if this call wins.
    ///
    /// Must not be called from one of this container's own immediate
    /// handlers: teardown takes the write lock.
    pub(crate) fn dispose_with(&self, before_teardown: impl FnOnce()) -> bool {
        self.lifecycle().dispose_with(|| {
            before_teardown();
            self.notifier.clear_subscribers();
            self.store.write().clear_silently();
        })
    }
}

impl<S: Store> fmt::Debug for CollectionCore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.type_name())
            .field("count", &self.len())
            .field("read_only", &self.read_only)
            .field("immediate", &self.notifier.immediate_len())
            .field("dispatched", &self.notifier.dispatched_len())
            .field("state", &self.lifecycle().state())
            .finish()
    }
}

/// Treat a disposed entity as a silent no-op for operations with a neutral
/// result.
pub(crate) fn skip_disposed<R: Default>(result: Result<R>) -> Result<R> {
    match result {
        Err(CollectionError::Disposed(_)) => Ok(R::default()),
        other => other,
    }
}
