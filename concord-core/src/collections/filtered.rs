//! Live filtered views.
//!
//! A view is built once from a predicate over its parent's current contents
//! and then kept in step by a handler on the parent's immediate channel. Each
//! parent change is translated into the smallest equivalent local change:
//!
//! - `Add`: matching items are inserted where they fall in parent order.
//! - `Remove`: matching items are removed from their local position.
//! - `Replace`: the old and new item are tested separately; the view replaces,
//!   removes, adds, or does nothing accordingly.
//! - `Move`: a matching item is moved locally if its local position changes.
//! - `Reset`, or anything that does not line up with the local contents, is
//!   handled by rebuilding from the parent's contents.
//!
//! The view then raises its own notifications on both channels and
//! dispatches through the parent's sync operation.
//!
//! # Lifetime
//!
//! The parent holds the view's handler only through a weak reference, and
//! the view holds the parent subscription. Disposing (or dropping) the view
//! removes the subscription before teardown finishes, so a live parent never
//! reaches a dead view.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{
    ChangeNotifier, CollectionChange, CollectionNotifier, Items, NotifyCollectionChanged,
    NotifyPropertyChanged, StoreView, Subscription,
};

use super::core::{Changes, CollectionCore, Store};

type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

struct ViewInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<CollectionCore<Vec<T>>>,
    predicate: Predicate<T>,
    parent_subscription: Mutex<Option<Subscription>>,
}

/// A read-only list kept consistent with a live parent.
///
/// Created by `filter` on any container. Every mutation entry point fails
/// with [`CollectionError::NotSupported`].
pub struct FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ViewInner<T>>,
}

impl<T> FilteredView<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "FilteredView";

    pub(crate) fn attach<S>(parent: &CollectionCore<S>, predicate: Predicate<T>) -> Self
    where
        S: Store<Item = T>,
    {
        // Snapshot and subscribe under one read lock so no parent change can
        // fall between them.
        let inner = parent.read(|store| {
            let initial: Vec<T> = store
                .view()
                .to_vec()
                .into_iter()
                .filter(|item| predicate(item))
                .collect();
            let inner = Arc::new(ViewInner {
                core: Arc::new(CollectionCore::new(
                    Self::TYPE_NAME,
                    SyncOperation::delegating_to(parent.sync()),
                    initial,
                    true,
                )),
                predicate,
                parent_subscription: Mutex::new(None),
            });

            let weak = Arc::downgrade(&inner);
            let subscription = parent
                .notifier()
                .subscribe_collection_changed_immediate(move |change, view| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_parent_changed(change, view);
                    }
                });
            *inner.parent_subscription.lock() = Some(subscription);
            inner
        });

        debug!(
            parent = parent.type_name(),
            count = inner.core.len(),
            "filtered view attached"
        );
        Self { inner }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.inner.core.index_of(item)
    }

    /// A view over this view.
    pub fn filter<F>(&self, predicate: F) -> FilteredView<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        FilteredView::attach(&*self.inner.core, Arc::new(predicate))
    }

    /// Always fails: views are read-only.
    pub fn remove(&self, item: &T) -> Result<bool> {
        self.inner.core.remove_item(item)
    }
}

impl<T> FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Number of matching items.
    pub fn len(&self) -> usize {
        self.inner.core.len()
    }

    /// Whether there are no matching items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The matching item at local `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        self.inner.core.get(index)
    }

    /// Snapshot of the matching items in parent order.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.core.snapshot()
    }

    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.inner.core.read(|store| f(store))
    }

    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()> {
        self.inner.core.copy_to(dest, offset)
    }

    pub fn is_read_only(&self) -> bool {
        true
    }

    /// Whether the view still listens to its parent.
    pub fn is_attached(&self) -> bool {
        self.inner.parent_subscription.lock().is_some()
    }

    /// Always fails: views are read-only.
    pub fn push(&self, item: T) -> Result<()> {
        self.inner.core.insert_items("push", None, vec![item])
    }

    /// Always fails: views are read-only.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        self.inner.core.insert_items("insert", Some(index), vec![item])
    }

    /// Always fails: views are read-only.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.inner.core.set_item(index, item)
    }

    /// Always fails: views are read-only.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let mut removed = self.inner.core.remove_items("remove_at", index, 1)?;
        removed.pop().ok_or(CollectionError::IndexOutOfRange { index, len: 0 })
    }

    /// Always fails: views are read-only.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.inner.core.move_item(old_index, new_index)
    }

    /// Always fails: views are read-only.
    pub fn clear(&self) -> Result<()> {
        self.inner.core.clear_items()
    }
}

impl<T> ViewInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn matches(&self, item: &T) -> bool {
        (self.predicate)(item)
    }

    /// Number of parent items before `end` that pass the predicate; the local
    /// index of the parent position `end`.
    fn local_index(&self, parent: &dyn StoreView<T>, end: usize) -> usize {
        (0..end)
            .filter_map(|index| parent.item(index))
            .filter(|item| self.matches(item))
            .count()
    }

    fn on_parent_changed(&self, change: &CollectionChange<T>, parent: &dyn StoreView<T>) {
        if self.core.lifecycle().is_disposed_or_disposing() {
            return;
        }

        // Runs under the parent's write lock; the view's own lock is always
        // taken second.
        let applied = self.core.apply("sync", |local| {
            let changes = match self.translate(change, parent, local) {
                Some(changes) => changes,
                None => self.rebuild(parent, local),
            };
            Ok(((), changes))
        });

        if let Err(err) = applied {
            debug!(error = %err, "filtered view skipped parent change");
        }
    }

    /// Mirror `change` onto `local`. `None` means the change did not line up
    /// and the view must be rebuilt; `local` is untouched in that case.
    fn translate(
        &self,
        change: &CollectionChange<T>,
        parent: &dyn StoreView<T>,
        local: &mut Vec<T>,
    ) -> Option<Changes<T>> {
        let old_len = local.len();

        match change {
            CollectionChange::Add { items, index } => {
                let added: Items<T> = items.iter().filter(|item| self.matches(item)).cloned().collect();
                if added.is_empty() {
                    return Some(Changes::none());
                }
                let at = self.local_index(parent, *index);
                if at > old_len {
                    return None;
                }
                local.splice(at..at, added.iter().cloned());
                let change = CollectionChange::Add { items: added, index: at };
                Some(Changes::of(change, old_len, local.len()))
            }

            CollectionChange::Remove { items, index } => {
                let removed: Items<T> = items.iter().filter(|item| self.matches(item)).cloned().collect();
                if removed.is_empty() {
                    return Some(Changes::none());
                }
                let at = self.local_index(parent, *index);
                let end = at + removed.len();
                if end > old_len || local[at..end] != removed[..] {
                    return None;
                }
                local.drain(at..end);
                let change = CollectionChange::Remove { items: removed, index: at };
                Some(Changes::of(change, old_len, local.len()))
            }

            CollectionChange::Replace {
                old_items,
                new_items,
                index,
            } if old_items.len() == 1 && new_items.len() == 1 => {
                let (old, new) = (&old_items[0], &new_items[0]);
                let at = self.local_index(parent, *index);
                match (self.matches(old), self.matches(new)) {
                    (true, true) => {
                        if local.get(at) != Some(old) {
                            return None;
                        }
                        local[at] = new.clone();
                        let change = CollectionChange::replace(old.clone(), new.clone(), at);
                        Some(Changes::of(change, old_len, old_len))
                    }
                    (true, false) => {
                        if local.get(at) != Some(old) {
                            return None;
                        }
                        local.remove(at);
                        let change = CollectionChange::remove(old.clone(), at);
                        Some(Changes::of(change, old_len, local.len()))
                    }
                    (false, true) => {
                        if at > old_len {
                            return None;
                        }
                        local.insert(at, new.clone());
                        let change = CollectionChange::add(new.clone(), at);
                        Some(Changes::of(change, old_len, local.len()))
                    }
                    (false, false) => Some(Changes::none()),
                }
            }

            CollectionChange::Move {
                items,
                old_index,
                new_index,
            } if items.len() == 1 => {
                let item = &items[0];
                if !self.matches(item) {
                    return Some(Changes::none());
                }
                // Items between the two positions shifted by one; count the
                // moved item's predecessors as they were before the move.
                let local_old = if old_index <= new_index {
                    self.local_index(parent, *old_index)
                } else {
                    self.local_index(parent, old_index + 1) - 1
                };
                let local_new = self.local_index(parent, *new_index);
                if local.get(local_old) != Some(item) || local_new >= old_len {
                    return None;
                }
                if local_old == local_new {
                    return Some(Changes::none());
                }
                let moved = local.remove(local_old);
                local.insert(local_new, moved);
                let change = CollectionChange::moved(item.clone(), local_old, local_new);
                Some(Changes::of(change, old_len, old_len))
            }

            _ => None,
        }
    }

    fn rebuild(&self, parent: &dyn StoreView<T>, local: &mut Vec<T>) -> Changes<T> {
        let old_len = local.len();
        *local = parent
            .to_vec()
            .into_iter()
            .filter(|item| self.matches(item))
            .collect();
        debug!(old = old_len, new = local.len(), "filtered view rebuilt");
        Changes::of(CollectionChange::Reset, old_len, local.len())
    }
}

impl<T> Clone for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Disposable for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lifecycle(&self) -> &Lifecycle {
        self.inner.core.lifecycle()
    }

    fn dispose(&self) {
        self.inner.core.dispose_with(|| {
            if let Some(subscription) = self.inner.parent_subscription.lock().take() {
                subscription.unsubscribe();
            }
        });
    }
}

impl<T> HasSyncOperation for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn sync_operation(&self) -> &SyncOperation {
        self.inner.core.sync()
    }
}

impl<T> NotifyPropertyChanged for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn change_notifier(&self) -> &ChangeNotifier {
        self.inner.core.notifier().base()
    }
}

impl<T> NotifyCollectionChanged for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn collection_notifier(&self) -> &CollectionNotifier<T> {
        self.inner.core.notifier()
    }
}

impl<T> fmt::Debug for FilteredView<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilteredView")
            .field("count", &self.len())
            .field("attached", &self.is_attached())
            .field("state", &self.lifecycle().state())
            .finish()
    }
}
