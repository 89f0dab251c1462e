//! LIFO observable stack.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{ChangeNotifier, CollectionNotifier, NotifyCollectionChanged, NotifyPropertyChanged};

use super::core::{skip_disposed, CollectionCore};
use super::filtered::FilteredView;

/// A thread-safe last-in first-out stack.
///
/// The top is index 0: `push` raises `Add` at 0 and `pop` raises `Remove`
/// at 0.
pub struct ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<CollectionCore<Vec<T>>>,
}

impl<T> ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "ObservableStack";

    /// Create an empty stack that dispatches through `sync`.
    pub fn new(sync: SyncOperation) -> Self {
        Self::from_items(sync, Vec::new())
    }

    /// Create a stack by pushing `items` in order; the last ends on top.
    pub fn from_items<I>(sync: SyncOperation, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut items: Vec<T> = items.into_iter().collect();
        items.reverse();
        Self {
            core: Arc::new(CollectionCore::new(Self::TYPE_NAME, sync, items, false)),
        }
    }

    /// Number of items on the stack.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether there are no items on the stack.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in pop order.
    pub fn to_vec(&self) -> Vec<T> {
        self.core.snapshot()
    }

    /// Push `item` on top.
    pub fn push(&self, item: T) -> Result<()> {
        skip_disposed(self.core.insert_items("push", Some(0), vec![item]))
    }

    /// Push `items` in order as one change; the last ends on top.
    pub fn push_range<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let mut items: Vec<T> = items.into_iter().collect();
        items.reverse();
        skip_disposed(self.core.insert_items("push_range", Some(0), items))
    }

    /// Remove and return the top. Fails with
    /// [`CollectionError::EmptyContainer`] on an empty stack.
    pub fn pop(&self) -> Result<T> {
        self.core.remove_first("pop")
    }

    /// Remove and return the top, if any.
    pub fn try_pop(&self) -> Result<Option<T>> {
        match self.core.remove_first("pop") {
            Ok(item) => Ok(Some(item)),
            Err(CollectionError::EmptyContainer { .. }) => Ok(None),
            Err(err) => skip_disposed(Err(err)),
        }
    }

    /// The top, without removing it.
    pub fn peek(&self) -> Result<T> {
        self.core.first()
    }

    /// The top, if any.
    pub fn try_peek(&self) -> Option<T> {
        self.core.read(|store| store.first().cloned())
    }

    /// Remove every item as one `Reset`.
    pub fn clear(&self) -> Result<()> {
        skip_disposed(self.core.clear_items())
    }
}

impl<T> ObservableStack<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Whether `item` is on the stack.
    pub fn contains(&self, item: &T) -> bool {
        self.core.index_of(item).is_some()
    }

    /// A live, read-only view of the stacked items matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> FilteredView<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        FilteredView::attach(&*self.core, Arc::new(predicate))
    }
}

impl<T> Clone for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Disposable for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn dispose(&self) {
        self.core.dispose_with(|| {});
    }
}

impl<T> HasSyncOperation for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn sync_operation(&self) -> &SyncOperation {
        self.core.sync()
    }
}

impl<T> NotifyPropertyChanged for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn change_notifier(&self) -> &ChangeNotifier {
        self.core.notifier().base()
    }
}

impl<T> NotifyCollectionChanged for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn collection_notifier(&self) -> &CollectionNotifier<T> {
        self.core.notifier()
    }
}

impl<T> fmt::Debug for ObservableStack<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}
