//! FIFO observable queue.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{ChangeNotifier, CollectionNotifier, NotifyCollectionChanged, NotifyPropertyChanged};

use super::core::{skip_disposed, CollectionCore};
use super::filtered::FilteredView;

/// A thread-safe first-in first-out queue.
///
/// Items enter at the tail (raising `Add` at the last index) and leave from
/// the head (raising `Remove` at index 0).
pub struct ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<CollectionCore<Vec<T>>>,
}

impl<T> ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "ObservableQueue";

    /// Create an empty queue that dispatches through `sync`.
    pub fn new(sync: SyncOperation) -> Self {
        Self::from_items(sync, Vec::new())
    }

    /// Create a queue holding `items`, the first at the head.
    pub fn from_items<I>(sync: SyncOperation, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            core: Arc::new(CollectionCore::new(
                Self::TYPE_NAME,
                sync,
                items.into_iter().collect(),
                false,
            )),
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether there are no queued items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot in dequeue order.
    pub fn to_vec(&self) -> Vec<T> {
        self.core.snapshot()
    }

    /// Add `item` at the tail.
    pub fn enqueue(&self, item: T) -> Result<()> {
        skip_disposed(self.core.insert_items("enqueue", None, vec![item]))
    }

    /// Enqueue `items` in order as one change.
    pub fn enqueue_range<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        skip_disposed(self.core.insert_items("enqueue_range", None, items.into_iter().collect()))
    }

    /// Remove and return the head. Fails with
    /// [`CollectionError::EmptyContainer`] on an empty queue.
    pub fn dequeue(&self) -> Result<T> {
        self.core.remove_first("dequeue")
    }

    /// Remove and return the head, if any.
    pub fn try_dequeue(&self) -> Result<Option<T>> {
        match self.core.remove_first("dequeue") {
            Ok(item) => Ok(Some(item)),
            Err(CollectionError::EmptyContainer { .. }) => Ok(None),
            Err(err) => skip_disposed(Err(err)),
        }
    }

    /// The head, without removing it.
    pub fn peek(&self) -> Result<T> {
        self.core.first()
    }

    /// The head, if any.
    pub fn try_peek(&self) -> Option<T> {
        self.core.read(|store| store.first().cloned())
    }

    /// Remove every item as one `Reset`.
    pub fn clear(&self) -> Result<()> {
        skip_disposed(self.core.clear_items())
    }
}

impl<T> ObservableQueue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Whether `item` is queued.
    pub fn contains(&self, item: &T) -> bool {
        self.core.index_of(item).is_some()
    }

    /// A live, read-only view of the queued items matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> FilteredView<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        FilteredView::attach(&*self.core, Arc::new(predicate))
    }
}

impl<T> Clone for ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Disposable for ObservableQueue<T>
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

impl<T> HasSyncOperation for ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn sync_operation(&self) -> &SyncOperation {
        self.core.sync()
    }
}

impl<T> NotifyPropertyChanged for ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn change_notifier(&self) -> &ChangeNotifier {
        self.core.notifier().base()
    }
}

impl<T> NotifyCollectionChanged for ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn collection_notifier(&self) -> &CollectionNotifier<T> {
        self.core.notifier()
    }
}

impl<T> fmt::Debug for ObservableQueue<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}
