//! Index-based observable list.

use std::fmt;
use std::sync::Arc;

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{
    ChangeNotifier, CollectionChange, CollectionNotifier, Items, NotifyCollectionChanged,
    NotifyPropertyChanged,
};

use super::core::{skip_disposed, Changes, CollectionCore};
use super::filtered::FilteredView;

// ----------------------------------------------------------------------------
// List primitives shared by lists, queues, stacks and filtered views
// ----------------------------------------------------------------------------

impl<T> CollectionCore<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn get(&self, index: usize) -> Result<T> {
        let store = self.read_guard();
        CollectionError::check_index(index, store.len(), false)?;
        Ok(store[index].clone())
    }

    /// Insert `items` at `index`, or at the end when `index` is `None`.
    pub(crate) fn insert_items(
        &self,
        operation: &'static str,
        index: Option<usize>,
        items: Vec<T>,
    ) -> Result<()> {
        self.mutate(operation, |store| {
            let old_len = store.len();
            let index = index.unwrap_or(old_len);
            CollectionError::check_index(index, old_len, true)?;
            if items.is_empty() {
                return Ok(((), Changes::none()));
            }

            store.splice(index..index, items.iter().cloned());
            let change = CollectionChange::Add {
                items: Items::from_vec(items),
                index,
            };
            Ok(((), Changes::of(change, old_len, store.len())))
        })
    }

    /// Remove `count` items starting at `index`.
    pub(crate) fn remove_items(
        &self,
        operation: &'static str,
        index: usize,
        count: usize,
    ) -> Result<Vec<T>> {
        self.mutate(operation, |store| {
            let old_len = store.len();
            CollectionError::check_range(index, count, old_len)?;
            if count == 0 {
                return Ok((Vec::new(), Changes::none()));
            }

            let removed: Vec<T> = store.drain(index..index + count).collect();
            let change = CollectionChange::Remove {
                items: removed.iter().cloned().collect(),
                index,
            };
            Ok((removed, Changes::of(change, old_len, store.len())))
        })
    }

    /// Remove the first item, failing on an empty store.
    pub(crate) fn remove_first(&self, operation: &'static str) -> Result<T> {
        self.mutate(operation, |store| {
            if store.is_empty() {
                return Err(CollectionError::EmptyContainer {
                    type_name: self.type_name(),
                });
            }
            let old_len = store.len();
            let item = store.remove(0);
            let change = CollectionChange::remove(item.clone(), 0);
            Ok((item, Changes::of(change, old_len, store.len())))
        })
    }

    pub(crate) fn first(&self) -> Result<T> {
        let store = self.read_guard();
        match store.first() {
            Some(item) => Ok(item.clone()),
            None => {
                self.lifecycle().verify_not_disposing()?;
                Err(CollectionError::EmptyContainer {
                    type_name: self.type_name(),
                })
            }
        }
    }

    pub(crate) fn set_item(&self, index: usize, item: T) -> Result<T> {
        self.mutate("set", |store| {
            CollectionError::check_index(index, store.len(), false)?;
            let old = std::mem::replace(&mut store[index], item.clone());
            let len = store.len();
            let change = CollectionChange::replace(old.clone(), item, index);
            Ok((old, Changes::of(change, len, len)))
        })
    }

    pub(crate) fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        self.mutate("move_item", |store| {
            let len = store.len();
            CollectionError::check_index(old_index, len, false)?;
            CollectionError::check_index(new_index, len, false)?;
            if old_index == new_index {
                return Ok(((), Changes::none()));
            }

            let item = store.remove(old_index);
            store.insert(new_index, item.clone());
            let change = CollectionChange::moved(item, old_index, new_index);
            Ok(((), Changes::of(change, len, len)))
        })
    }

    pub(crate) fn clear_items(&self) -> Result<()> {
        self.mutate("clear", |store| {
            let old_len = store.len();
            if old_len == 0 {
                return Ok(((), Changes::none()));
            }
            store.clear();
            Ok(((), Changes::of(CollectionChange::Reset, old_len, 0)))
        })
    }

    pub(crate) fn reset_items(&self, items: Vec<T>) -> Result<()> {
        self.mutate("reset", |store| {
            let old_len = store.len();
            *store = items;
            Ok(((), Changes::of(CollectionChange::Reset, old_len, store.len())))
        })
    }

    pub(crate) fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()> {
        let store = self.read_guard();
        let end = offset
            .checked_add(store.len())
            .filter(|end| *end <= dest.len())
            .ok_or_else(|| {
                CollectionError::argument(
                    "dest",
                    format!(
                        "{} item(s) do not fit at offset {offset} of a slice of length {}",
                        store.len(),
                        dest.len()
                    ),
                )
            })?;
        dest[offset..end].clone_from_slice(&store);
        Ok(())
    }
}

impl<T> CollectionCore<Vec<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn index_of(&self, item: &T) -> Option<usize> {
        self.read_guard().iter().position(|existing| existing == item)
    }

    /// Remove the first occurrence of `item`, if present.
    pub(crate) fn remove_item(&self, item: &T) -> Result<bool> {
        let removed = self.mutate_if(
            "remove",
            |store| Ok(store.iter().position(|existing| existing == item)),
            |store, index| {
                let old_len = store.len();
                let removed = store.remove(index);
                let change = CollectionChange::remove(removed, index);
                Ok(((), Changes::of(change, old_len, store.len())))
            },
        )?;
        Ok(removed.is_some())
    }
}

// ----------------------------------------------------------------------------
// ObservableList
// ----------------------------------------------------------------------------

/// A thread-safe list that reports every change.
///
/// Cloning the list clones the handle; clones share contents and
/// subscribers.
///
/// # Example
///
/// ```rust
/// use concord_core::collections::ObservableList;
/// use concord_core::dispatch::SyncOperation;
///
/// let list = ObservableList::new(SyncOperation::inline());
/// list.insert(0, "a").unwrap();
/// list.insert(1, "b").unwrap();
/// list.move_item(0, 1).unwrap();
/// assert_eq!(list.to_vec(), vec!["b", "a"]);
/// ```
pub struct ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<CollectionCore<Vec<T>>>,
}

impl<T> ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "ObservableList";

    /// Create an empty list dispatching through `sync`.
    pub fn new(sync: SyncOperation) -> Self {
        Self::from_items(sync, Vec::new())
    }

    /// Create a list holding `items`.
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

    /// Number of items.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether there are no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Item at `index`. Bounds are checked even after disposal.
    pub fn get(&self, index: usize) -> Result<T> {
        self.core.get(index)
    }

    /// Snapshot of the contents.
    pub fn to_vec(&self) -> Vec<T> {
        self.core.snapshot()
    }

    /// Iterate over a snapshot of the contents.
    pub fn iter(&self) -> std::vec::IntoIter<T> {
        self.to_vec().into_iter()
    }

    /// Inspect the contents under the read lock.
    pub fn with_read<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        self.core.read(|store| f(store))
    }

    /// Copy the contents into `dest` starting at `offset`.
    pub fn copy_to(&self, dest: &mut [T], offset: usize) -> Result<()> {
        self.core.copy_to(dest, offset)
    }

    /// Append `item`.
    pub fn push(&self, item: T) -> Result<()> {
        skip_disposed(self.core.insert_items("push", None, vec![item]))
    }

    /// Append `items` as one change.
    pub fn add_range<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        skip_disposed(self.core.insert_items("add_range", None, items.into_iter().collect()))
    }

    /// Insert `item` at `index`; `index == len` appends.
    pub fn insert(&self, index: usize, item: T) -> Result<()> {
        skip_disposed(self.core.insert_items("insert", Some(index), vec![item]))
    }

    /// Insert `items` at `index` as one change.
    pub fn insert_range<I>(&self, index: usize, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        skip_disposed(self.core.insert_items(
            "insert_range",
            Some(index),
            items.into_iter().collect(),
        ))
    }

    /// Replace the item at `index`, returning the previous one.
    pub fn set(&self, index: usize, item: T) -> Result<T> {
        self.core.set_item(index, item)
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<T> {
        let mut removed = self.core.remove_items("remove_at", index, 1)?;
        removed.pop().ok_or(CollectionError::IndexOutOfRange { index, len: 0 })
    }

    /// Remove `count` items starting at `index` as one change.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<T>> {
        skip_disposed(self.core.remove_items("remove_range", index, count))
    }

    /// Remove every item matching `predicate`.
    ///
    /// Raises one `Remove` when the removed items were contiguous, otherwise
    /// one `Reset`. Returns how many items were removed.
    pub fn remove_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&T) -> bool,
    {
        skip_disposed(self.core.mutate("remove_where", |store| {
            let old_len = store.len();
            let Some(first) = store.iter().position(&predicate) else {
                return Ok((0, Changes::none()));
            };

            let mut removed = Items::new();
            let mut kept = Vec::with_capacity(old_len);
            let mut contiguous = true;
            let mut run_open = true;
            for (index, item) in std::mem::take(store).into_iter().enumerate() {
                if index >= first && predicate(&item) {
                    contiguous &= run_open;
                    removed.push(item);
                } else {
                    if index > first {
                        run_open = false;
                    }
                    kept.push(item);
                }
            }
            *store = kept;

            let count = removed.len();
            let change = if contiguous {
                CollectionChange::Remove {
                    items: removed,
                    index: first,
                }
            } else {
                CollectionChange::Reset
            };
            Ok((count, Changes::of(change, old_len, store.len())))
        }))
    }

    /// Move the item at `old_index` so it ends up at `new_index`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<()> {
        skip_disposed(self.core.move_item(old_index, new_index))
    }

    /// Remove every item as one `Reset`.
    pub fn clear(&self) -> Result<()> {
        skip_disposed(self.core.clear_items())
    }

    /// Replace the whole contents as one `Reset`.
    pub fn reset<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        skip_disposed(self.core.reset_items(items.into_iter().collect()))
    }

    pub fn is_read_only(&self) -> bool {
        self.core.is_read_only()
    }
}

impl<T> ObservableList<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn contains(&self, item: &T) -> bool {
        self.index_of(item).is_some()
    }

    /// Index of the first item equal to `item`.
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.core.index_of(item)
    }

    /// Remove the first occurrence of `item`. Returns whether one was found.
    pub fn remove(&self, item: &T) -> Result<bool> {
        skip_disposed(self.core.remove_item(item))
    }

    /// A live, read-only view of the items matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> FilteredView<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        FilteredView::attach(&*self.core, Arc::new(predicate))
    }
}

impl<T> Clone for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Disposable for ObservableList<T>
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

impl<T> HasSyncOperation for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn sync_operation(&self) -> &SyncOperation {
        self.core.sync()
    }
}

impl<T> NotifyPropertyChanged for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn change_notifier(&self) -> &ChangeNotifier {
        self.core.notifier().base()
    }
}

impl<T> NotifyCollectionChanged for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;

    fn collection_notifier(&self) -> &CollectionNotifier<T> {
        self.core.notifier()
    }
}

impl<T> fmt::Debug for ObservableList<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
