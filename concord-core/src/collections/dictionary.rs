//! Key/value observable dictionary.
//!
//! Entries live in an [`IndexMap`], so every entry has a position and change
//! events carry `(key, value)` pairs with the index they occupy. Removal
//! shifts later entries down, keeping indices dense.
//!
//! Every check-then-act operation (`add`, `get_or_add`, `add_or_update`,
//! `try_update`, ...) runs its check and its write under one lock
//! acquisition.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::dispatch::{HasSyncOperation, SyncOperation};
use crate::error::{CollectionError, Result};
use crate::lifecycle::{Disposable, Lifecycle};
use crate::notify::{
    ChangeNotifier, CollectionChange, CollectionNotifier, NotifyCollectionChanged,
    NotifyPropertyChanged, PropertyChanged, StoreView,
};

use super::core::{skip_disposed, Changes, CollectionCore, Store};
use super::filtered::FilteredView;

impl<K, V> StoreView<(K, V)> for IndexMap<K, V>
where
    K: Clone,
    V: Clone,
{
    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn item(&self, index: usize) -> Option<(K, V)> {
        self.get_index(index)
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    fn to_vec(&self) -> Vec<(K, V)> {
        self.iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl<K, V> Store for IndexMap<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, V);

    fn view(&self) -> &dyn StoreView<(K, V)> {
        self
    }

    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn clear_silently(&mut self) {
        self.clear();
    }
}

/// An entry was added: the count moved and both key and value sets changed.
fn added<K, V>(key: K, value: V, index: usize, old_len: usize) -> Changes<(K, V)> {
    Changes::of(CollectionChange::add((key, value), index), old_len, old_len + 1)
        .with_property(PropertyChanged::KEYS)
        .with_property(PropertyChanged::VALUES)
}

fn removed<K, V>(key: K, value: V, index: usize, old_len: usize) -> Changes<(K, V)> {
    Changes::of(CollectionChange::remove((key, value), index), old_len, old_len - 1)
        .with_property(PropertyChanged::KEYS)
        .with_property(PropertyChanged::VALUES)
}

fn replaced<K: Clone, V>(key: &K, old: V, new: V, index: usize, len: usize) -> Changes<(K, V)> {
    let change = CollectionChange::replace((key.clone(), old), (key.clone(), new), index);
    Changes::of(change, len, len).with_property(PropertyChanged::VALUES)
}

/// A thread-safe map with unique keys that reports every change.
///
/// # Example
///
/// ```rust
/// use concord_core::collections::ObservableDictionary;
/// use concord_core::dispatch::SyncOperation;
///
/// let dict = ObservableDictionary::new(SyncOperation::inline());
/// dict.add("k", 1).unwrap();
/// assert!(dict.add("k", 2).is_err());
/// assert_eq!(dict.add_or_update("k", 0, |v| v + 10).unwrap(), 11);
/// ```
pub struct ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    core: Arc<CollectionCore<IndexMap<K, V>>>,
}

impl<K, V> ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    const TYPE_NAME: &'static str = "ObservableDictionary";

    /// Create an empty dictionary that dispatches through `sync`.
    pub fn new(sync: SyncOperation) -> Self {
        Self::from_items(sync, Vec::new())
    }

    /// Create a dictionary holding `entries`; a repeated key keeps the last
    /// value at the first key's position.
    pub fn from_items<I>(sync: SyncOperation, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            core: Arc::new(CollectionCore::new(
                Self::TYPE_NAME,
                sync,
                entries.into_iter().collect(),
                false,
            )),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.read(|map| map.contains_key(key))
    }

    /// A clone of the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.core.read(|map| map.get(key).cloned())
    }

    /// Keys in entry order.
    pub fn keys(&self) -> Vec<K> {
        self.core.read(|map| map.keys().cloned().collect())
    }

    /// Values in entry order.
    pub fn values(&self) -> Vec<V> {
        self.core.read(|map| map.values().cloned().collect())
    }

    /// Snapshot of every entry in order.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.core.snapshot()
    }

    pub fn with_read<R>(&self, f: impl FnOnce(&IndexMap<K, V>) -> R) -> R {
        self.core.read(f)
    }

    /// Add a new entry. Fails with [`CollectionError::DuplicateKey`] if
    /// `key` is present.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        skip_disposed(self.core.mutate("add", |map| {
            if map.contains_key(&key) {
                return Err(CollectionError::DuplicateKey {
                    key: format!("{key:?}"),
                });
            }
            let old_len = map.len();
            let (index, _) = map.insert_full(key.clone(), value.clone());
            Ok(((), added(key, value, index, old_len)))
        }))
    }

    /// Add a new entry unless `key` is present. Returns whether it was added.
    pub fn try_add(&self, key: K, value: V) -> Result<bool> {
        skip_disposed(self.core.mutate("try_add", |map| {
            if map.contains_key(&key) {
                return Ok((false, Changes::none()));
            }
            let old_len = map.len();
            let (index, _) = map.insert_full(key.clone(), value.clone());
            Ok((true, added(key, value, index, old_len)))
        }))
    }

    /// The value under `key`, adding `value` first if the key is absent.
    pub fn get_or_add(&self, key: K, value: V) -> Result<V> {
        self.get_or_add_with(key, |_| value)
    }

    /// The value under `key`, adding `factory(&key)` first if the key is
    /// absent. The factory runs under the write lock.
    pub fn get_or_add_with<F>(&self, key: K, factory: F) -> Result<V>
    where
        F: FnOnce(&K) -> V,
    {
        self.core.mutate("get_or_add", |map| {
            if let Some(existing) = map.get(&key) {
                return Ok((existing.clone(), Changes::none()));
            }
            let value = factory(&key);
            let old_len = map.len();
            let (index, _) = map.insert_full(key.clone(), value.clone());
            Ok((value.clone(), added(key, value, index, old_len)))
        })
    }

    /// Add `value` if `key` is absent, otherwise replace the current value
    /// with `update(&current)`. Returns the value now stored.
    pub fn add_or_update<F>(&self, key: K, value: V, update: F) -> Result<V>
    where
        F: FnOnce(&V) -> V,
    {
        self.add_or_update_with(key, |_| value, |_, current| update(current))
    }

    /// [`add_or_update`](Self::add_or_update) with a value factory for the
    /// add case.
    pub fn add_or_update_with<A, U>(&self, key: K, add: A, update: U) -> Result<V>
    where
        A: FnOnce(&K) -> V,
        U: FnOnce(&K, &V) -> V,
    {
        self.core.mutate("add_or_update", |map| {
            let old_len = map.len();
            match map.get_full_mut(&key) {
                Some((index, _, current)) => {
                    let new = update(&key, current);
                    let old = std::mem::replace(current, new.clone());
                    Ok((new.clone(), replaced(&key, old, new, index, old_len)))
                }
                None => {
                    let value = add(&key);
                    let (index, _) = map.insert_full(key.clone(), value.clone());
                    Ok((value.clone(), added(key, value, index, old_len)))
                }
            }
        })
    }

    /// Add or replace the entry for `key`. Returns the previous value.
    pub fn set(&self, key: K, value: V) -> Result<Option<V>> {
        skip_disposed(self.core.mutate("set", |map| {
            let old_len = map.len();
            match map.get_full_mut(&key) {
                Some((index, _, current)) => {
                    let old = std::mem::replace(current, value.clone());
                    Ok((Some(old.clone()), replaced(&key, old, value, index, old_len)))
                }
                None => {
                    let (index, _) = map.insert_full(key.clone(), value.clone());
                    Ok((None, added(key, value, index, old_len)))
                }
            }
        }))
    }

    /// Replace the value under `key` with `value` if `validator` accepts the
    /// current one. Returns whether it was replaced.
    pub fn try_update_with<F>(&self, key: &K, value: V, validator: F) -> Result<bool>
    where
        F: FnOnce(&V) -> bool,
    {
        let updated = self.core.mutate_if(
            "try_update",
            |map| {
                Ok(map
                    .get_full(key)
                    .filter(|&(_, _, current)| validator(current))
                    .map(|(index, _, _)| index))
            },
            |map, index| {
                let len = map.len();
                let Some((_, current)) = map.get_index_mut(index) else {
                    return Ok(((), Changes::none()));
                };
                let old = std::mem::replace(current, value.clone());
                Ok(((), replaced(key, old, value, index, len)))
            },
        );
        skip_disposed(updated.map(|outcome| outcome.is_some()))
    }

    /// Remove the entry for `key`. Returns whether one was present.
    pub fn remove<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        Ok(self.try_remove(key)?.is_some())
    }

    /// Remove the entry for `key`, returning its value.
    pub fn try_remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        skip_disposed(self.core.mutate_if(
            "remove",
            |map| Ok(map.get_index_of(key)),
            |map, index| {
                let old_len = map.len();
                let Some((key, value)) = map.shift_remove_index(index) else {
                    return Ok((None, Changes::none()));
                };
                let changes = removed(key, value.clone(), index, old_len);
                Ok((Some(value), changes))
            },
        ))
        .map(Option::flatten)
    }

    /// Remove every entry as one `Reset`.
    pub fn clear(&self) -> Result<()> {
        skip_disposed(self.core.mutate("clear", |map| {
            let old_len = map.len();
            if old_len == 0 {
                return Ok(((), Changes::none()));
            }
            map.clear();
            let changes = Changes::of(CollectionChange::Reset, old_len, 0)
                .with_property(PropertyChanged::KEYS)
                .with_property(PropertyChanged::VALUES);
            Ok(((), changes))
        }))
    }

    pub fn is_read_only(&self) -> bool {
        self.core.is_read_only()
    }
}

impl<K, V> ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Replace the value under `key` with `value` if the current value equals
    /// `comparison`.
    pub fn try_update(&self, key: &K, value: V, comparison: &V) -> Result<bool> {
        self.try_update_with(key, value, |current| current == comparison)
    }

    /// A live, read-only view of the entries matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> FilteredView<(K, V)>
    where
        F: Fn(&(K, V)) -> bool + Send + Sync + 'static,
    {
        FilteredView::attach(&*self.core, Arc::new(predicate))
    }
}

impl<K, V> Clone for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, V> Disposable for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lifecycle(&self) -> &Lifecycle {
        self.core.lifecycle()
    }

    fn dispose(&self) {
        self.core.dispose_with(|| {});
    }
}

impl<K, V> HasSyncOperation for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn sync_operation(&self) -> &SyncOperation {
        self.core.sync()
    }
}

impl<K, V> NotifyPropertyChanged for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn change_notifier(&self) -> &ChangeNotifier {
        self.core.notifier().base()
    }
}

impl<K, V> NotifyCollectionChanged for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = (K, V);

    fn collection_notifier(&self) -> &CollectionNotifier<(K, V)> {
        self.core.notifier()
    }
}

impl<K, V> fmt::Debug for ObservableDictionary<K, V>
where
    K: Clone + Hash + Eq + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Subscription;
    use parking_lot::Mutex;

    type Dict = ObservableDictionary<String, String>;

    fn dict() -> Dict {
        ObservableDictionary::new(SyncOperation::inline())
    }

    fn recorded(dict: &Dict) -> (Arc<Mutex<Vec<CollectionChange<(String, String)>>>>, Subscription) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let sub = dict.subscribe_collection_changed_immediate(move |change, _| {
            log_clone.lock().push(change.clone());
        });
        (log, sub)
    }

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn add_rejects_duplicate_keys() {
        let dict = dict();
        dict.add("k".into(), "v1".into()).unwrap();

        let err = dict.add("k".into(), "v2".into()).unwrap_err();
        assert_eq!(
            err,
            CollectionError::DuplicateKey {
                key: "\"k\"".to_string()
            }
        );
        assert_eq!(dict.get("k"), Some("v1".to_string()));
        assert!(!dict.try_add("k".into(), "v3".into()).unwrap());
    }

    #[test]
    fn add_or_update_adds_then_updates() {
        let dict = dict();
        let update = |prev: &String| format!("{prev}x");

        assert_eq!(dict.add_or_update("k".into(), "v1".into(), update).unwrap(), "v1");
        assert_eq!(dict.add_or_update("k".into(), "v1".into(), update).unwrap(), "v1x");
        assert_eq!(dict.get("k").as_deref(), Some("v1x"));
    }

    #[test]
    fn events_carry_entry_and_index() {
        let dict = dict();
        let (log, _sub) = recorded(&dict);

        dict.add("a".into(), "1".into()).unwrap();
        dict.add("b".into(), "2".into()).unwrap();
        dict.set("a".into(), "3".into()).unwrap();
        dict.remove("a").unwrap();

        assert_eq!(
            *log.lock(),
            vec![
                CollectionChange::add(pair("a", "1"), 0),
                CollectionChange::add(pair("b", "2"), 1),
                CollectionChange::replace(pair("a", "1"), pair("a", "3"), 0),
                CollectionChange::remove(pair("a", "3"), 0),
            ]
        );
        assert_eq!(dict.keys(), vec!["b".to_string()]);
    }

    #[test]
    fn property_names_follow_mutation_kind() {
        let dict = dict();
        let names = Arc::new(Mutex::new(Vec::new()));
        let names_clone = names.clone();
        let _sub = dict.subscribe_property_changed_immediate(move |change| {
            names_clone.lock().push(change.name().to_string());
        });

        dict.add("a".into(), "1".into()).unwrap();
        assert_eq!(*names.lock(), vec!["Count", "Item[]", "Keys", "Values"]);

        names.lock().clear();
        dict.set("a".into(), "2".into()).unwrap();
        assert_eq!(*names.lock(), vec!["Item[]", "Values"]);
    }

    #[test]
    fn get_or_add_runs_factory_once() {
        let dict: ObservableDictionary<&str, usize> = ObservableDictionary::new(SyncOperation::inline());
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let factory = |key: &&str| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            key.len()
        };

        assert_eq!(dict.get_or_add_with("four", factory).unwrap(), 4);
        assert_eq!(dict.get_or_add_with("four", factory).unwrap(), 4);
        assert_eq!(dict.get_or_add("four", 99).unwrap(), 4);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn try_update_checks_current_value() {
        let dict = dict();
        dict.add("k".into(), "old".into()).unwrap();
        let (log, _sub) = recorded(&dict);

        assert!(!dict.try_update(&"k".into(), "new".into(), &"other".into()).unwrap());
        assert!(!dict.try_update(&"missing".into(), "new".into(), &"old".into()).unwrap());
        assert!(log.lock().is_empty());

        assert!(dict.try_update(&"k".into(), "new".into(), &"old".into()).unwrap());
        assert!(dict
            .try_update_with(&"k".into(), "newer".into(), |current| current.starts_with("new"))
            .unwrap());
        assert_eq!(dict.get("k").as_deref(), Some("newer"));
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn removal_keeps_indices_dense() {
        let dict = ObservableDictionary::from_items(SyncOperation::inline(), [(1, 'a'), (2, 'b'), (3, 'c')]);
        assert_eq!(dict.try_remove(&2).unwrap(), Some('b'));
        assert_eq!(dict.try_remove(&2).unwrap(), None);
        assert_eq!(dict.to_vec(), vec![(1, 'a'), (3, 'c')]);
        dict.with_read(|map| assert_eq!(map.get_index_of(&3), Some(1)));
    }

    #[test]
    fn filtered_dictionary_tracks_entries() {
        let dict = ObservableDictionary::from_items(SyncOperation::inline(), [(1, 10), (2, 25), (3, 30)]);
        let big = dict.filter(|(_, v)| *v >= 25);
        assert_eq!(big.to_vec(), vec![(2, 25), (3, 30)]);

        dict.set(1, 40).unwrap();
        dict.set(2, 5).unwrap();
        dict.remove(&3).unwrap();
        assert_eq!(big.to_vec(), vec![(1, 40)]);
    }

    #[test]
    fn disposed_dictionary_is_inert() {
        let dict = dict();
        dict.add("k".into(), "v".into()).unwrap();
        dict.dispose();

        assert!(dict.is_empty());
        assert_eq!(dict.add("k".into(), "v".into()), Ok(()));
        assert_eq!(dict.remove("k"), Ok(false));
        assert_eq!(dict.set("k".into(), "v".into()), Ok(None));
        assert!(matches!(
            dict.get_or_add("k".into(), "v".into()),
            Err(CollectionError::Disposed(_))
        ));
    }
}
