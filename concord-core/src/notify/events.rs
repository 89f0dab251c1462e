//! Change payloads.

use std::borrow::Cow;

use serde::Serialize;
use smallvec::SmallVec;

/// Items carried by a change. One item is stored inline.
pub type Items<T> = SmallVec<[T; 1]>;

/// The kind of a [`CollectionChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Move,
    Reset,
}

/// A structured description of one container mutation.
///
/// Every variant except `Reset` carries the exact items and indices of the
/// change. `Reset` means the contents should be treated as fully rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action")]
pub enum CollectionChange<T> {
    /// `items` were inserted, the first landing at `index`.
    Add { items: Items<T>, index: usize },

    /// `items` were removed, the first having been at `index`.
    Remove { items: Items<T>, index: usize },

    /// `old_items` starting at `index` were replaced by `new_items`.
    Replace {
        old_items: Items<T>,
        new_items: Items<T>,
        index: usize,
    },

    /// `items` moved from `old_index` to `new_index`.
    Move {
        items: Items<T>,
        old_index: usize,
        new_index: usize,
    },

    /// The contents changed wholesale.
    Reset,
}

impl<T> CollectionChange<T> {
    pub fn add(item: T, index: usize) -> Self {
        Self::Add {
            items: smallvec::smallvec![item],
            index,
        }
    }

    pub fn remove(item: T, index: usize) -> Self {
        Self::Remove {
            items: smallvec::smallvec![item],
            index,
        }
    }

    pub fn replace(old_item: T, new_item: T, index: usize) -> Self {
        Self::Replace {
            old_items: smallvec::smallvec![old_item],
            new_items: smallvec::smallvec![new_item],
            index,
        }
    }

    pub fn moved(item: T, old_index: usize, new_index: usize) -> Self {
        Self::Move {
            items: smallvec::smallvec![item],
            old_index,
            new_index,
        }
    }

    pub fn action(&self) -> ChangeAction {
        match self {
            Self::Add { .. } => ChangeAction::Add,
            Self::Remove { .. } => ChangeAction::Remove,
            Self::Replace { .. } => ChangeAction::Replace,
            Self::Move { .. } => ChangeAction::Move,
            Self::Reset => ChangeAction::Reset,
        }
    }

    /// Items present after the change (added, replacing or moved).
    pub fn new_items(&self) -> &[T] {
        match self {
            Self::Add { items, .. } | Self::Move { items, .. } => items,
            Self::Replace { new_items, .. } => new_items,
            Self::Remove { .. } | Self::Reset => &[],
        }
    }

    /// Items affected as they were before the change (removed, replaced or
    /// moved).
    pub fn old_items(&self) -> &[T] {
        match self {
            Self::Remove { items, .. } | Self::Move { items, .. } => items,
            Self::Replace { old_items, .. } => old_items,
            Self::Add { .. } | Self::Reset => &[],
        }
    }

    pub fn new_index(&self) -> Option<usize> {
        match self {
            Self::Add { index, .. } | Self::Replace { index, .. } => Some(*index),
            Self::Move { new_index, .. } => Some(*new_index),
            Self::Remove { .. } | Self::Reset => None,
        }
    }

    pub fn old_index(&self) -> Option<usize> {
        match self {
            Self::Remove { index, .. } | Self::Replace { index, .. } => Some(*index),
            Self::Move { old_index, .. } => Some(*old_index),
            Self::Add { .. } | Self::Reset => None,
        }
    }
}

/// A named property changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PropertyChanged {
    name: Cow<'static, str>,
}

impl PropertyChanged {
    /// Raised when the number of items changes.
    pub const COUNT: &'static str = "Count";
    /// Raised whenever any item changes.
    pub const INDEXER: &'static str = "Item[]";
    /// Raised by dictionaries when the key set changes.
    pub const KEYS: &'static str = "Keys";
    /// Raised by dictionaries when any value changes.
    pub const VALUES: &'static str = "Values";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Read-only access to a backing store as it stands after a change.
///
/// Immediate collection handlers receive one of these because they run while
/// the container's write lock is held and must not call back into the
/// container.
pub trait StoreView<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clone of the item at `index`.
    fn item(&self, index: usize) -> Option<T>;

    /// Clone of every item, in order.
    fn to_vec(&self) -> Vec<T>;
}

impl<T: Clone> StoreView<T> for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn item(&self, index: usize) -> Option<T> {
        self.get(index).cloned()
    }

    fn to_vec(&self) -> Vec<T> {
        self.clone()
    }
}
