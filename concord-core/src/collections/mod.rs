//! Observable Collections
//!
//! Thread-safe containers that report every mutation:
//!
//! - [`ObservableList`]: index-based list with range operations
//! - [`ObservableDictionary`]: unique-key map with check-then-act updates
//! - [`ObservableQueue`] / [`ObservableStack`]: FIFO and LIFO policies over a
//!   list store
//! - [`FilteredView`]: a live read-only projection of any of the above
//!
//! # Concurrency
//!
//! Any number of threads may read and mutate a container at once. Each
//! mutation is atomic: it validates, changes the store and raises its
//! immediate notifications under a single write-lock acquisition, so an
//! observer never sees a state the notifications do not describe.
//!
//! Handles are cheap to clone and clones share one container.
//!
//! # Disposal
//!
//! After [`dispose`](crate::lifecycle::Disposable::dispose) a container is
//! empty and silent. Mutations that return nothing (or a flag, count or
//! `Option`) become no-ops; operations that must hand back an item fail with
//! [`CollectionError::Disposed`](crate::error::CollectionError::Disposed).

mod core;
mod dictionary;
mod filtered;
mod list;
mod queue;
mod stack;

pub use dictionary::ObservableDictionary;
pub use filtered::FilteredView;
pub use list::ObservableList;
pub use queue::ObservableQueue;
pub use stack::ObservableStack;
