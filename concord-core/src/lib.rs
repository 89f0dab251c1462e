//! Concord Core
//!
//! Thread-safe, change-notifying containers for UI-binding layers. It
//! implements:
//!
//! - Observable list, dictionary, queue and stack
//! - Live filtered views that stay consistent with their parent
//! - Property-change notification and an observable property bag
//! - A dispatch substrate that marshals notifications onto a home thread
//!
//! Any thread may read or mutate a container. Every mutation happens under
//! the container's write lock together with the notifications describing
//! it, and observers choose whether to hear about it immediately on the
//! mutating thread or later on their own thread.
//!
//! # Architecture
//!
//! - `lifecycle`: the one-way dispose state machine every entity carries
//! - `dispatch`: sync operations and dispatch contexts (post / send)
//! - `notify`: change payloads, handler channels and subscriptions
//! - `collections`: the locked collection core and concrete containers
//! - `property`: the property bag
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use concord_core::collections::ObservableList;
//! use concord_core::dispatch::{LoopContext, SyncOperation};
//! use concord_core::notify::NotifyCollectionChanged;
//!
//! // Notifications are delivered on the thread that drains `ui`.
//! let ui = Arc::new(LoopContext::new());
//! let list = ObservableList::new(SyncOperation::new(ui.clone()));
//!
//! let _sub = list.subscribe_collection_changed(|change| {
//!     println!("{:?} at {:?}", change.action(), change.new_index());
//! });
//!
//! std::thread::scope(|s| {
//!     s.spawn(|| list.push(1).unwrap());
//! });
//!
//! // Prints: "Add at Some(0)"
//! ui.run_pending();
//! ```

pub mod collections;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod property;

pub use collections::{FilteredView, ObservableDictionary, ObservableList, ObservableQueue, ObservableStack};
pub use dispatch::{HasSyncOperation, SyncOperation};
pub use error::{CollectionError, DispatchError, Result};
pub use lifecycle::Disposable;
pub use notify::{
    CollectionChange, NotifyCollectionChanged, NotifyPropertyChanged, PropertyChanged, Subscription,
};
pub use property::{PropertyBag, PropertyKey};
