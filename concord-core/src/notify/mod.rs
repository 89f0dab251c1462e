//! Change Notification
//!
//! Every observable entity carries two channels per notification kind:
//!
//! - The **immediate** channel runs handlers synchronously on the thread that
//!   performed the mutation, before the container's write lock is released.
//!   Derived views depend on this to stay exactly in step with their parent.
//! - The **dispatched** channel hands each notification to the entity's
//!   [`SyncOperation`](crate::dispatch::SyncOperation) with `post`, after the
//!   lock is released. UI consumers use it to be called on their own thread.
//!
//! Property-level changes are [`PropertyChanged`] records; collection-level
//! changes are [`CollectionChange`] values, a closed set of variants.
//!
//! Registrations return a [`Subscription`] guard that unregisters the handler
//! when dropped.

mod channel;
mod events;
mod notifier;
mod subscriber;

pub use channel::Channel;
pub use events::{ChangeAction, CollectionChange, Items, PropertyChanged, StoreView};
pub(crate) use notifier::Outbox;
pub use notifier::{
    ChangeNotifier, CollectionHandler, CollectionNotifier, ImmediateCollectionHandler,
    NotifyCollectionChanged, NotifyPropertyChanged, PropertyHandler,
};
pub use subscriber::{SubscriberId, Subscription};
