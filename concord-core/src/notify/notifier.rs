//! The change-notifying base shared by every observable entity.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::channel::Channel;
use super::events::{CollectionChange, PropertyChanged, StoreView};
use super::subscriber::Subscription;
use crate::dispatch::{Job, SyncOperation};
use crate::lifecycle::Lifecycle;

/// Handler for property changes.
pub type PropertyHandler = dyn Fn(&PropertyChanged) + Send + Sync;

/// Handler for collection changes on the dispatched channel.
pub type CollectionHandler<T> = dyn Fn(&CollectionChange<T>) + Send + Sync;

/// Handler for collection changes on the immediate channel. The view shows the
/// store as it stands after the change.
pub type ImmediateCollectionHandler<T> =
    dyn Fn(&CollectionChange<T>, &dyn StoreView<T>) + Send + Sync;

/// Dispatched deliveries collected while a lock is held.
#[derive(Default)]
pub(crate) struct Outbox {
    jobs: SmallVec<[Job; 3]>,
}

impl Outbox {
    fn push(&mut self, job: Job) {
        self.jobs.push(job);
    }
}

/// Dispatched deliveries waiting to be posted, in the order they were queued.
///
/// Writers queue under the entity's own lock and drain after releasing it.
/// Only one thread drains at a time; a writer that finds a drain in progress
/// leaves its jobs to that drainer, so posts reach the context in queue order.
#[derive(Default)]
struct DispatchQueue {
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    draining: bool,
}

/// Clears the draining flag if a post unwinds.
struct DrainGuard<'a> {
    state: &'a Mutex<QueueState>,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.lock().draining = false;
        }
    }
}

impl DispatchQueue {
    fn enqueue(&self, outbox: Outbox) {
        if outbox.jobs.is_empty() {
            return;
        }
        self.state.lock().jobs.extend(outbox.jobs);
    }

    fn drain(&self, sync: &SyncOperation) {
        {
            let mut state = self.state.lock();
            if state.draining || state.jobs.is_empty() {
                return;
            }
            state.draining = true;
        }

        let mut guard = DrainGuard {
            state: &self.state,
            finished: false,
        };
        let context = sync.resolve();
        loop {
            let job = {
                let mut state = self.state.lock();
                match state.jobs.pop_front() {
                    Some(job) => job,
                    None => {
                        state.draining = false;
                        guard.finished = true;
                        return;
                    }
                }
            };
            context.post(job);
        }
    }

    fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }
}

/// Lifecycle, dispatch target and the two property channels.
///
/// Immediate handlers run synchronously on the mutating thread. Dispatched
/// handlers run later on the context the [`SyncOperation`] resolves to.
pub struct ChangeNotifier {
    lifecycle: Lifecycle,
    sync: SyncOperation,
    property_immediate: Arc<Channel<PropertyHandler>>,
    property_dispatched: Arc<Channel<PropertyHandler>>,
    queue: DispatchQueue,
}

impl ChangeNotifier {
    pub fn new(type_name: &'static str, sync: SyncOperation) -> Self {
        Self {
            lifecycle: Lifecycle::new(type_name),
            sync,
            property_immediate: Channel::new(),
            property_dispatched: Channel::new(),
            queue: DispatchQueue::default(),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn sync(&self) -> &SyncOperation {
        &self.sync
    }

    pub fn subscribe_property_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.property_dispatched.subscribe(Arc::new(handler))
    }

    pub fn subscribe_property_changed_immediate<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.property_immediate.subscribe(Arc::new(handler))
    }

    /// Invoke immediate handlers now and queue the dispatched delivery.
    pub(crate) fn raise_property_changed(&self, change: PropertyChanged, outbox: &mut Outbox) {
        for handler in self.property_immediate.handlers() {
            handler(&change);
        }

        if !self.property_dispatched.is_empty() {
            let channel = Arc::clone(&self.property_dispatched);
            outbox.push(Box::new(move || {
                for handler in channel.handlers() {
                    handler(&change);
                }
            }));
        }
    }

    /// Queue the dispatched deliveries of one change.
    ///
    /// Call while still holding the lock that ordered the change, so queue
    /// order matches change order.
    pub(crate) fn queue_dispatched(&self, outbox: Outbox) {
        self.queue.enqueue(outbox);
    }

    /// Post queued deliveries to the dispatch target. Call after releasing
    /// the lock.
    pub(crate) fn deliver_dispatched(&self) {
        self.queue.drain(&self.sync);
    }

    pub(crate) fn clear_subscribers(&self) {
        self.property_immediate.clear();
        self.property_dispatched.clear();
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("lifecycle", &self.lifecycle)
            .field("property_immediate", &self.property_immediate.len())
            .field("property_dispatched", &self.property_dispatched.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// [`ChangeNotifier`] plus the two collection channels.
pub struct CollectionNotifier<T> {
    base: ChangeNotifier,
    immediate: Arc<Channel<ImmediateCollectionHandler<T>>>,
    dispatched: Arc<Channel<CollectionHandler<T>>>,
}

impl<T> CollectionNotifier<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(type_name: &'static str, sync: SyncOperation) -> Self {
        Self {
            base: ChangeNotifier::new(type_name, sync),
            immediate: Channel::new(),
            dispatched: Channel::new(),
        }
    }

    pub fn base(&self) -> &ChangeNotifier {
        &self.base
    }

    pub fn subscribe_collection_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollectionChange<T>) + Send + Sync + 'static,
    {
        self.dispatched.subscribe(Arc::new(handler))
    }

    pub fn subscribe_collection_changed_immediate<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollectionChange<T>, &dyn StoreView<T>) + Send + Sync + 'static,
    {
        self.immediate.subscribe(Arc::new(handler))
    }

    /// Number of handlers on the immediate collection channel.
    pub fn immediate_len(&self) -> usize {
        self.immediate.len()
    }

    /// Number of handlers on the dispatched collection channel.
    pub fn dispatched_len(&self) -> usize {
        self.dispatched.len()
    }

    /// Invoke immediate handlers with `view` now and queue the dispatched
    /// delivery.
    pub(crate) fn raise_collection_changed(
        &self,
        change: CollectionChange<T>,
        view: &dyn StoreView<T>,
        outbox: &mut Outbox,
    ) {
        for handler in self.immediate.handlers() {
            handler(&change, view);
        }

        if !self.dispatched.is_empty() {
            let channel = Arc::clone(&self.dispatched);
            outbox.push(Box::new(move || {
                for handler in channel.handlers() {
                    handler(&change);
                }
            }));
        }
    }

    pub(crate) fn clear_subscribers(&self) {
        self.base.clear_subscribers();
        self.immediate.clear();
        self.dispatched.clear();
    }
}

/// Observable entities that raise property changes.
pub trait NotifyPropertyChanged {
    fn change_notifier(&self) -> &ChangeNotifier;

    /// Subscribe on the dispatched channel.
    fn subscribe_property_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.change_notifier().subscribe_property_changed(handler)
    }

    /// Subscribe on the immediate channel.
    fn subscribe_property_changed_immediate<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PropertyChanged) + Send + Sync + 'static,
    {
        self.change_notifier()
            .subscribe_property_changed_immediate(handler)
    }
}

/// Observable containers that raise structured collection changes.
pub trait NotifyCollectionChanged {
    type Item: Clone + Send + Sync + 'static;

    fn collection_notifier(&self) -> &CollectionNotifier<Self::Item>;

    /// Subscribe on the dispatched channel.
    fn subscribe_collection_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollectionChange<Self::Item>) + Send + Sync + 'static,
    {
        self.collection_notifier()
            .subscribe_collection_changed(handler)
    }

    /// Subscribe on the immediate channel.
    ///
    /// The handler runs on the mutating thread while the container's write
    /// lock is held. It must not call back into the container; use the
    /// supplied view instead.
    fn subscribe_collection_changed_immediate<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollectionChange<Self::Item>, &dyn StoreView<Self::Item>) + Send + Sync + 'static,
    {
        self.collection_notifier()
            .subscribe_collection_changed_immediate(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::LoopContext;
    use parking_lot::Mutex;

    #[test]
    fn immediate_runs_before_dispatched() {
        let ui = Arc::new(LoopContext::new());
        let notifier = ChangeNotifier::new("Thing", SyncOperation::new(ui.clone()));
        let log = Arc::new(Mutex::new(Vec::new()));

        let log1 = log.clone();
        let _immediate = notifier.subscribe_property_changed_immediate(move |change| {
            log1.lock().push(format!("immediate:{}", change.name()));
        });
        let log2 = log.clone();
        let _dispatched = notifier.subscribe_property_changed(move |change| {
            log2.lock().push(format!("dispatched:{}", change.name()));
        });

        let mut outbox = Outbox::default();
        notifier.raise_property_changed(PropertyChanged::new("Title"), &mut outbox);
        assert_eq!(*log.lock(), vec!["immediate:Title"]);

        notifier.queue_dispatched(outbox);
        assert_eq!(ui.pending(), 0);
        notifier.deliver_dispatched();
        assert_eq!(ui.pending(), 1);
        ui.run_pending();
        assert_eq!(*log.lock(), vec!["immediate:Title", "dispatched:Title"]);
    }

    #[test]
    fn deliveries_queued_during_a_drain_wait_their_turn() {
        let notifier = Arc::new(ChangeNotifier::new("Thing", SyncOperation::inline()));
        let log = Arc::new(Mutex::new(Vec::new()));

        let (log_clone, weak) = (log.clone(), Arc::downgrade(&notifier));
        let _sub = notifier.subscribe_property_changed(move |change| {
            log_clone.lock().push(change.name().to_string());
            if change.name() == "First" {
                // Reentrant raise from inside a delivery.
                if let Some(notifier) = weak.upgrade() {
                    let mut outbox = Outbox::default();
                    notifier.raise_property_changed(PropertyChanged::new("Nested"), &mut outbox);
                    notifier.queue_dispatched(outbox);
                    notifier.deliver_dispatched();
                }
            }
        });

        let mut outbox = Outbox::default();
        notifier.raise_property_changed(PropertyChanged::new("First"), &mut outbox);
        notifier.raise_property_changed(PropertyChanged::new("Second"), &mut outbox);
        notifier.queue_dispatched(outbox);
        notifier.deliver_dispatched();

        assert_eq!(*log.lock(), vec!["First", "Second", "Nested"]);
    }

    #[test]
    fn no_dispatch_without_subscribers() {
        let ui = Arc::new(LoopContext::new());
        let notifier: CollectionNotifier<i32> =
            CollectionNotifier::new("Thing", SyncOperation::new(ui.clone()));

        let mut outbox = Outbox::default();
        notifier.raise_collection_changed(CollectionChange::add(1, 0), &vec![1], &mut outbox);
        notifier.base().queue_dispatched(outbox);
        notifier.base().deliver_dispatched();
        assert_eq!(ui.pending(), 0);
    }

    #[test]
    fn immediate_collection_handler_sees_view() {
        let notifier: CollectionNotifier<i32> =
            CollectionNotifier::new("Thing", SyncOperation::inline());
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = seen.clone();
        let _sub = notifier.subscribe_collection_changed_immediate(move |change, view| {
            *seen_clone.lock() = Some((change.action(), view.to_vec()));
        });

        let mut outbox = Outbox::default();
        notifier.raise_collection_changed(CollectionChange::add(9, 1), &vec![8, 9], &mut outbox);
        assert_eq!(
            *seen.lock(),
            Some((crate::notify::ChangeAction::Add, vec![8, 9]))
        );
    }
}
