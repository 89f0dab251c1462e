//! Integration Tests for Observable Collections
//!
//! These tests drive containers from several threads and check that the
//! notification stream, the dispatch substrate and derived views agree with
//! the container contents.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use concord_core::collections::{ObservableList, ObservableQueue};
use concord_core::dispatch::{DispatchContext, Job, LoopContext, SyncOperation, ThreadDispatcher};
use concord_core::error::DispatchError;
use concord_core::notify::{CollectionChange, NotifyCollectionChanged, NotifyPropertyChanged};
use concord_core::property::PropertyBag;
use concord_core::{Disposable, HasSyncOperation};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Apply one change to a shadow copy. `after` is the container as it stood
/// after the change.
fn replay<T: Clone>(shadow: &mut Vec<T>, change: &CollectionChange<T>, after: Vec<T>) {
    match change {
        CollectionChange::Add { items, index } => {
            shadow.splice(*index..*index, items.iter().cloned());
        }
        CollectionChange::Remove { items, index } => {
            shadow.drain(*index..*index + items.len());
        }
        CollectionChange::Replace {
            new_items, index, ..
        } => {
            shadow[*index..*index + new_items.len()].clone_from_slice(new_items);
        }
        CollectionChange::Move {
            old_index,
            new_index,
            ..
        } => {
            let item = shadow.remove(*old_index);
            shadow.insert(*new_index, item);
        }
        CollectionChange::Reset => *shadow = after,
    }
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}

/// Test that replaying the event stream reproduces the list.
#[test]
fn events_replay_to_same_contents() {
    init_tracing();

    let list = ObservableList::new(SyncOperation::inline());
    let shadow = Arc::new(Mutex::new(Vec::new()));
    let shadow_clone = shadow.clone();
    let _sub = list.subscribe_collection_changed_immediate(move |change, view| {
        replay(&mut shadow_clone.lock(), change, view.to_vec());
    });

    let mut reference: Vec<usize> = Vec::new();
    let mut rng = Lcg(7);

    for step in 0..2_000 {
        let len = reference.len();
        match rng.next(9) {
            0 => {
                list.push(step).unwrap();
                reference.push(step);
            }
            1 => {
                let index = rng.next(len + 1);
                list.insert(index, step).unwrap();
                reference.insert(index, step);
            }
            2 if len > 0 => {
                let index = rng.next(len);
                assert_eq!(list.remove_at(index).unwrap(), reference.remove(index));
            }
            3 if len > 0 => {
                let index = rng.next(len);
                assert_eq!(list.set(index, step).unwrap(), reference[index]);
                reference[index] = step;
            }
            4 if len > 0 => {
                let (from, to) = (rng.next(len), rng.next(len));
                list.move_item(from, to).unwrap();
                let item = reference.remove(from);
                reference.insert(to, item);
            }
            5 => {
                let index = rng.next(len + 1);
                let items = [step, step + 1, step + 2];
                list.insert_range(index, items).unwrap();
                reference.splice(index..index, items);
            }
            6 if len > 0 => {
                let index = rng.next(len);
                let count = rng.next(len - index + 1);
                let removed = list.remove_range(index, count).unwrap();
                let expected: Vec<_> = reference.drain(index..index + count).collect();
                assert_eq!(removed, expected);
            }
            7 => {
                let modulus = rng.next(5) + 2;
                let removed = list.remove_where(|v| v % modulus == 0).unwrap();
                let before = reference.len();
                reference.retain(|v| v % modulus != 0);
                assert_eq!(removed, before - reference.len());
            }
            8 if rng.next(20) == 0 => {
                list.clear().unwrap();
                reference.clear();
            }
            _ => {}
        }
        assert_eq!(list.len(), reference.len());
    }

    assert_eq!(list.to_vec(), reference);
    assert_eq!(*shadow.lock(), reference);
}

/// Test that dispatched handlers run on the dispatcher thread, in store order,
/// whichever thread mutated.
#[test]
fn dispatched_handlers_run_on_home_thread() {
    init_tracing();

    let ui = ThreadDispatcher::builder().name("home").spawn().unwrap();
    let sync = SyncOperation::new(ui.clone());
    let list = ObservableList::new(sync.clone());

    let threads = Arc::new(Mutex::new(HashSet::new()));
    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let immediate = Arc::new(Mutex::new(Vec::new()));
    let (threads_clone, dispatched_clone) = (threads.clone(), dispatched.clone());
    let _sub = list.subscribe_collection_changed(move |change| {
        threads_clone
            .lock()
            .insert(thread::current().name().map(str::to_string));
        dispatched_clone.lock().extend_from_slice(change.new_items());
    });
    let immediate_clone = immediate.clone();
    let _immediate = list.subscribe_collection_changed_immediate(move |change, _| {
        immediate_clone.lock().extend_from_slice(change.new_items());
    });

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    list.push(t * 100 + i).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Every post is queued before this send, so it returns after they ran.
    sync.send(|| {}).unwrap();

    assert_eq!(dispatched.lock().len(), 200);
    assert_eq!(*dispatched.lock(), *immediate.lock());
    assert_eq!(*dispatched.lock(), list.to_vec());
    assert_eq!(
        *threads.lock(),
        HashSet::from([Some("home".to_string())])
    );
    ui.shutdown();
}

/// Queues jobs for the test thread, stalling posts made from the thread named
/// "stalled".
#[derive(Default)]
struct StallingContext {
    jobs: Mutex<Vec<Job>>,
}

impl DispatchContext for StallingContext {
    fn post(&self, job: Job) {
        if thread::current().name() == Some("stalled") {
            thread::sleep(Duration::from_millis(200));
        }
        self.jobs.lock().push(job);
    }

    fn send(&self, job: Job) -> Result<(), DispatchError> {
        job();
        Ok(())
    }

    fn is_current(&self) -> bool {
        false
    }
}

/// Test that a writer descheduled between unlocking and posting does not let
/// a later writer's delivery overtake its own.
#[test]
fn stalled_writer_keeps_dispatch_order() {
    let context = Arc::new(StallingContext::default());
    let list = ObservableList::new(SyncOperation::new(context.clone()));

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let dispatched_clone = dispatched.clone();
    let _sub = list.subscribe_collection_changed(move |change| {
        dispatched_clone.lock().extend_from_slice(change.new_items());
    });

    let stalled = {
        let list = list.clone();
        thread::Builder::new()
            .name("stalled".into())
            .spawn(move || list.push(1).unwrap())
            .unwrap()
    };
    while list.is_empty() {
        thread::sleep(Duration::from_millis(1));
    }
    let prompt = {
        let list = list.clone();
        thread::Builder::new()
            .name("prompt".into())
            .spawn(move || list.push(2).unwrap())
            .unwrap()
    };
    prompt.join().unwrap();
    stalled.join().unwrap();

    let jobs: Vec<Job> = std::mem::take(&mut *context.jobs.lock());
    for job in jobs {
        job();
    }

    assert_eq!(list.to_vec(), vec![1, 2]);
    assert_eq!(*dispatched.lock(), vec![1, 2]);
}

/// Test the async send variant from inside a tokio task.
#[tokio::test]
async fn send_async_runs_job_on_dispatcher() {
    let dispatcher = ThreadDispatcher::builder().name("async-home").spawn().unwrap();
    let sync = SyncOperation::new(dispatcher.clone());

    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    sync.send_async(move || {
        *seen_clone.lock() = thread::current().name().map(str::to_string);
    })
    .await
    .unwrap();

    assert_eq!(seen.lock().as_deref(), Some("async-home"));
}

/// Test that concurrent producers and a consumer never lose or duplicate
/// an item.
#[test]
fn concurrent_producers_and_consumer() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 1_000;
    const TOTAL: usize = PRODUCERS * PER_PRODUCER;

    let queue = ObservableQueue::new(SyncOperation::inline());

    let consumer = {
        let queue = queue.clone();
        thread::spawn(move || {
            let mut seen = Vec::with_capacity(TOTAL);
            while seen.len() < TOTAL {
                match queue.try_dequeue().unwrap() {
                    Some(item) => seen.push(item),
                    None => thread::yield_now(),
                }
            }
            seen
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    queue.enqueue((p, i)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let seen = consumer.join().unwrap();
    let unique: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(unique.len(), TOTAL);
    assert!(queue.is_empty());

    // Each producer's items come out in the order it enqueued them.
    for p in 0..PRODUCERS {
        let order: Vec<_> = seen.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
        assert_eq!(order, (0..PER_PRODUCER).collect::<Vec<_>>());
    }
}

/// Test that filtered views stay exact while the parent is mutated from
/// several threads.
#[test]
fn filtered_view_tracks_concurrent_parent() {
    let list = ObservableList::new(SyncOperation::inline());
    let evens = list.filter(|v: &usize| v % 2 == 0);

    let workers: Vec<_> = (0..4)
        .map(|t| {
            let list = list.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let value = t * 1_000 + i;
                    list.push(value).unwrap();
                    if i % 3 == 0 {
                        list.remove(&value).unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let expected: Vec<_> = list.to_vec().into_iter().filter(|v| v % 2 == 0).collect();
    assert_eq!(evens.to_vec(), expected);
}

/// Test that dropping or disposing views leaves nothing behind on the parent.
#[test]
fn discarded_views_do_not_accumulate() {
    let list = ObservableList::from_items(SyncOperation::inline(), 0..10);

    for round in 0..100 {
        let view = list.filter(move |v| v % 3 == round % 3);
        if round % 2 == 0 {
            view.dispose();
        }
    }
    assert_eq!(list.collection_notifier().immediate_len(), 0);

    let kept = list.filter(|v| *v > 5);
    list.push(11).unwrap();
    assert_eq!(kept.to_vec(), vec![6, 7, 8, 9, 11]);
    assert_eq!(list.collection_notifier().immediate_len(), 1);
}

/// Test that entities adopting one sync operation move together when it is
/// retargeted.
#[test]
fn adopted_sync_follows_retarget() {
    let root = SyncOperation::inline();
    let list: ObservableList<i32> = ObservableList::new(SyncOperation::delegating_to(&root));
    let bag = PropertyBag::builder(SyncOperation::inline()).build().unwrap();
    bag.sync_operation().adopt(&list).unwrap();

    let ui = Arc::new(LoopContext::new());
    root.set_context(ui.clone());

    let count = Arc::new(AtomicUsize::new(0));
    let (list_count, bag_count) = (count.clone(), count.clone());
    let _list_sub = list.subscribe_collection_changed(move |_| {
        list_count.fetch_add(1, Ordering::SeqCst);
    });
    let _bag_sub = bag.subscribe_property_changed(move |_| {
        bag_count.fetch_add(1, Ordering::SeqCst);
    });

    list.push(1).unwrap();
    bag.set_value("Selected", serde_json::json!(1));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert_eq!(ui.run_pending(), 2);
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Test that a disposed list tears down its subscribers and stays quiet.
#[test]
fn disposal_silences_every_channel() {
    let ui = Arc::new(LoopContext::new());
    let list = ObservableList::from_items(SyncOperation::new(ui.clone()), [1, 2, 3]);

    let count = Arc::new(AtomicUsize::new(0));
    let (a, b) = (count.clone(), count.clone());
    let _dispatched = list.subscribe_collection_changed(move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    let _properties = list.subscribe_property_changed_immediate(move |_| {
        b.fetch_add(1, Ordering::SeqCst);
    });

    let disposing = Arc::new(AtomicUsize::new(0));
    let disposing_clone = disposing.clone();
    assert!(list.lifecycle().on_disposing(move || {
        disposing_clone.fetch_add(1, Ordering::SeqCst);
    }));

    let racers: Vec<_> = (0..4)
        .map(|_| {
            let list = list.clone();
            thread::spawn(move || list.dispose())
        })
        .collect();
    for racer in racers {
        racer.join().unwrap();
    }

    assert_eq!(disposing.load(Ordering::SeqCst), 1);
    assert!(list.is_disposed());

    list.push(4).unwrap();
    list.clear().unwrap();
    assert_eq!(ui.run_pending(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(list.is_empty());
}
