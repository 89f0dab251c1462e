//! Benchmarks for concord-core
//!
//! Run with: cargo bench

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use concord_core::collections::{ObservableDictionary, ObservableList};
use concord_core::dispatch::{LoopContext, SyncOperation};
use concord_core::notify::NotifyCollectionChanged;

// =============================================================================
// LIST BENCHMARKS
// =============================================================================

fn bench_push_unobserved(c: &mut Criterion) {
    c.bench_function("list_push_unobserved", |b| {
        let list = ObservableList::new(SyncOperation::inline());
        b.iter(|| list.push(black_box(1u64)))
    });
}

fn bench_push_with_subscribers(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_push_subscribers");
    for subscribers in [1usize, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, &n| {
            let list = ObservableList::new(SyncOperation::inline());
            let _subs: Vec<_> = (0..n)
                .map(|_| list.subscribe_collection_changed_immediate(|change, _| {
                    black_box(change.action());
                }))
                .collect();
            b.iter(|| list.push(black_box(1u64)))
        });
    }
    group.finish();
}

fn bench_push_dispatched(c: &mut Criterion) {
    c.bench_function("list_push_dispatched", |b| {
        let ui = Arc::new(LoopContext::new());
        let list = ObservableList::new(SyncOperation::new(ui.clone()));
        let _sub = list.subscribe_collection_changed(|change| {
            black_box(change.action());
        });
        b.iter(|| {
            list.push(black_box(1u64)).ok();
            ui.run_pending()
        })
    });
}

fn bench_filtered_view_updates(c: &mut Criterion) {
    c.bench_function("filtered_view_push", |b| {
        let list = ObservableList::from_items(SyncOperation::inline(), 0u64..1_000);
        let _evens = list.filter(|v| v % 2 == 0);
        let mut next = 1_000u64;
        b.iter(|| {
            next += 1;
            list.push(black_box(next))
        })
    });
}

// =============================================================================
// DICTIONARY BENCHMARKS
// =============================================================================

fn bench_dictionary_add_or_update(c: &mut Criterion) {
    c.bench_function("dictionary_add_or_update", |b| {
        let dict = ObservableDictionary::new(SyncOperation::inline());
        let mut key = 0u32;
        b.iter(|| {
            key = (key + 1) % 256;
            dict.add_or_update(black_box(key), 1u64, |v| v + 1)
        })
    });
}

criterion_group!(
    benches,
    bench_push_unobserved,
    bench_push_with_subscribers,
    bench_push_dispatched,
    bench_filtered_view_updates,
    bench_dictionary_add_or_update,
);
criterion_main!(benches);
