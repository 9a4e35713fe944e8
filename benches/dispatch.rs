use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use telejournal::{
    Document, EventRegistry, JournalAggregator, JournalWatcher, Scope, SlotKind, SlotTable,
    Watcher, WatcherId,
};

struct Adder {
    id: WatcherId,
    slots: SlotTable,
}

impl Watcher for Adder {
    fn watcher_id(&self) -> WatcherId {
        self.id
    }

    fn slots(&self) -> &SlotTable {
        &self.slots
    }
}

fn registry_with(subscribers: usize) -> (EventRegistry, Vec<Adder>) {
    let registry = EventRegistry::new(Scope::Instance);
    registry.create_channel::<u64, u64>("bench").unwrap();
    let watchers: Vec<Adder> = (0..subscribers as u64)
        .map(|k| Adder {
            id: WatcherId::new(),
            slots: SlotTable::new().with("add", move |x: &u64| x + k),
        })
        .collect();
    for w in &watchers {
        registry
            .connect::<u64, u64>("bench", w, "add", SlotKind::Instance)
            .unwrap();
    }
    (registry, watchers)
}

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch/invoke");
    for n in [1usize, 16, 256] {
        let (registry, _watchers) = registry_with(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| registry.invoke::<u64, u64>("bench", black_box(&1)).unwrap());
        });
    }
    group.finish();
}

fn bench_collect(c: &mut Criterion) {
    let journal = JournalAggregator::builder()
        .process_registry(Arc::new(EventRegistry::new(Scope::Process)))
        .build()
        .unwrap();
    // Each watcher reports a small nested section under its own key.
    let watchers: Vec<JournalWatcher> = (0..32)
        .map(|i| {
            JournalWatcher::new(format!("w{i}"), move || {
                let mut doc = Document::new();
                doc.put(&format!("w{i}.stats.n"), i);
                doc.put(&format!("w{i}.stats.ok"), true);
                doc
            })
        })
        .collect();
    for w in &watchers {
        journal.register_watcher(w).unwrap();
    }

    c.bench_function("dispatch/collect_32_watchers", |b| {
        b.iter(|| journal.collect().unwrap());
    });
}

criterion_group!(dispatch, bench_invoke, bench_collect);
criterion_main!(dispatch);
