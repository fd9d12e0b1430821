use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use arbor_store::{MemoryBackend, RelationalStore};
use arbor_types::{Bind, ResourceKind};
use tokio::runtime::Runtime;

fn bench_bind_insert(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("bind insert", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = MemoryBackend::new();
                let mut txn = store.begin().await.unwrap();
                let parent = txn.insert_resource(ResourceKind::Collection, 0).await.unwrap();
                let child = txn.insert_resource(ResourceKind::Resource, 0).await.unwrap();
                txn.insert_bind(&Bind {
                    parent_id: parent,
                    child_id: child,
                    name: "child".to_string(),
                })
                .await
                .unwrap();
                txn.commit().await.unwrap()
            })
        })
    });
}

fn bench_children_listing(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = MemoryBackend::new();

    // Setup: one collection with 1000 children.
    let parent = rt.block_on(async {
        let mut txn = store.begin().await.unwrap();
        let parent = txn.insert_resource(ResourceKind::Collection, 0).await.unwrap();
        for i in 0..1000 {
            let child = txn.insert_resource(ResourceKind::Resource, 0).await.unwrap();
            txn.insert_bind(&Bind {
                parent_id: parent,
                child_id: child,
                name: format!("child-{:04}", i),
            })
            .await
            .unwrap();
        }
        txn.commit().await.unwrap();
        parent
    });

    c.bench_function("list 1000 children", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut txn = store.begin().await.unwrap();
                let binds = txn.binds_of_parent(black_box(parent)).await.unwrap();
                txn.rollback().await.unwrap();
                binds
            })
        })
    });
}

fn bench_closure_fanout(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    for size in [10, 100, 1000].iter() {
        c.bench_with_input(BenchmarkId::new("closure fan-out", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let store = MemoryBackend::new();
                    let mut txn = store.begin().await.unwrap();
                    for member in 0..size {
                        txn.adjust_closure(0, member + 1, 1).await.unwrap();
                    }
                    let rows = txn.closure_descendants(0).await.unwrap();
                    txn.commit().await.unwrap();
                    rows
                })
            });
        });
    }
}

criterion_group!(
    benches,
    bench_bind_insert,
    bench_children_listing,
    bench_closure_fanout
);
criterion_main!(benches);
