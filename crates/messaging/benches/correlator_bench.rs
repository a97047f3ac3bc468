use std::time::Duration;

use common::ProductId;
use criterion::{Criterion, criterion_group, criterion_main};
use messaging::Correlator;

fn bench_register_resolve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let correlator = Correlator::<ProductId>::new();

    c.bench_function("correlator/register_resolve_wait", |b| {
        b.iter(|| {
            rt.block_on(async {
                let pending = correlator.register(ProductId::new(42), Duration::from_secs(5));
                correlator.resolve(&ProductId::new(42), true);
                assert!(pending.wait().await);
            });
        });
    });
}

fn bench_concurrent_keys(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let correlator = Correlator::<ProductId>::new();

    c.bench_function("correlator/100_concurrent_keys", |b| {
        b.iter(|| {
            rt.block_on(async {
                let pending: Vec<_> = (0..100)
                    .map(|id| correlator.register(ProductId::new(id), Duration::from_secs(5)))
                    .collect();
                for id in 0..100 {
                    correlator.resolve(&ProductId::new(id), id % 2 == 0);
                }
                for p in pending {
                    p.wait().await;
                }
            });
        });
    });
}

fn bench_resolve_without_waiter(c: &mut Criterion) {
    let correlator = Correlator::<ProductId>::new();

    c.bench_function("correlator/resolve_late", |b| {
        b.iter(|| correlator.resolve(&ProductId::new(7), true));
    });
}

criterion_group!(
    benches,
    bench_register_resolve,
    bench_concurrent_keys,
    bench_resolve_without_waiter
);
criterion_main!(benches);
