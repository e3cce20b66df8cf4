//! IKE SA Manager Benchmarks
//!
//! Benchmarks for checkout latency, SA registration and registry lookups
//! with many live SAs.
//!
//! Run with: `cargo bench --bench sa_manager_bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keyward_ike::{IkeSa, IkeSaManager, ManagerConfig, SaId};
use std::time::Duration;

/// Create a manager holding `count` established responder SAs
fn create_populated_manager(count: u64) -> (IkeSaManager<IkeSa>, Vec<SaId>) {
    let manager = IkeSaManager::new(ManagerConfig::default(), IkeSa::create).unwrap();
    let ids = (1..=count)
        .map(|spi_i| {
            let mut id = SaId::half_open(spi_i, false);
            manager.checkout(&mut id).unwrap().checkin().unwrap();
            id
        })
        .collect();
    (manager, ids)
}

/// Benchmark an uncontended checkout/checkin cycle
fn bench_checkout_checkin(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout");

    for count in [1u64, 100, 10_000] {
        let (manager, ids) = create_populated_manager(count);
        let mut next = 0usize;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("checkout_checkin", count), &count, |b, _| {
            b.iter(|| {
                let mut id = ids[next % ids.len()];
                next += 1;
                let sa = manager.checkout(black_box(&mut id)).unwrap();
                sa.checkin().unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark lookups that miss
fn bench_not_found(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout");
    let (manager, _ids) = create_populated_manager(1_000);

    group.bench_function("not_found", |b| {
        b.iter(|| {
            let mut id = SaId::new(0xffff_0000, Some(0x1234), false);
            black_box(manager.checkout(&mut id).is_err());
        });
    });

    group.finish();
}

/// Benchmark SA registration and removal
fn bench_create_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.measurement_time(Duration::from_secs(5));

    let manager: IkeSaManager<IkeSa> =
        IkeSaManager::new(ManagerConfig::default(), IkeSa::create).unwrap();

    group.bench_function("create_and_checkout_delete", |b| {
        b.iter(|| {
            let sa = manager.create_and_checkout().unwrap();
            black_box(sa.serial());
            sa.checkin_and_delete().unwrap();
        });
    });

    group.bench_function("responder_create_delete", |b| {
        let mut spi_i = 0u64;
        b.iter(|| {
            spi_i += 1;
            let mut id = SaId::half_open(spi_i, false);
            let sa = manager.checkout(&mut id).unwrap();
            manager.checkin_and_delete(sa).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_checkout_checkin,
    bench_not_found,
    bench_create_delete
);
criterion_main!(benches);
