//! Workload generation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use storebench_core::{EntityFactory, Lcg48, WorkloadGenerator};

fn bench_random_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/stream");

    group.bench_function("next_int", |b| {
        let mut rng = Lcg48::new(42);
        b.iter(|| black_box(rng.next_int()));
    });

    group.bench_function("next_int_bounded", |b| {
        let mut rng = Lcg48::new(42);
        b.iter(|| black_box(rng.next_int_bounded(1000)));
    });

    group.bench_function("next_double", |b| {
        let mut rng = Lcg48::new(42);
        b.iter(|| black_box(rng.next_double()));
    });

    group.finish();
}

fn bench_strings(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/strings");
    let generator = WorkloadGenerator::default();

    for count in [100, 1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(generator.generate_strings(count).unwrap()));
        });
    }

    group.finish();
}

fn bench_indices(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/indices");
    let generator = WorkloadGenerator::default();

    for count in [1_000, 100_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(generator.generate_indices(count, count - 1).unwrap()));
        });
    }

    group.finish();
}

fn bench_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("generator/entities");
    let generator = WorkloadGenerator::default();

    for (name, scalars_only) in [("full", false), ("scalars", true)] {
        group.throughput(Throughput::Elements(1_000));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut factory = EntityFactory::new(&generator);
                black_box(factory.create_batch(1_000, scalars_only));
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_random_stream,
    bench_strings,
    bench_indices,
    bench_entities,
);

criterion_main!(benches);
