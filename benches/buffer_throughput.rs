// Items moved per second through the bounded buffer, single-threaded and
// under contention.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use bounded_buffer::{BoundedBuffer, RetryPolicy, SimConfig, Simulation};

fn uncontended_round_trip(c: &mut Criterion) {
    let buffer = BoundedBuffer::new(64);

    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(64));
    group.bench_function("fill_then_drain_64", |b| {
        b.iter(|| {
            for i in 0..64u64 {
                let _ = buffer.try_enqueue(black_box(i));
            }
            while let Some(item) = buffer.try_dequeue() {
                black_box(item);
            }
        })
    });
    group.finish();
}

fn full_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    group.sample_size(10);
    group.throughput(Throughput::Elements(1000));

    for retry in [RetryPolicy::Immediate, RetryPolicy::Yield, RetryPolicy::Snooze] {
        group.bench_with_input(BenchmarkId::new("4x4_cap10", retry), &retry, |b, &retry| {
            b.iter(|| {
                let config = SimConfig::new(10, 4, 4, 1000).with_retry(retry);
                Simulation::new(config).unwrap().run().unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, uncontended_round_trip, full_simulation);
criterion_main!(benches);
