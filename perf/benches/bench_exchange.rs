use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use keel_latest::{DEFAULT_CAPACITY, Exchange, ExchangeConfig, bridge};
use keel_perf::make_test_patch;

fn bench_publish(c: &mut Criterion) {
    let (mut publisher, _subscriber) = Exchange::new(DEFAULT_CAPACITY, make_test_patch(0))
        .expect("valid capacity")
        .split();
    let patch = make_test_patch(1);

    let mut group = c.benchmark_group("exchange");
    group.throughput(Throughput::Elements(1));

    group.bench_function("publish", |b| {
        b.iter(|| publisher.publish(black_box(patch)));
    });

    group.bench_function("publish_from", |b| {
        b.iter(|| publisher.publish_from(black_box(&patch)));
    });

    group.finish();
}

fn bench_acquire(c: &mut Criterion) {
    let (mut publisher, mut subscriber) = Exchange::new(DEFAULT_CAPACITY, make_test_patch(0))
        .expect("valid capacity")
        .split();
    let patch = make_test_patch(1);

    let mut group = c.benchmark_group("exchange");
    group.throughput(Throughput::Elements(1));

    group.bench_function("acquire_latest (idle)", |b| {
        b.iter(|| black_box(subscriber.acquire_latest().revision));
    });

    group.bench_function("acquire_latest (fresh)", |b| {
        b.iter_custom(|iters| {
            let mut total = std::time::Duration::ZERO;
            for _ in 0..iters {
                publisher.publish(patch);
                let start = std::time::Instant::now();
                black_box(subscriber.acquire_latest().revision);
                total += start.elapsed();
            }
            total
        });
    });

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let (mut publisher, mut subscriber) = Exchange::new(DEFAULT_CAPACITY, make_test_patch(0))
        .expect("valid capacity")
        .split();
    let patch = make_test_patch(1);

    let mut group = c.benchmark_group("exchange");
    group.throughput(Throughput::Elements(1));

    group.bench_function("round_trip", |b| {
        b.iter(|| {
            publisher.publish(black_box(patch));
            black_box(subscriber.acquire_latest().revision);
        });
    });

    group.finish();
}

fn bench_bridge(c: &mut Criterion) {
    let (mut producer, mut consumer) = bridge::owned(ExchangeConfig::default(), make_test_patch(0));

    let mut group = c.benchmark_group("bridge");
    group.throughput(Throughput::Elements(1));

    group.bench_function("push + adopt", |b| {
        b.iter(|| {
            producer.revision += 1;
            producer.push();
            if consumer.has_update() {
                black_box(consumer.adopt().revision);
            }
        });
    });

    group.bench_function("has_update (idle)", |b| {
        consumer.adopt();
        b.iter(|| black_box(consumer.has_update()));
    });

    group.finish();
}

fn bench_capacities(c: &mut Criterion) {
    let mut group = c.benchmark_group("exchange_capacity");
    group.throughput(Throughput::Elements(1));

    for &cap in &[2usize, 3, 5, 16] {
        let (mut publisher, mut subscriber) = Exchange::new(cap, make_test_patch(0))
            .expect("valid capacity")
            .split();
        let patch = make_test_patch(1);

        group.bench_function(format!("round_trip_cap_{cap}"), |b| {
            b.iter(|| {
                publisher.publish(black_box(patch));
                black_box(subscriber.acquire_latest().revision);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_publish,
    bench_acquire,
    bench_round_trip,
    bench_bridge,
    bench_capacities,
);
criterion_main!(benches);
