//! Extended benchmark suite - scaling behavior.
//!
//! Includes:
//! - Matching across multiple price levels
//! - Cancel performance with varying book sizes
//! - Stop-storm harvest cost by armed population
//! - Throughput of the full statistical flow

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use cascade_lob::{Engine, OrderFlow, PlaceOrder, Side};

/// Benchmark: one taker sweeping N price levels
fn bench_sweep_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep_levels");

    for levels in [1usize, 8, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(levels), levels, |b, &levels| {
            let (mut engine, mut rx) = Engine::new(1_000_000, 1 << 16);
            engine.warm_up();

            let mut id = 0u64;
            b.iter(|| {
                // Lay out one maker per level, then sweep them all
                for l in 0..levels {
                    engine.place(PlaceOrder::limit(id, Side::Sell, 10, 10_000 + l as i64));
                    id += 1;
                }
                engine.place(PlaceOrder::market(id, Side::Buy, 10 * levels as u32));
                id += 1;
                while rx.try_pop().is_some() {}
            });
        });
    }

    group.finish();
}

/// Benchmark: cancel latency as the book grows
fn bench_cancel_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("cancel_scaling");

    for book_size in [100u64, 1_000, 10_000, 50_000].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(book_size),
            book_size,
            |b, &book_size| {
                let (mut engine, _rx) = Engine::new(1_000_000, 1 << 16);
                engine.warm_up();

                for i in 0..book_size {
                    let side = if i % 2 == 0 { Side::Buy } else { Side::Sell };
                    let price = if i % 2 == 0 {
                        9_000 - (i as i64 % 200)
                    } else {
                        11_000 + (i as i64 % 200)
                    };
                    engine.place(PlaceOrder::limit(i, side, 100, price));
                }

                let mut id = 10_000_000u64;
                b.iter(|| {
                    id += 1;
                    engine.place(PlaceOrder::limit(id, Side::Buy, 100, 9_000 - (id as i64 % 200)));
                    black_box(engine.cancel(id));
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: harvesting a storm of armed stops with one print.
/// Book construction happens in the setup half of each batch; only the
/// trigger print is timed.
fn bench_stop_storm(c: &mut Criterion) {
    let mut group = c.benchmark_group("stop_storm");
    group.sample_size(20);

    for storm in [10usize, 100, 1_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(storm), storm, |b, &storm| {
            b.iter_batched(
                || {
                    let (mut engine, rx) = Engine::new(16_384, 1 << 16);

                    // Depth for the storm to land on
                    for i in 0..100u64 {
                        engine.place(PlaceOrder::limit(i, Side::Buy, 100_000, 4_900 - i as i64));
                    }
                    for i in 0..storm as u64 {
                        engine.place(PlaceOrder::stop(
                            1_000 + i,
                            Side::Sell,
                            5,
                            5_000 + (i as i64 % 10),
                        ));
                    }
                    engine.place(PlaceOrder::limit(500_000, Side::Sell, 1, 5_000));
                    (engine, rx)
                },
                |(mut engine, mut rx)| {
                    engine.place(PlaceOrder::limit(500_001, Side::Buy, 1, 5_000));
                    while rx.try_pop().is_some() {}
                    black_box(engine.armed_stop_count())
                },
                BatchSize::PerIteration,
            );
        });
    }

    group.finish();
}

/// Benchmark: sustained statistical flow, reported as ops/sec
fn bench_statistical_throughput(c: &mut Criterion) {
    const BATCH: u64 = 10_000;

    let mut group = c.benchmark_group("statistical_throughput");
    group.throughput(Throughput::Elements(BATCH));
    group.sample_size(20);

    group.bench_function("flow_batch", |b| {
        let (mut engine, mut rx) = Engine::new(4_000_000, 1 << 16);
        engine.warm_up();

        let mut flow = OrderFlow::new(42, 10_000, 500);
        for _ in 0..10_000 {
            engine.place(flow.next_order(false));
        }

        b.iter(|| {
            for _ in 0..BATCH {
                let order = flow.next_order(true);
                let id = order.id;
                engine.place(order);
                if id % 7 == 0 {
                    engine.cancel(id.saturating_sub(20));
                }
                if id % 64 == 0 {
                    while rx.try_pop().is_some() {}
                }
            }
            while rx.try_pop().is_some() {}
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_sweep_levels,
    bench_cancel_scaling,
    bench_stop_storm,
    bench_statistical_throughput
);
criterion_main!(benches);
