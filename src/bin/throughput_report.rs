//! Throughput and latency report for the matching engine.
//!
//! Spawns a consumer thread draining the trade ring, seeds the book with
//! resting limits, then drives three phased workloads through the engine
//! while sampling per-command latency into an HDR histogram.

use cascade_lob::{CancelOrder, Command, Engine, ModifyOrder, OrderFlow, PlaceOrder, Side};
use hdrhistogram::Histogram;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PHASE_SIZE: usize = 1_000_000;
const SEED_ORDERS: usize = 10_000;

fn run_phase(
    name: &str,
    engine: &mut Engine,
    histogram: &mut Histogram<u64>,
    mut body: impl FnMut(&mut Engine, &mut Histogram<u64>, usize),
) {
    println!("\n=== {} ===", name);

    let start = Instant::now();
    body(engine, histogram, PHASE_SIZE);
    let elapsed = start.elapsed();

    println!(
        "Throughput: {:.2} Million ops/sec",
        PHASE_SIZE as f64 / elapsed.as_secs_f64() / 1e6
    );
    println!("Live Orders in Book: {}", engine.live_order_count());
    println!("Stop Orders in Book: {}", engine.armed_stop_count());
    println!(
        "Latency p50/p99/p99.9: {} / {} / {} ns",
        histogram.value_at_quantile(0.50),
        histogram.value_at_quantile(0.99),
        histogram.value_at_quantile(0.999),
    );
    histogram.reset();
}

fn main() {
    let (mut engine, mut trades) = Engine::new((PHASE_SIZE * 3) as u32, 1 << 16);

    engine.pin_to_core();
    engine.warm_up();

    let running = Arc::new(AtomicBool::new(true));
    let total_trades = Arc::new(AtomicU64::new(0));

    let consumer = {
        let running = Arc::clone(&running);
        let total_trades = Arc::clone(&total_trades);
        std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                if trades.try_pop().is_some() {
                    total_trades.fetch_add(1, Ordering::Relaxed);
                } else {
                    std::thread::yield_now();
                }
            }
            while trades.try_pop().is_some() {
                total_trades.fetch_add(1, Ordering::Relaxed);
            }
        })
    };

    let mut flow = OrderFlow::new(42, 300, 50);
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 10_000_000, 3).unwrap();

    println!("Seeding book with {} resting limits...", SEED_ORDERS);
    for _ in 0..SEED_ORDERS {
        let order = flow.next_order(false);
        // Clamp seeds away from fair value so the book starts with depth
        let price = match order.side {
            Side::Buy => order.price.min(295),
            Side::Sell => order.price.max(305),
        };
        engine.place(PlaceOrder::limit(order.id, order.side, order.shares, price));
    }

    run_phase(
        "Test 1: Statistical Orders",
        &mut engine,
        &mut histogram,
        |engine, histogram, n| {
            for i in 0..n {
                let order = flow.next_order(true);
                let id = order.id;

                let start = Instant::now();
                engine.place(order);
                let _ = histogram.record(start.elapsed().as_nanos() as u64);

                if i > 100 && i % 7 == 0 {
                    engine.cancel(id.saturating_sub(10 + (i as u64 % 50)));
                }
            }
        },
    );

    let mut flow2 = OrderFlow::new(43, 300, 50);
    let mut active: Vec<u64> = Vec::new();
    run_phase(
        "Test 2: Order Modification",
        &mut engine,
        &mut histogram,
        |engine, histogram, n| {
            let base_id = 10_000_000u64;
            for i in 0..n {
                let start = Instant::now();
                match i % 3 {
                    0 => {
                        let id = base_id + i as u64;
                        engine.place(PlaceOrder::limit(id, Side::Buy, 10, 300 + (i as i64 % 10)));
                        active.push(id);
                    }
                    1 if !active.is_empty() => {
                        let id = active[i % active.len()];
                        engine.modify(id, 15, 300 + (i as i64 % 15));
                    }
                    _ => {
                        if let Some(id) = active.pop() {
                            engine.cancel(id);
                        }
                    }
                }
                let _ = histogram.record(start.elapsed().as_nanos() as u64);
            }
        },
    );

    run_phase(
        "Test 3: Mixed Workload",
        &mut engine,
        &mut histogram,
        |engine, histogram, n| {
            for _ in 0..n {
                let order = flow2.next_order(true);
                let roll = order.id % 20;

                let start = Instant::now();
                if roll < 15 {
                    engine.place(order);
                } else if roll < 18 {
                    engine.process_command(Command::Cancel(CancelOrder {
                        id: order.id.saturating_sub(100),
                    }));
                } else {
                    engine.process_command(Command::Modify(ModifyOrder {
                        id: order.id.saturating_sub(50),
                        new_shares: order.shares + 5,
                        new_price: 300 + (order.id as i64 % 7),
                    }));
                }
                let _ = histogram.record(start.elapsed().as_nanos() as u64);
            }
        },
    );

    running.store(false, Ordering::Relaxed);
    consumer.join().expect("consumer thread panicked");

    let stats = engine.stats();
    println!("\n=== FINAL RESULTS ===");
    println!("Total Trades Consumed: {}", total_trades.load(Ordering::Relaxed));
    println!(
        "Trades Published/Dropped: {}/{}",
        stats.trades_published, stats.trades_dropped
    );
    println!("Commands Dropped (pool exhaustion): {}", stats.orders_dropped);
    println!("Live Orders Remaining: {}", engine.live_order_count());
    println!("Stop Orders Remaining: {}", engine.armed_stop_count());
}
