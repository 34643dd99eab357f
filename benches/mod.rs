//! Benchmarks for the matching engine's hot path and the scheduler's
//! activation throughput, grounded in the teacher's `benches/mod.rs` +
//! `benches/order_book/` registration pattern.

use criterion::{Criterion, criterion_group, criterion_main};
use liquidity_lab_core::prelude::*;
use std::hint::black_box;

fn resting_book(levels: u64, orders_per_level: u64) -> LimitOrderBook {
    let book = LimitOrderBook::new("BENCH");
    let mut events = EventStream::new();
    let mut id = 0u64;
    for level in 0..levels {
        let price = Price(10_000 + level * 100);
        for _ in 0..orders_per_level {
            id += 1;
            let order = Order::new_limit(
                OrderId(id),
                AgentId(1),
                "BENCH",
                10,
                Side::Sell,
                price,
                0,
                None,
            );
            book.add(order, 0, None, &mut events).unwrap();
        }
    }
    book
}

fn bench_matching(c: &mut Criterion) {
    let engine = MatchingEngine::new();
    c.bench_function("matching_market_order_walks_one_level", |b| {
        b.iter_batched(
            || (resting_book(5, 20), EventStream::new()),
            |(book, mut events)| {
                let order = Order::new_market(OrderId(u64::MAX), AgentId(2), "BENCH", 190, Side::Buy, 1);
                black_box(engine.process(order, &book, 1, None, &mut events).unwrap());
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_book_add_cancel(c: &mut Criterion) {
    c.bench_function("book_add_then_cancel", |b| {
        b.iter_batched(
            || (LimitOrderBook::new("BENCH"), EventStream::new()),
            |(book, mut events)| {
                let order = Order::new_limit(OrderId(1), AgentId(1), "BENCH", 10, Side::Buy, Price(10_000), 0, None);
                book.add(order, 0, None, &mut events).unwrap();
                book.cancel(OrderId(1), AgentId(1), 0, None, &mut events).unwrap();
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_scheduler_churn(c: &mut Criterion) {
    c.bench_function("scheduler_pop_and_reschedule", |b| {
        b.iter_batched(
            || {
                let mut scheduler = Scheduler::new();
                for i in 0..1_000u64 {
                    scheduler.register(AgentId(i), i).unwrap();
                }
                scheduler
            },
            |mut scheduler| {
                for _ in 0..1_000 {
                    let (time, agent_id) = scheduler.pop_next().unwrap();
                    scheduler.reschedule(agent_id, time + 1_000).unwrap();
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_matching, bench_book_add_cancel, bench_scheduler_churn);
criterion_main!(benches);
