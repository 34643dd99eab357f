//! The six concrete end-to-end scenarios from the matching engine's
//! specification, run directly against the book and engine.

use liquidity_lab_core::prelude::*;

fn limit(id: u64, agent: u64, qty: u64, side: Side, price: u64) -> Order {
    Order::new_limit(OrderId(id), AgentId(agent), "TICK", qty, side, Price(price), 0, None)
}

fn market(id: u64, agent: u64, qty: u64, side: Side) -> Order {
    Order::new_market(OrderId(id), AgentId(agent), "TICK", qty, side, 0)
}

#[test]
fn scenario_1_empty_book_limit_rest() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    book.add(limit(1, 1, 10, Side::Buy, 10_000), 0, None, &mut events).unwrap();

    assert_eq!(book.best_bid(), Some(Price(10_000)));
    assert_eq!(book.best_ask(), None);
    assert_eq!(book.level_volume(Side::Buy, Price(10_000)), 10);
    assert_eq!(events.by_kind(EventKind::OrderAdded).count(), 1);
}

#[test]
fn scenario_2_exact_quantity_cross() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    let engine = MatchingEngine::new();
    book.add(limit(1, 1, 50, Side::Sell, 10_000), 0, None, &mut events).unwrap(); // A

    let result = engine
        .process(limit(2, 2, 50, Side::Buy, 10_000), &book, 1, None, &mut events)
        .unwrap();

    assert_eq!(result.status, OrderStatus::Filled);
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.best_ask(), None);
    assert_eq!(events.by_kind(EventKind::Transaction).count(), 1);
    assert_eq!(events.by_kind(EventKind::OrderExecuted).count(), 2, "A and B both filled");
}

#[test]
fn scenario_3_partial_fill_reenters_with_priority_preserved() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    let engine = MatchingEngine::new();
    book.add(limit(1, 1, 30, Side::Sell, 10_000), 0, None, &mut events).unwrap(); // A
    book.add(limit(2, 2, 40, Side::Sell, 10_000), 0, None, &mut events).unwrap(); // B

    engine
        .process(limit(3, 3, 10, Side::Buy, 10_000), &book, 1, None, &mut events)
        .unwrap(); // X fills 10 of A

    // A's remainder (20) re-entered at the head: level volume is 20 + 40.
    assert_eq!(book.level_volume(Side::Sell, Price(10_000)), 60);

    engine
        .process(limit(4, 4, 25, Side::Buy, 10_000), &book, 2, None, &mut events)
        .unwrap();
    // A's remaining 20 fully consumed, then 5 of B's 40 -> B has 35 left.
    assert_eq!(book.level_volume(Side::Sell, Price(10_000)), 35);
}

#[test]
fn scenario_4_market_order_walks_multiple_levels() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    let engine = MatchingEngine::new();
    book.add(limit(1, 1, 50, Side::Sell, 10_000), 0, None, &mut events).unwrap();
    book.add(limit(2, 2, 30, Side::Sell, 10_100), 0, None, &mut events).unwrap();

    let result = engine.process(market(3, 3, 70, Side::Buy), &book, 1, None, &mut events).unwrap();

    assert_eq!(result.status, OrderStatus::Filled);
    assert_eq!(events.by_kind(EventKind::Transaction).count(), 2);
    assert_eq!(book.level_volume(Side::Sell, Price(10_100)), 10);
}

#[test]
fn scenario_5_market_order_exhausts_liquidity() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    let engine = MatchingEngine::new();
    book.add(limit(1, 1, 20, Side::Sell, 10_000), 0, None, &mut events).unwrap();

    let result = engine.process(market(2, 2, 50, Side::Buy), &book, 1, None, &mut events).unwrap();

    assert_eq!(events.by_kind(EventKind::Transaction).count(), 1);
    assert_eq!(result.quantity, 30, "residual unfilled");
    assert_eq!(book.best_ask(), None);
    assert_eq!(book.best_bid(), None, "market orders never rest");
}

#[test]
fn scenario_6_cancel_by_id() {
    let book = LimitOrderBook::new("TICK");
    let mut events = EventStream::new();
    book.add(limit(1, 1, 10, Side::Buy, 9_900), 0, None, &mut events).unwrap();

    book.cancel(OrderId(1), AgentId(1), 0, None, &mut events).unwrap();
    assert_eq!(book.best_bid(), None);

    let err = book.cancel(OrderId(1), AgentId(1), 0, None, &mut events);
    assert!(matches!(err, Err(SimError::UnknownOrder { .. })));
}
