//! The matching engine: a stateless processor that walks the opposite side
//! of the book for an incoming order and emits the full causal chain of
//! events for that walk (spec §4.3).

use crate::book::LimitOrderBook;
use crate::error::SimError;
use crate::event::{EventId, EventPayload, EventStream};
use crate::order::{Order, OrderKind, OrderStatus, Side};

/// Stateless: all state lives in the book and the event stream passed in.
#[derive(Debug, Default, Clone, Copy)]
pub struct MatchingEngine;

impl MatchingEngine {
    pub fn new() -> MatchingEngine {
        MatchingEngine
    }

    /// Processes one incoming order against `book`, emitting events to
    /// `events` in strict causal order (spec §4.3 "Ordering guarantees").
    /// `trigger` is the id of the event representing the incoming order's
    /// own submission.
    pub fn process(
        &self,
        mut order: Order,
        book: &LimitOrderBook,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Result<Order, SimError> {
        order.validate()?;
        let opposite = order.side.opposite();

        loop {
            if order.quantity == 0 {
                break;
            }
            let Some(opp_best) = book.best(opposite) else {
                break;
            };
            if !self.marketable(&order, opp_best) {
                break;
            }

            let resting = book.pop_top(opposite, timestamp, trigger, events)?;
            let (order_next, resting_next) =
                self.settle_one(order, resting, timestamp, trigger, events);
            order = order_next;
            if resting_next.quantity > 0 {
                // Re-adding here lets the book's one-shot partial marker
                // place this order back at the head of its level (spec §4.2).
                book.add(resting_next, timestamp, trigger, events)?;
            }
        }

        if order.quantity > 0 {
            match order.kind {
                OrderKind::Limit { .. } => {
                    book.add(order.clone(), timestamp, trigger, events)?;
                }
                OrderKind::Market => {
                    // Residual is dropped, unfilled, with no rest (spec §4.3
                    // step 3, and spec §9's explicit open-question resolution:
                    // market-order residual handling is drop-with-no-rest).
                    tracing::debug!(
                        order_id = ?order.order_id,
                        remaining = order.quantity,
                        "market order residual unfilled, dropped"
                    );
                }
            }
        }

        Ok(order)
    }

    /// Whether the incoming order may still cross at `opp_best` (spec §4.3
    /// step 1).
    fn marketable(&self, order: &Order, opp_best: crate::order::Price) -> bool {
        match order.kind {
            OrderKind::Market => true,
            OrderKind::Limit { price, .. } => match order.side {
                Side::Buy => opp_best <= price,
                Side::Sell => opp_best >= price,
            },
        }
    }

    /// Executes a single trade between the incoming `order` and the
    /// `resting` order popped from the book, emitting `Transaction` and the
    /// modification/execution events for both sides (spec §4.3 steps 2b-2g).
    /// Returns the (possibly partially filled) incoming order and the
    /// resting order's post-trade state (re-added to the book by this
    /// function when it has quantity left).
    fn settle_one(
        &self,
        mut order: Order,
        mut resting: Order,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> (Order, Order) {
        let trade_price = resting.price().expect("resting order always a limit order");
        let trade_qty = order.quantity.min(resting.quantity);

        let (buyer_id, seller_id, buy_order_id, sell_order_id) = match order.side {
            Side::Buy => (order.agent_id, resting.agent_id, order.order_id, resting.order_id),
            Side::Sell => (resting.agent_id, order.agent_id, resting.order_id, order.order_id),
        };
        events.push(
            timestamp,
            trigger,
            EventPayload::Transaction {
                ticker: resting.ticker.clone(),
                qty: trade_qty,
                price: trade_price,
                buyer_id,
                seller_id,
                buy_order_id,
                sell_order_id,
            },
        );

        let resting_old_qty = resting.quantity;
        resting.quantity -= trade_qty;
        if resting.quantity > 0 {
            events.push(
                timestamp,
                trigger,
                EventPayload::OrderModified {
                    ticker: resting.ticker.clone(),
                    order_id: resting.order_id,
                    old_qty: resting_old_qty,
                    new_qty: resting.quantity,
                },
            );
        } else {
            resting.status = OrderStatus::Filled;
            events.push(
                timestamp,
                trigger,
                EventPayload::OrderExecuted {
                    ticker: resting.ticker.clone(),
                    order_id: resting.order_id,
                    agent_id: resting.agent_id,
                },
            );
        }

        let order_old_qty = order.quantity;
        order.quantity -= trade_qty;
        if order.quantity > 0 {
            events.push(
                timestamp,
                trigger,
                EventPayload::OrderModified {
                    ticker: order.ticker.clone(),
                    order_id: order.order_id,
                    old_qty: order_old_qty,
                    new_qty: order.quantity,
                },
            );
        } else {
            order.status = OrderStatus::Filled;
            events.push(
                timestamp,
                trigger,
                EventPayload::OrderExecuted {
                    ticker: order.ticker.clone(),
                    order_id: order.order_id,
                    agent_id: order.agent_id,
                },
            );
        }

        (order, resting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::LimitOrderBook;
    use crate::event::EventKind;
    use crate::order::{AgentId, OrderId, Price};

    fn limit(id: u64, agent: u64, qty: u64, side: Side, price: u64) -> Order {
        Order::new_limit(OrderId(id), AgentId(agent), "TICK", qty, side, Price(price), 0, None)
    }

    fn market(id: u64, agent: u64, qty: u64, side: Side) -> Order {
        Order::new_market(OrderId(id), AgentId(agent), "TICK", qty, side, 0)
    }

    #[test]
    fn exact_quantity_cross() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        let engine = MatchingEngine::new();
        book.add(limit(1, 10, 50, Side::Sell, 10_000), 0, None, &mut events)
            .unwrap();

        let result = engine
            .process(limit(2, 20, 50, Side::Buy, 10_000), &book, 1, None, &mut events)
            .unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        let kinds: Vec<_> = events.iter().map(|e| e.payload.kind()).collect();
        assert!(kinds.contains(&EventKind::Transaction));
        assert_eq!(
            events.by_kind(EventKind::OrderExecuted).count(),
            2,
            "both resting and incoming orders fully filled"
        );
    }

    #[test]
    fn partial_fill_reenters_with_priority_preserved() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        let engine = MatchingEngine::new();
        book.add(limit(1, 10, 30, Side::Sell, 10_000), 0, None, &mut events)
            .unwrap(); // A
        book.add(limit(2, 11, 40, Side::Sell, 10_000), 0, None, &mut events)
            .unwrap(); // B

        engine
            .process(limit(3, 20, 10, Side::Buy, 10_000), &book, 1, None, &mut events)
            .unwrap();
        assert_eq!(book.level_volume(Side::Sell, Price(10_000)), 60);

        engine
            .process(limit(4, 21, 25, Side::Buy, 10_000), &book, 2, None, &mut events)
            .unwrap();
        // A's remaining 20 fully consumed, then 5 of B's 40 consumed -> B has 35 left.
        assert_eq!(book.level_volume(Side::Sell, Price(10_000)), 35);
    }

    #[test]
    fn market_order_walks_multiple_levels() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        let engine = MatchingEngine::new();
        book.add(limit(1, 10, 50, Side::Sell, 10_000), 0, None, &mut events)
            .unwrap();
        book.add(limit(2, 11, 30, Side::Sell, 10_100), 0, None, &mut events)
            .unwrap();

        let result = engine
            .process(market(3, 20, 70, Side::Buy), &book, 1, None, &mut events)
            .unwrap();

        assert_eq!(result.status, OrderStatus::Filled);
        assert_eq!(book.level_volume(Side::Sell, Price(10_100)), 10);
    }

    #[test]
    fn market_order_exhausts_liquidity_and_does_not_rest() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        let engine = MatchingEngine::new();
        book.add(limit(1, 10, 20, Side::Sell, 10_000), 0, None, &mut events)
            .unwrap();

        let result = engine
            .process(market(2, 20, 50, Side::Buy), &book, 1, None, &mut events)
            .unwrap();

        assert_eq!(result.quantity, 30, "residual unfilled, not rested");
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.best_bid(), None, "market orders never rest");
    }
}
