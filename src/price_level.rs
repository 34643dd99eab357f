//! `PriceLevel`: a FIFO queue of resting limit orders at a single price
//! (spec §3, §4.1).

use crate::order::{Order, OrderId, Price};
use std::collections::VecDeque;

/// All resting orders at a single price, in submission order.
///
/// `SegQueue`/`DashMap`-backed queues (as used by the `pricelevel` crate
/// this workspace is descended from) are built for lock-free concurrent
/// producers; they don't support removing an arbitrary id or reinserting
/// at the front, both of which price-time priority requires here. A plain
/// `VecDeque` is the right tool for a single-threaded FIFO with those
/// operations, so that's what backs this level.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: Price,
    orders: VecDeque<Order>,
    total_volume: u64,
    /// One-shot marker: the id of the order most recently removed from the
    /// *front* of this level via a partial fill. The next `enqueue` call
    /// carrying this id is inserted at the head instead of the tail,
    /// preserving the order's original time priority (spec §4.2). Cleared
    /// unconditionally after the next `enqueue`, regardless of whether it
    /// matched, so a partial fill can't jump a later, unrelated queue.
    last_partial_order_id: Option<OrderId>,
}

impl PriceLevel {
    pub fn new(price: Price) -> PriceLevel {
        PriceLevel {
            price,
            orders: VecDeque::new(),
            total_volume: 0,
            last_partial_order_id: None,
        }
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn total_volume(&self) -> u64 {
        self.total_volume
    }

    pub fn count(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Appends at the tail, unless `order.order_id` matches the one-shot
    /// partial-refill marker, in which case it goes to the head.
    ///
    /// # Panics
    /// Panics if `order.price() != Some(self.price)` — callers must route
    /// an order to the matching level before enqueueing (an internal
    /// invariant, not a user-facing error).
    pub fn enqueue(&mut self, order: Order) {
        assert_eq!(
            order.price(),
            Some(self.price),
            "order price does not match price level"
        );
        self.total_volume += order.quantity;
        if self.last_partial_order_id == Some(order.order_id) {
            self.orders.push_front(order);
        } else {
            self.orders.push_back(order);
        }
        self.last_partial_order_id = None;
    }

    pub fn peek_head(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Pops the head order. Marks it as the level's most-recently-popped
    /// id: if the matching engine re-adds an order with this same id (the
    /// remainder of a partial fill), `enqueue` will place it at the head
    /// rather than the tail, preserving its original time priority
    /// (spec §4.2). A caller that pops a *different* order afterwards, or
    /// one that fully executes without re-adding, simply never triggers
    /// the marker again — `enqueue` always clears it after one use.
    pub fn pop_head(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        self.total_volume = self.total_volume.saturating_sub(order.quantity);
        self.last_partial_order_id = Some(order.order_id);
        Some(order)
    }

    /// Removes a specific order by id, wherever it sits in the queue.
    /// `O(n)` in level depth but levels at a given price are shallow in
    /// practice; the book's `order_index` is what gives `O(log P)`
    /// cancellation overall by avoiding a scan across price levels.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.order_id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total_volume = self.total_volume.saturating_sub(order.quantity);
        if self.last_partial_order_id == Some(order_id) {
            self.last_partial_order_id = None;
        }
        Some(order)
    }

    /// All resting orders, oldest first — for snapshots and tests.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Walks the level head-to-tail to satisfy `demand` in one pass: each
    /// order whose `quantity <= demand` is fully consumed and removed; the
    /// first order that doesn't fit is partially consumed for whatever
    /// demand remains, also removed, with `last_partial_order_id` set so a
    /// caller that re-adds its remainder gets it back at the head (spec
    /// §4.1 `pop_to_meet_demand`). Grounded on
    /// `original_source/src/lob/lob_price_level.py`'s
    /// `pop_orders_to_meet_demand`. Stops as soon as demand is met or the
    /// level empties, returning `(order, filled_qty)` pairs in the order
    /// they were consumed.
    pub fn pop_to_meet_demand(&mut self, demand: u64) -> Vec<(Order, u64)> {
        let mut filled = Vec::new();
        let mut remaining = demand;

        while remaining > 0 {
            let Some(order) = self.orders.pop_front() else {
                break;
            };
            self.total_volume = self.total_volume.saturating_sub(order.quantity);
            if order.quantity <= remaining {
                remaining -= order.quantity;
                let qty = order.quantity;
                filled.push((order, qty));
            } else {
                filled.push((order, remaining));
                self.last_partial_order_id = Some(order.order_id);
                return filled;
            }
        }

        self.last_partial_order_id = None;
        filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{AgentId, Side};

    fn limit(id: u64, qty: u64, price: u64) -> Order {
        Order::new_limit(
            OrderId(id),
            AgentId(1),
            "TICK",
            qty,
            Side::Sell,
            Price(price),
            0,
            None,
        )
    }

    #[test]
    fn enqueue_tracks_volume_and_count() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 10, 100));
        level.enqueue(limit(2, 5, 100));
        assert_eq!(level.total_volume(), 15);
        assert_eq!(level.count(), 2);
    }

    #[test]
    fn pop_head_removes_fifo_and_updates_volume() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100));
        level.enqueue(limit(2, 40, 100));
        let popped = level.pop_head().unwrap();
        assert_eq!(popped.order_id, OrderId(1));
        assert_eq!(level.total_volume(), 40);
    }

    #[test]
    fn partial_fill_reenters_at_head() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100)); // A
        level.enqueue(limit(2, 40, 100)); // B
        let popped = level.pop_head().unwrap(); // caller takes 10 of A, owes back 20
        assert_eq!(popped.order_id, OrderId(1));
        let mut remainder = limit(1, 20, 100);
        remainder.quantity = 20;
        // A's remainder (20) goes back in; it should land at the head.
        level.enqueue(remainder);
        assert_eq!(level.peek_head().unwrap().order_id, OrderId(1));
        assert_eq!(level.total_volume(), 60);
    }

    #[test]
    fn marker_is_one_shot() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100));
        level.enqueue(limit(2, 40, 100));
        let _ = level.pop_head(); // marks id 1 for head re-entry
        // Some unrelated order enqueues first; this consumes the marker.
        level.enqueue(limit(3, 5, 100));
        assert_eq!(level.peek_head().unwrap().order_id, OrderId(2));
        // Now if id 1 came back late, it goes to the tail like anyone else.
        level.enqueue(limit(1, 20, 100));
        assert_eq!(level.orders.back().unwrap().order_id, OrderId(1));
    }

    #[test]
    fn remove_by_id_updates_aggregates() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100));
        level.enqueue(limit(2, 40, 100));
        let removed = level.remove(OrderId(1)).unwrap();
        assert_eq!(removed.order_id, OrderId(1));
        assert_eq!(level.total_volume(), 40);
        assert_eq!(level.count(), 1);
    }

    #[test]
    fn pop_to_meet_demand_fully_consumes_orders_that_fit() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100));
        level.enqueue(limit(2, 40, 100));
        let filled = level.pop_to_meet_demand(30);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].0.order_id, OrderId(1));
        assert_eq!(filled[0].1, 30);
        assert_eq!(level.total_volume(), 40);
        assert_eq!(level.peek_head().unwrap().order_id, OrderId(2));
    }

    #[test]
    fn pop_to_meet_demand_partially_consumes_the_last_order_and_marks_it() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 30, 100));
        level.enqueue(limit(2, 40, 100));
        let filled = level.pop_to_meet_demand(40);
        // A (30) fully consumed, then 10 of B (40) consumed, B's remaining
        // 30 is the caller's responsibility to re-add.
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].0.order_id, OrderId(1));
        assert_eq!(filled[0].1, 30);
        assert_eq!(filled[1].0.order_id, OrderId(2));
        assert_eq!(filled[1].1, 10);
        assert!(level.is_empty());
        assert_eq!(level.total_volume(), 0);

        // Re-adding B's remainder should land at the head via the marker.
        let mut remainder = limit(2, 30, 100);
        remainder.quantity = 30;
        level.enqueue(remainder);
        assert_eq!(level.peek_head().unwrap().order_id, OrderId(2));
    }

    #[test]
    fn pop_to_meet_demand_stops_when_level_empties_before_demand_met() {
        let mut level = PriceLevel::new(Price(100));
        level.enqueue(limit(1, 10, 100));
        let filled = level.pop_to_meet_demand(50);
        assert_eq!(filled.len(), 1);
        assert_eq!(filled[0].1, 10);
        assert!(level.is_empty());
    }
}
