//! `LimitOrderBook`: two price-indexed collections of `PriceLevel`s plus an
//! id index enabling O(log P) best-price access and cancellation (spec §3,
//! §4.2).

use crate::error::SimError;
use crate::event::{EventId, EventPayload, EventStream};
use crate::order::{Order, OrderId, Price, Side};
use crate::price_level::PriceLevel;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::cell::RefCell;
use tracing::trace;

/// Maps a price to a sort key such that the *minimum* key is always the
/// best price on that side — bids are keyed by the bit-complement of the
/// price so price-descending becomes key-ascending; asks are keyed
/// directly (spec §4.2 "Sort-key convention").
fn sort_key(side: Side, price: Price) -> u64 {
    match side {
        Side::Buy => u64::MAX - price.0,
        Side::Sell => price.0,
    }
}

fn price_from_key(side: Side, key: u64) -> Price {
    match side {
        Side::Buy => Price(u64::MAX - key),
        Side::Sell => Price(key),
    }
}

/// A resting order's location, enabling O(log P) removal by id without
/// scanning every price level.
#[derive(Debug, Clone, Copy)]
struct OrderLocation {
    side: Side,
    price: Price,
}

/// Two sorted collections of `PriceLevel`s plus an `order_id -> location`
/// index. Single ticker per book; the `Simulation` owns one per registered
/// ticker (spec §3 "Ownership": "`LimitOrderBook` exclusively owns its
/// `PriceLevel`s").
pub struct LimitOrderBook {
    ticker: String,
    bids: SkipMap<u64, RefCell<PriceLevel>>,
    asks: SkipMap<u64, RefCell<PriceLevel>>,
    order_index: DashMap<OrderId, OrderLocation>,
}

impl LimitOrderBook {
    pub fn new(ticker: impl Into<String>) -> LimitOrderBook {
        LimitOrderBook {
            ticker: ticker.into(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_index: DashMap::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    fn side_map(&self, side: Side) -> &SkipMap<u64, RefCell<PriceLevel>> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Best price on `side`, or `None` if that side is empty. `O(log P)`:
    /// the skiplist's front entry is already the minimum key.
    pub fn best(&self, side: Side) -> Option<Price> {
        let entry = self.side_map(side).iter().next()?;
        Some(price_from_key(side, *entry.key()))
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.best(Side::Buy)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.best(Side::Sell)
    }

    pub fn level_volume(&self, side: Side, price: Price) -> u64 {
        let key = sort_key(side, price);
        self.side_map(side)
            .get(&key)
            .map(|entry| entry.value().borrow().total_volume())
            .unwrap_or(0)
    }

    /// Invariant check used by tests and the run loop's fatal-error path
    /// (spec §8: "`best_bid() < best_ask()` whenever both are defined").
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Inserts a limit order at its price, creating the level on first use.
    /// Emits `OrderAdded`.
    pub fn add(
        &self,
        order: Order,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Result<(), SimError> {
        let price = order.price().ok_or_else(|| SimError::InvalidOrder {
            reason: "only limit orders may rest in the book".into(),
        })?;
        let side = order.side;
        let key = sort_key(side, price);
        let map = self.side_map(side);
        if map.get(&key).is_none() {
            map.insert(key, RefCell::new(PriceLevel::new(price)));
        }
        let entry = map.get(&key).expect("level just inserted");
        let order_id = order.order_id;
        let ticker = order.ticker.clone();
        entry.value().borrow_mut().enqueue(order);
        self.order_index
            .insert(order_id, OrderLocation { side, price });
        trace!(?order_id, ?side, %price, "order added to book");
        events.push(timestamp, trigger, EventPayload::OrderAdded { ticker, order_id });
        Ok(())
    }

    /// Pops the head order from the best level on `side`. Emits
    /// `OrderRemoved`. Drops the level from the sorted collection if it's
    /// now empty (spec §3 invariant (c)).
    pub fn pop_top(
        &self,
        side: Side,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Result<Order, SimError> {
        let key = self
            .side_map(side)
            .iter()
            .next()
            .map(|e| *e.key())
            .ok_or_else(|| SimError::InvariantViolation {
                detail: format!("pop_top called with empty {side:?} side"),
            })?;
        let map = self.side_map(side);
        let entry = map.get(&key).expect("key came from front()");
        let (order, now_empty) = {
            let mut level = entry.value().borrow_mut();
            let order = level
                .pop_head()
                .expect("front level must have at least one order");
            (order, level.is_empty())
        };
        if now_empty {
            map.remove(&key);
        }
        self.order_index.remove(&order.order_id);
        events.push(
            timestamp,
            trigger,
            EventPayload::OrderRemoved {
                ticker: order.ticker.clone(),
                order_id: order.order_id,
            },
        );
        Ok(order)
    }

    /// Removes a resting order by id, wherever it sits. Emits
    /// `OrderCanceled` then `OrderRemoved`.
    pub fn cancel(
        &self,
        order_id: OrderId,
        agent_id: crate::order::AgentId,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Result<(), SimError> {
        let location = self
            .order_index
            .remove(&order_id)
            .ok_or(SimError::UnknownOrder { order_id })?
            .1;
        let key = sort_key(location.side, location.price);
        let map = self.side_map(location.side);
        let entry = map.get(&key).ok_or(SimError::InvariantViolation {
            detail: format!("order_index pointed at missing level for {order_id:?}"),
        })?;
        let (order, now_empty) = {
            let mut level = entry.value().borrow_mut();
            let order = level
                .remove(order_id)
                .ok_or(SimError::InvariantViolation {
                    detail: format!("order_index pointed at wrong level for {order_id:?}"),
                })?;
            (order, level.is_empty())
        };
        if now_empty {
            map.remove(&key);
        }
        events.push(
            timestamp,
            trigger,
            EventPayload::OrderCanceled {
                ticker: order.ticker.clone(),
                order_id,
                agent_id,
            },
        );
        events.push(
            timestamp,
            trigger,
            EventPayload::OrderRemoved {
                ticker: order.ticker,
                order_id,
            },
        );
        Ok(())
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.order_index.contains_key(&order_id)
    }

    pub fn order_count(&self) -> usize {
        self.order_index.len()
    }

    /// Removes a single resting order that has reached its `expiration_time`,
    /// emitting `OrderExpired` then `OrderRemoved` (spec §5, §9 "expiry
    /// sweep"; distinct from `cancel`'s `OrderCanceled`, since no agent
    /// requested this removal).
    fn expire_one(
        &self,
        order_id: OrderId,
        timestamp: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Result<(), SimError> {
        let location = self
            .order_index
            .remove(&order_id)
            .ok_or(SimError::UnknownOrder { order_id })?
            .1;
        let key = sort_key(location.side, location.price);
        let map = self.side_map(location.side);
        let entry = map.get(&key).ok_or(SimError::InvariantViolation {
            detail: format!("order_index pointed at missing level for {order_id:?}"),
        })?;
        let (order, now_empty) = {
            let mut level = entry.value().borrow_mut();
            let order = level.remove(order_id).ok_or(SimError::InvariantViolation {
                detail: format!("order_index pointed at wrong level for {order_id:?}"),
            })?;
            (order, level.is_empty())
        };
        if now_empty {
            map.remove(&key);
        }
        events.push(
            timestamp,
            trigger,
            EventPayload::OrderExpired {
                ticker: order.ticker.clone(),
                order_id,
                agent_id: order.agent_id,
            },
        );
        events.push(
            timestamp,
            trigger,
            EventPayload::OrderRemoved {
                ticker: order.ticker,
                order_id,
            },
        );
        Ok(())
    }

    /// Scans both sides for resting orders whose `expiration_time` has
    /// passed and removes them, returning the ids swept. Runs ahead of each
    /// activation (spec §5).
    pub fn sweep_expired(
        &self,
        now: u64,
        trigger: Option<EventId>,
        events: &mut EventStream,
    ) -> Vec<OrderId> {
        let mut due = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            for entry in self.side_map(side).iter() {
                for order in entry.value().borrow().iter() {
                    if order.expiration_time().is_some_and(|t| t <= now) {
                        due.push(order.order_id);
                    }
                }
            }
        }
        for order_id in &due {
            // Already removed by an earlier iteration (shouldn't happen,
            // ids are unique) or concurrently modified — skip defensively.
            let _ = self.expire_one(*order_id, now, trigger, events);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::AgentId;

    fn limit(id: u64, qty: u64, price: u64, side: Side) -> Order {
        Order::new_limit(OrderId(id), AgentId(1), "TICK", qty, side, Price(price), 0, None)
    }

    #[test]
    fn empty_book_limit_rest() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        book.add(limit(1, 10, 10_000, Side::Buy), 0, None, &mut events)
            .unwrap();
        assert_eq!(book.best_bid(), Some(Price(10_000)));
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.level_volume(Side::Buy, Price(10_000)), 10);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn cancel_round_trip_restores_prior_state() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        book.add(limit(1, 10, 9_900, Side::Buy), 0, None, &mut events)
            .unwrap();
        book.cancel(OrderId(1), AgentId(1), 0, None, &mut events)
            .unwrap();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.order_count(), 0);
        let err = book.cancel(OrderId(1), AgentId(1), 0, None, &mut events);
        assert!(matches!(err, Err(SimError::UnknownOrder { .. })));
    }

    #[test]
    fn best_prices_never_cross() {
        let book = LimitOrderBook::new("TICK");
        let mut events = EventStream::new();
        book.add(limit(1, 10, 9_900, Side::Buy), 0, None, &mut events)
            .unwrap();
        book.add(limit(2, 10, 10_100, Side::Sell), 0, None, &mut events)
            .unwrap();
        assert!(!book.is_crossed());
    }
}
