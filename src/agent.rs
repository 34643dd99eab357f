//! The agent contract (spec §4.5): opaque behavior producing orders and
//! cancellations when activated, consuming a read-only market view and a
//! submission port. Agents never hold a back-reference to the simulation
//! (spec §9 "Cyclic references") — only their own `agent_id`, the ports
//! handed to them for the duration of one activation, and whatever RNG and
//! bookkeeping they own privately.

use crate::book::LimitOrderBook;
use crate::error::SimError;
use crate::event::EventStream;
use crate::market_data::MarketData;
use crate::matching::MatchingEngine;
use crate::order::{AgentId, Order, OrderId, Price, Side};

/// Which of the two archetypes named in spec §4.5 an agent is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    /// Schedules its own next activation via `now + Exponential(rate)`.
    TimeActivated,
    /// Registered on a notification channel; the run loop checks its
    /// trigger predicate after each event batch (spec §4.5, and the
    /// `condition_agents` sweep this is grounded on).
    ConditionActivated,
}

/// Read-only view of market state an agent may observe (spec §4.5, §6).
/// Agents must not retain this across activations — it borrows the book
/// and market data for the duration of one `activate` call only (spec §5
/// "Shared resources").
pub struct MarketView<'a> {
    book: &'a LimitOrderBook,
    market_data: &'a MarketData,
}

impl<'a> MarketView<'a> {
    pub fn new(book: &'a LimitOrderBook, market_data: &'a MarketData) -> MarketView<'a> {
        MarketView { book, market_data }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.book.best_bid()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.book.best_ask()
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.as_decimal() + ask.as_decimal()) / 2.0),
            _ => None,
        }
    }

    pub fn last_trade_price(&self) -> Option<Price> {
        self.market_data.last_trade_price()
    }

    /// OHLCV bars for a configured period width, oldest first, including
    /// the in-progress bar (spec §4.5, §6; grounded on
    /// `original_source/src/market/market_data.py`'s `get_ohlcv`).
    pub fn bars(&self, period: u64) -> &[crate::market_data::OhlcvBar] {
        self.market_data.bars(period)
    }
}

/// Agent-facing API for submitting and canceling orders (spec §6). Every
/// call fully completes through the matching engine and its events before
/// returning (spec §4.4: "every such call fully completes ... before the
/// agent returns").
pub struct SubmissionPort<'a> {
    ticker: &'a str,
    agent_id: AgentId,
    timestamp: u64,
    book: &'a LimitOrderBook,
    engine: &'a MatchingEngine,
    events: &'a mut EventStream,
    next_order_id: &'a mut u64,
}

impl<'a> SubmissionPort<'a> {
    pub fn new(
        ticker: &'a str,
        agent_id: AgentId,
        timestamp: u64,
        book: &'a LimitOrderBook,
        engine: &'a MatchingEngine,
        events: &'a mut EventStream,
        next_order_id: &'a mut u64,
    ) -> SubmissionPort<'a> {
        SubmissionPort {
            ticker,
            agent_id,
            timestamp,
            book,
            engine,
            events,
            next_order_id,
        }
    }

    fn allocate_order_id(&mut self) -> OrderId {
        let id = OrderId(*self.next_order_id);
        *self.next_order_id += 1;
        id
    }

    pub fn place_limit(
        &mut self,
        side: Side,
        quantity: u64,
        price: Price,
    ) -> Result<OrderId, SimError> {
        let order_id = self.allocate_order_id();
        let order = Order::new_limit(
            order_id,
            self.agent_id,
            self.ticker,
            quantity,
            side,
            price,
            self.timestamp,
            None,
        );
        if let Err(err) = order.validate() {
            self.reject(order_id, &err);
            return Err(err);
        }
        let submission_event =
            self.events
                .push(self.timestamp, None, crate::event::EventPayload::OrderRequested {
                    ticker: self.ticker.to_string(),
                    order_id,
                    agent_id: self.agent_id,
                });
        match self
            .engine
            .process(order, self.book, self.timestamp, Some(submission_event), self.events)
        {
            Ok(_) => Ok(order_id),
            Err(err) => {
                self.reject(order_id, &err);
                Err(err)
            }
        }
    }

    pub fn place_market(&mut self, side: Side, quantity: u64) -> Result<OrderId, SimError> {
        let order_id = self.allocate_order_id();
        let order = Order::new_market(order_id, self.agent_id, self.ticker, quantity, side, self.timestamp);
        if let Err(err) = order.validate() {
            self.reject(order_id, &err);
            return Err(err);
        }
        let submission_event =
            self.events
                .push(self.timestamp, None, crate::event::EventPayload::OrderRequested {
                    ticker: self.ticker.to_string(),
                    order_id,
                    agent_id: self.agent_id,
                });
        match self
            .engine
            .process(order, self.book, self.timestamp, Some(submission_event), self.events)
        {
            Ok(_) => Ok(order_id),
            Err(err) => {
                self.reject(order_id, &err);
                Err(err)
            }
        }
    }

    pub fn cancel(&mut self, order_id: OrderId) -> Result<(), SimError> {
        match self
            .book
            .cancel(order_id, self.agent_id, self.timestamp, None, self.events)
        {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reject(order_id, &err);
                Err(err)
            }
        }
    }

    /// Converts a recoverable submission-boundary error into an
    /// `OrderRejected` event so the run continues with a record of what was
    /// refused (spec §7: "the run loop converts non-fatal errors into a
    /// rejection event ... and continues"). `InvariantViolation` is fatal
    /// and never reaches this path — callers propagate it upward instead.
    fn reject(&mut self, order_id: OrderId, err: &SimError) {
        self.events.push(
            self.timestamp,
            None,
            crate::event::EventPayload::OrderRejected {
                ticker: self.ticker.to_string(),
                order_id,
                agent_id: self.agent_id,
                reason: err.to_string(),
            },
        );
    }
}

/// An agent's decision function (spec §4.5). Implementors own whatever
/// strategy state and RNG they need; the core only requires enough surface
/// to schedule and activate them.
pub trait Agent {
    fn agent_id(&self) -> AgentId;

    fn kind(&self) -> AgentKind;

    /// One invocation of the agent's decision function. Time-activated
    /// agents must return their next due time; the return value is
    /// ignored for condition-activated agents (spec §4.4 "reschedule").
    fn activate(&mut self, now: u64, market: &MarketView, port: &mut SubmissionPort) -> u64;

    /// For `ConditionActivated` agents only: whether this activation's
    /// trigger predicate currently holds. Time-activated agents are never
    /// asked (the scheduler alone drives them); the default always
    /// returns `false` so a `TimeActivated` impl can ignore this entirely.
    fn should_trigger(&self, _now: u64, _market: &MarketView) -> bool {
        false
    }
}
