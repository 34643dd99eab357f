//! Order types: the immutable descriptors submitted by agents and consumed
//! by the matching engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique, monotonically assigned order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent identifier, assigned at registration time (spec §6: `agents[].id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite side, used when walking the book during matching.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Lifecycle status of an order (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Filled,
    Canceled,
    Expired,
}

/// Price quantized to a fixed tick, represented as an integer count of
/// ticks to avoid floating-point comparisons inside the book (spec §4.3
/// "Numeric semantics"). Two decimal digits by default means one tick is
/// `1 / 10^DEFAULT_TICK_SCALE` of the quoted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(pub u64);

/// Default number of decimal digits of precision a tick represents.
pub const DEFAULT_TICK_SCALE: u32 = 2;

impl Price {
    /// Build a `Price` from a decimal value, quantizing to `DEFAULT_TICK_SCALE`
    /// digits. Returns `None` if the value is not strictly positive.
    pub fn from_decimal(value: f64) -> Option<Price> {
        if value <= 0.0 || !value.is_finite() {
            return None;
        }
        let scale = 10u64.pow(DEFAULT_TICK_SCALE);
        Some(Price((value * scale as f64).round() as u64))
    }

    /// The value as a decimal, for display and agent-facing market views.
    pub fn as_decimal(self) -> f64 {
        let scale = 10u64.pow(DEFAULT_TICK_SCALE) as f64;
        self.0 as f64 / scale
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", DEFAULT_TICK_SCALE as usize, self.as_decimal())
    }
}

/// The two order kinds the matching engine accepts (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Marketable or resting order at an explicit price.
    Limit {
        price: Price,
        /// Simulation time at which the order should be swept as expired,
        /// if any (spec §5, §9 "expiry sweep").
        expiration_time: Option<u64>,
    },
    /// Executes immediately against available liquidity; never rests.
    Market,
}

/// An immutable submission descriptor. `quantity` and `status` are the only
/// fields that change over the order's life, and only the book/engine ever
/// mutate them (spec §3 "Ownership").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub agent_id: AgentId,
    pub ticker: String,
    pub quantity: u64,
    pub side: Side,
    pub kind: OrderKind,
    pub timestamp: u64,
    pub status: OrderStatus,
}

impl Order {
    /// Construct a new limit order. `order_id` is supplied by the caller
    /// (the `Simulation`'s owned monotonic counter, never a static).
    pub fn new_limit(
        order_id: OrderId,
        agent_id: AgentId,
        ticker: impl Into<String>,
        quantity: u64,
        side: Side,
        price: Price,
        timestamp: u64,
        expiration_time: Option<u64>,
    ) -> Order {
        Order {
            order_id,
            agent_id,
            ticker: ticker.into(),
            quantity,
            side,
            kind: OrderKind::Limit {
                price,
                expiration_time,
            },
            timestamp,
            status: OrderStatus::Open,
        }
    }

    /// Construct a new market order.
    pub fn new_market(
        order_id: OrderId,
        agent_id: AgentId,
        ticker: impl Into<String>,
        quantity: u64,
        side: Side,
        timestamp: u64,
    ) -> Order {
        Order {
            order_id,
            agent_id,
            ticker: ticker.into(),
            quantity,
            side,
            kind: OrderKind::Market,
            timestamp,
            status: OrderStatus::Open,
        }
    }

    /// `true` for `OrderKind::Limit`.
    pub fn is_limit(&self) -> bool {
        matches!(self.kind, OrderKind::Limit { .. })
    }

    /// The resting price, if this is a limit order.
    pub fn price(&self) -> Option<Price> {
        match self.kind {
            OrderKind::Limit { price, .. } => Some(price),
            OrderKind::Market => None,
        }
    }

    pub fn expiration_time(&self) -> Option<u64> {
        match self.kind {
            OrderKind::Limit {
                expiration_time, ..
            } => expiration_time,
            OrderKind::Market => None,
        }
    }

    /// Basic structural validity check, independent of book state
    /// (spec §4.3 "Error conditions").
    pub fn validate(&self) -> Result<(), crate::error::SimError> {
        match self.kind {
            OrderKind::Limit { price, .. } => {
                if price.0 == 0 {
                    return Err(crate::error::SimError::InvalidOrder {
                        reason: "limit order price must be strictly positive".into(),
                    });
                }
            }
            OrderKind::Market => {}
        }
        if self.quantity == 0 {
            return Err(crate::error::SimError::InvalidOrder {
                reason: "order quantity must be positive".into(),
            });
        }
        Ok(())
    }
}
