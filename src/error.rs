//! Crate-wide error taxonomy (spec §7).

use crate::order::{AgentId, OrderId};
use thiserror::Error;

/// Errors recoverable at the submission boundary: the book and event
/// stream are left unchanged and the caller receives the typed failure.
/// `InvariantViolation` is the one fatal variant; the run loop aborts on it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Non-positive quantity or price, a market order carrying a price, or
    /// a limit order missing one.
    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// Operation targets a ticker that was never registered.
    #[error("unknown ticker: {ticker}")]
    UnknownTicker { ticker: String },

    /// Cancellation referenced an id that isn't resting in the book.
    #[error("unknown order: {order_id}")]
    UnknownOrder { order_id: OrderId },

    /// Re-registration of an agent or ticker that already exists.
    #[error("duplicate registration: {what}")]
    DuplicateRegistration { what: String },

    /// Internal invariant broken: crossed book, negative aggregate, event
    /// id regression. Fatal; the simulation must stop.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

/// Errors the scheduler can raise when an agent id is missing or already
/// retired.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchedulerError {
    #[error("unknown agent: {agent_id}")]
    UnknownAgent { agent_id: AgentId },

    #[error("agent already registered: {agent_id}")]
    DuplicateAgent { agent_id: AgentId },
}
