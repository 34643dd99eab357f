/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 2/10/25
******************************************************************************/

//! Prelude module that re-exports the types and traits most callers need.
//!
//! ```rust
//! use liquidity_lab_core::prelude::*;
//! ```

pub use crate::agent::{Agent, AgentKind, MarketView, SubmissionPort};
pub use crate::book::LimitOrderBook;
pub use crate::config::{AgentConfig, AgentType, ConfigError, MarketConfig, SimulationConfig};
pub use crate::error::{SchedulerError, SimError};
pub use crate::event::{Event, EventId, EventKind, EventPayload, EventStream};
pub use crate::market_data::{MarketData, OhlcvBar, Tick};
pub use crate::matching::MatchingEngine;
pub use crate::order::{AgentId, Order, OrderId, OrderKind, OrderStatus, Price, Side};
pub use crate::price_level::PriceLevel;
pub use crate::record::{DecodeError, EventRecord, Field};
pub use crate::scheduler::Scheduler;
pub use crate::simulation::{DiagnosticDump, Simulation};
