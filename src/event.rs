//! The event stream: a typed, append-only, causally-linked record of every
//! observable state transition (spec §3, §4.6).

use crate::order::{AgentId, OrderId, Price};
use serde::{Deserialize, Serialize};

/// Monotonic, globally unique identifier for an event within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

/// The small integer tag carried first in a serialized record (spec §6),
/// used to dispatch a positional decoder without reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    /// Executable: an agent's own request, the root trigger of everything
    /// the engine does in response (spec §3 `executable`, grounded on
    /// `original_source/src/event/event_types.py`'s `LIMIT_BUY_ORDER` /
    /// `MARKET_BUY_ORDER` / `CANCEL_ORDER` family).
    OrderRequested = 0,
    OrderAdded = 1,
    OrderRemoved = 2,
    OrderModified = 3,
    OrderExecuted = 4,
    OrderCanceled = 5,
    OrderRejected = 6,
    OrderExpired = 7,
    Transaction = 8,
    TickerAdded = 9,
    TickerRemoved = 10,
    AgentAdded = 11,
    AgentRemoved = 12,
}

/// The payload carried by a single event. Variant fields are the
/// kind-specific attributes listed per-variant in spec §3; the kind tag
/// for serialization is derived from the variant itself (`EventPayload::kind`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// An agent's own submission, recorded before the engine processes it
    /// so it can serve as the `trigger_event_id` for everything the engine
    /// does in response. Emitted regardless of outcome — unlike
    /// `OrderAdded`, which only fires when the order actually rests.
    OrderRequested {
        ticker: String,
        order_id: OrderId,
        agent_id: AgentId,
    },
    OrderAdded {
        ticker: String,
        order_id: OrderId,
    },
    /// Removed for any reason: matched away, canceled, or expired.
    OrderRemoved {
        ticker: String,
        order_id: OrderId,
    },
    OrderModified {
        ticker: String,
        order_id: OrderId,
        old_qty: u64,
        new_qty: u64,
    },
    /// Terminal fill.
    OrderExecuted {
        ticker: String,
        order_id: OrderId,
        agent_id: AgentId,
    },
    OrderCanceled {
        ticker: String,
        order_id: OrderId,
        agent_id: AgentId,
    },
    /// Recoverable submission error converted to an event so the run
    /// continues (spec §7); not part of the terminal fill taxonomy.
    OrderRejected {
        ticker: String,
        order_id: OrderId,
        agent_id: AgentId,
        reason: String,
    },
    /// Produced by the expiry sweeper (spec §5, §9) ahead of an activation.
    OrderExpired {
        ticker: String,
        order_id: OrderId,
        agent_id: AgentId,
    },
    Transaction {
        ticker: String,
        qty: u64,
        price: Price,
        buyer_id: AgentId,
        seller_id: AgentId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
    },
    TickerAdded {
        ticker: String,
    },
    TickerRemoved {
        ticker: String,
    },
    AgentAdded {
        agent_id: AgentId,
    },
    AgentRemoved {
        agent_id: AgentId,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::OrderRequested { .. } => EventKind::OrderRequested,
            EventPayload::OrderAdded { .. } => EventKind::OrderAdded,
            EventPayload::OrderRemoved { .. } => EventKind::OrderRemoved,
            EventPayload::OrderModified { .. } => EventKind::OrderModified,
            EventPayload::OrderExecuted { .. } => EventKind::OrderExecuted,
            EventPayload::OrderCanceled { .. } => EventKind::OrderCanceled,
            EventPayload::OrderRejected { .. } => EventKind::OrderRejected,
            EventPayload::OrderExpired { .. } => EventKind::OrderExpired,
            EventPayload::Transaction { .. } => EventKind::Transaction,
            EventPayload::TickerAdded { .. } => EventKind::TickerAdded,
            EventPayload::TickerRemoved { .. } => EventKind::TickerRemoved,
            EventPayload::AgentAdded { .. } => EventKind::AgentAdded,
            EventPayload::AgentRemoved { .. } => EventKind::AgentRemoved,
        }
    }

    /// Whether this event kind represents something the run loop could, in
    /// principle, re-execute from its payload alone (spec §3 `executable`).
    /// In this core, only the raw submission/cancellation requests the
    /// scheduler hands to the engine are executable; the derived events
    /// this module records are all observational.
    pub fn executable(&self) -> bool {
        matches!(self, EventPayload::OrderRequested { .. })
    }
}

/// One record in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub timestamp: u64,
    /// The event that caused this one; `None` only for root events (an
    /// agent's own decision to act, with no prior trigger in this run).
    pub trigger_event_id: Option<EventId>,
    pub payload: EventPayload,
}

impl Event {
    pub fn executable(&self) -> bool {
        self.payload.executable()
    }
}

/// Append-only sequence of events, the simulation's sole event producer
/// (spec §4.6). Owns the monotonic id counter so it's never a module-level
/// static (spec §9).
#[derive(Debug, Default)]
pub struct EventStream {
    events: Vec<Event>,
    next_event_id: u64,
}

impl EventStream {
    pub fn new() -> EventStream {
        EventStream {
            events: Vec::new(),
            next_event_id: 0,
        }
    }

    /// Allocates the next event id without recording an event — used by
    /// callers that need an id to serve as a `trigger_event_id` for events
    /// not yet constructed (e.g. the incoming submission itself).
    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    /// Appends one event, assigning it the next monotonic id.
    ///
    /// # Panics
    /// Panics on a timestamp regression or a `trigger_event_id` that
    /// doesn't point to an earlier event — both are `InvariantViolation`
    /// conditions per spec §7 and indicate a bug in the caller, not
    /// recoverable user input.
    pub fn push(&mut self, timestamp: u64, trigger_event_id: Option<EventId>, payload: EventPayload) -> EventId {
        if let Some(last) = self.events.last() {
            assert!(
                timestamp >= last.timestamp,
                "event timestamp regression: {timestamp} < {}",
                last.timestamp
            );
        }
        if let Some(trigger) = trigger_event_id {
            assert!(
                trigger.0 < self.next_event_id,
                "trigger_event_id {trigger:?} does not reference an earlier event"
            );
        }
        let event_id = self.next_id();
        self.events.push(Event {
            event_id,
            timestamp,
            trigger_event_id,
            payload,
        });
        event_id
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// All events with a given kind, in stream order — the subscription
    /// mechanism named in spec §4.6 ("consumers ... subscribe by event kind").
    pub fn by_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.payload.kind() == kind)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ids_are_strictly_increasing() {
        let mut stream = EventStream::new();
        let a = stream.push(0, None, EventPayload::TickerAdded { ticker: "X".into() });
        let b = stream.push(0, Some(a), EventPayload::TickerAdded { ticker: "Y".into() });
        assert!(b.0 > a.0);
    }

    #[test]
    #[should_panic(expected = "timestamp regression")]
    fn timestamp_must_not_regress() {
        let mut stream = EventStream::new();
        stream.push(10, None, EventPayload::TickerAdded { ticker: "X".into() });
        stream.push(5, None, EventPayload::TickerAdded { ticker: "Y".into() });
    }

    #[test]
    fn round_trips_through_json() {
        let payload = EventPayload::Transaction {
            ticker: "X".into(),
            qty: 10,
            price: Price(10_000),
            buyer_id: AgentId(1),
            seller_id: AgentId(2),
            buy_order_id: OrderId(3),
            sell_order_id: OrderId(4),
        };
        let event = Event {
            event_id: EventId(0),
            timestamp: 42,
            trigger_event_id: None,
            payload,
        };
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
