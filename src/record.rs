//! Positional wire encoding for events (spec §6 "Event serialization"):
//! one record per event, first field the small-integer kind tag, then
//! `timestamp`, `event_id`, `trigger_event_id`, then kind-specific fields in
//! a fixed order per variant. Decoding dispatches on the tag to a
//! constructor and applies the remaining fields positionally — no
//! reflection, just a match on `EventKind` (spec §9 "Runtime polymorphism").
//!
//! This sits alongside the `serde` derive on [`Event`]/[`EventPayload`]
//! (which round-trips fine on its own) because spec §6 asks for a specific,
//! auditable *wire shape*: a flat tag-plus-positional-fields record, the
//! kind a hand-rolled binary/CSV log format would use, not whatever shape
//! `serde_json` happens to pick for a Rust enum.

use crate::event::{Event, EventId, EventKind, EventPayload};
use crate::order::{AgentId, OrderId, Price};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One positional field in a record, after the common `kind`/`timestamp`/
/// `event_id`/`trigger_event_id` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    U64(u64),
    Str(String),
}

impl From<u64> for Field {
    fn from(v: u64) -> Field {
        Field::U64(v)
    }
}

impl From<OrderId> for Field {
    fn from(v: OrderId) -> Field {
        Field::U64(v.0)
    }
}

impl From<AgentId> for Field {
    fn from(v: AgentId) -> Field {
        Field::U64(v.0)
    }
}

impl From<Price> for Field {
    fn from(v: Price) -> Field {
        Field::U64(v.0)
    }
}

impl From<String> for Field {
    fn from(v: String) -> Field {
        Field::Str(v)
    }
}

/// The on-the-wire record for one event: kind tag first, then the common
/// header, then kind-specific fields positionally (spec §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: u8,
    pub timestamp: u64,
    pub event_id: u64,
    pub trigger_event_id: Option<u64>,
    pub fields: Vec<Field>,
}

/// Failures decoding a record back into an [`Event`] (spec §7: malformed
/// input at a boundary is a recoverable, typed failure — this one just
/// never reaches the book, since it happens before an `Event` even exists).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("unknown event kind tag: {0}")]
    UnknownKind(u8),
    #[error("event kind {kind:?} expects {expected} fields, got {actual}")]
    FieldCount {
        kind: EventKind,
        expected: usize,
        actual: usize,
    },
    #[error("event kind {kind:?} field {index} has the wrong type")]
    FieldType { kind: EventKind, index: usize },
}

impl TryFrom<u8> for EventKind {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<EventKind, DecodeError> {
        match tag {
            0 => Ok(EventKind::OrderRequested),
            1 => Ok(EventKind::OrderAdded),
            2 => Ok(EventKind::OrderRemoved),
            3 => Ok(EventKind::OrderModified),
            4 => Ok(EventKind::OrderExecuted),
            5 => Ok(EventKind::OrderCanceled),
            6 => Ok(EventKind::OrderRejected),
            7 => Ok(EventKind::OrderExpired),
            8 => Ok(EventKind::Transaction),
            9 => Ok(EventKind::TickerAdded),
            10 => Ok(EventKind::TickerRemoved),
            11 => Ok(EventKind::AgentAdded),
            12 => Ok(EventKind::AgentRemoved),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

fn field_u64(fields: &[Field], kind: EventKind, index: usize) -> Result<u64, DecodeError> {
    match fields.get(index) {
        Some(Field::U64(v)) => Ok(*v),
        _ => Err(DecodeError::FieldType { kind, index }),
    }
}

fn field_str(fields: &[Field], kind: EventKind, index: usize) -> Result<String, DecodeError> {
    match fields.get(index) {
        Some(Field::Str(v)) => Ok(v.clone()),
        _ => Err(DecodeError::FieldType { kind, index }),
    }
}

fn expect_len(fields: &[Field], kind: EventKind, expected: usize) -> Result<(), DecodeError> {
    if fields.len() != expected {
        return Err(DecodeError::FieldCount {
            kind,
            expected,
            actual: fields.len(),
        });
    }
    Ok(())
}

impl EventPayload {
    /// Flattens this payload's kind-specific attributes into the fixed
    /// positional order spec §6 assigns each variant.
    fn to_fields(&self) -> Vec<Field> {
        match self {
            EventPayload::OrderRequested { ticker, order_id, agent_id } => {
                vec![ticker.clone().into(), (*order_id).into(), (*agent_id).into()]
            }
            EventPayload::OrderAdded { ticker, order_id } => {
                vec![ticker.clone().into(), (*order_id).into()]
            }
            EventPayload::OrderRemoved { ticker, order_id } => {
                vec![ticker.clone().into(), (*order_id).into()]
            }
            EventPayload::OrderModified { ticker, order_id, old_qty, new_qty } => {
                vec![ticker.clone().into(), (*order_id).into(), (*old_qty).into(), (*new_qty).into()]
            }
            EventPayload::OrderExecuted { ticker, order_id, agent_id } => {
                vec![ticker.clone().into(), (*order_id).into(), (*agent_id).into()]
            }
            EventPayload::OrderCanceled { ticker, order_id, agent_id } => {
                vec![ticker.clone().into(), (*order_id).into(), (*agent_id).into()]
            }
            EventPayload::OrderRejected { ticker, order_id, agent_id, reason } => {
                vec![
                    ticker.clone().into(),
                    (*order_id).into(),
                    (*agent_id).into(),
                    reason.clone().into(),
                ]
            }
            EventPayload::OrderExpired { ticker, order_id, agent_id } => {
                vec![ticker.clone().into(), (*order_id).into(), (*agent_id).into()]
            }
            EventPayload::Transaction {
                ticker,
                qty,
                price,
                buyer_id,
                seller_id,
                buy_order_id,
                sell_order_id,
            } => vec![
                ticker.clone().into(),
                (*qty).into(),
                (*price).into(),
                (*buyer_id).into(),
                (*seller_id).into(),
                (*buy_order_id).into(),
                (*sell_order_id).into(),
            ],
            EventPayload::TickerAdded { ticker } => vec![ticker.clone().into()],
            EventPayload::TickerRemoved { ticker } => vec![ticker.clone().into()],
            EventPayload::AgentAdded { agent_id } => vec![(*agent_id).into()],
            EventPayload::AgentRemoved { agent_id } => vec![(*agent_id).into()],
        }
    }

    /// Reconstructs a payload of kind `kind` from its positional fields.
    /// The inverse of [`EventPayload::to_fields`].
    fn from_fields(kind: EventKind, fields: &[Field]) -> Result<EventPayload, DecodeError> {
        Ok(match kind {
            EventKind::OrderRequested => {
                expect_len(fields, kind, 3)?;
                EventPayload::OrderRequested {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    agent_id: AgentId(field_u64(fields, kind, 2)?),
                }
            }
            EventKind::OrderAdded => {
                expect_len(fields, kind, 2)?;
                EventPayload::OrderAdded {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                }
            }
            EventKind::OrderRemoved => {
                expect_len(fields, kind, 2)?;
                EventPayload::OrderRemoved {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                }
            }
            EventKind::OrderModified => {
                expect_len(fields, kind, 4)?;
                EventPayload::OrderModified {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    old_qty: field_u64(fields, kind, 2)?,
                    new_qty: field_u64(fields, kind, 3)?,
                }
            }
            EventKind::OrderExecuted => {
                expect_len(fields, kind, 3)?;
                EventPayload::OrderExecuted {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    agent_id: AgentId(field_u64(fields, kind, 2)?),
                }
            }
            EventKind::OrderCanceled => {
                expect_len(fields, kind, 3)?;
                EventPayload::OrderCanceled {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    agent_id: AgentId(field_u64(fields, kind, 2)?),
                }
            }
            EventKind::OrderRejected => {
                expect_len(fields, kind, 4)?;
                EventPayload::OrderRejected {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    agent_id: AgentId(field_u64(fields, kind, 2)?),
                    reason: field_str(fields, kind, 3)?,
                }
            }
            EventKind::OrderExpired => {
                expect_len(fields, kind, 3)?;
                EventPayload::OrderExpired {
                    ticker: field_str(fields, kind, 0)?,
                    order_id: OrderId(field_u64(fields, kind, 1)?),
                    agent_id: AgentId(field_u64(fields, kind, 2)?),
                }
            }
            EventKind::Transaction => {
                expect_len(fields, kind, 7)?;
                EventPayload::Transaction {
                    ticker: field_str(fields, kind, 0)?,
                    qty: field_u64(fields, kind, 1)?,
                    price: Price(field_u64(fields, kind, 2)?),
                    buyer_id: AgentId(field_u64(fields, kind, 3)?),
                    seller_id: AgentId(field_u64(fields, kind, 4)?),
                    buy_order_id: OrderId(field_u64(fields, kind, 5)?),
                    sell_order_id: OrderId(field_u64(fields, kind, 6)?),
                }
            }
            EventKind::TickerAdded => {
                expect_len(fields, kind, 1)?;
                EventPayload::TickerAdded { ticker: field_str(fields, kind, 0)? }
            }
            EventKind::TickerRemoved => {
                expect_len(fields, kind, 1)?;
                EventPayload::TickerRemoved { ticker: field_str(fields, kind, 0)? }
            }
            EventKind::AgentAdded => {
                expect_len(fields, kind, 1)?;
                EventPayload::AgentAdded { agent_id: AgentId(field_u64(fields, kind, 0)?) }
            }
            EventKind::AgentRemoved => {
                expect_len(fields, kind, 1)?;
                EventPayload::AgentRemoved { agent_id: AgentId(field_u64(fields, kind, 0)?) }
            }
        })
    }
}

impl Event {
    /// Encodes this event into its positional wire record (spec §6).
    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            kind: self.payload.kind() as u8,
            timestamp: self.timestamp,
            event_id: self.event_id.0,
            trigger_event_id: self.trigger_event_id.map(|id| id.0),
            fields: self.payload.to_fields(),
        }
    }

    /// Decodes a positional wire record back into an `Event`: the tag
    /// selects the constructor, the rest of the fields are applied
    /// positionally (spec §6's decoder contract).
    pub fn from_record(record: &EventRecord) -> Result<Event, DecodeError> {
        let kind = EventKind::try_from(record.kind)?;
        let payload = EventPayload::from_fields(kind, &record.fields)?;
        Ok(Event {
            event_id: EventId(record.event_id),
            timestamp: record.timestamp,
            trigger_event_id: record.trigger_event_id.map(EventId),
            payload,
        })
    }
}
