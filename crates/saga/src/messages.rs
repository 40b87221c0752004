//! Messages exchanged between the registration process, the order side and
//! the seat inventory.

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use event_store::EventRecord;
use registration::{Aggregate, Order, OrderEvent, OrderSeat};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Request sent to the seat inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SeatInventoryRequest {
    /// Hold all requested seats for the order, or none.
    Reserve {
        conference_id: ConferenceId,
        order_id: AggregateId,
        seats: Vec<OrderSeat>,
    },

    /// Give back whatever the order holds.
    Release {
        conference_id: ConferenceId,
        order_id: AggregateId,
        seats: Vec<OrderSeat>,
    },
}

impl SeatInventoryRequest {
    pub fn order_id(&self) -> AggregateId {
        match self {
            SeatInventoryRequest::Reserve { order_id, .. }
            | SeatInventoryRequest::Release { order_id, .. } => *order_id,
        }
    }
}

/// Outcome reported by the seat inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SeatInventoryOutcome {
    SeatsReserved { order_id: AggregateId },
    SeatsNotAvailable { order_id: AggregateId },
    SeatsReleased { order_id: AggregateId },
    SeatReleaseFailed { order_id: AggregateId, reason: String },
}

impl SeatInventoryOutcome {
    pub fn order_id(&self) -> AggregateId {
        match self {
            SeatInventoryOutcome::SeatsReserved { order_id }
            | SeatInventoryOutcome::SeatsNotAvailable { order_id }
            | SeatInventoryOutcome::SeatsReleased { order_id }
            | SeatInventoryOutcome::SeatReleaseFailed { order_id, .. } => *order_id,
        }
    }
}

/// Everything the registration process reacts to, on one inbox.
#[derive(Debug, Clone)]
pub enum ProcessMessage {
    /// An event committed on an order.
    Order {
        order_id: AggregateId,
        event: OrderEvent,
    },

    /// An outcome from the seat inventory.
    Inventory(SeatInventoryOutcome),

    /// The reservation attempt got no outcome in time.
    ReservationTimedOut { order_id: AggregateId, attempt: u64 },

    /// A booking reached its payment deadline.
    ExpiryDue {
        order_id: AggregateId,
        expires_at: DateTime<Utc>,
    },

    /// Time to retry a failed seat release.
    RetryRelease { order_id: AggregateId },

    /// The retention window of a rejected or expired order has passed.
    ForgetReservation { order_id: AggregateId },
}

impl ProcessMessage {
    pub fn order_id(&self) -> AggregateId {
        match self {
            ProcessMessage::Order { order_id, .. }
            | ProcessMessage::ReservationTimedOut { order_id, .. }
            | ProcessMessage::ExpiryDue { order_id, .. }
            | ProcessMessage::RetryRelease { order_id }
            | ProcessMessage::ForgetReservation { order_id } => *order_id,
            ProcessMessage::Inventory(outcome) => outcome.order_id(),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProcessMessage::Order { .. } => "order_event",
            ProcessMessage::Inventory(_) => "inventory_outcome",
            ProcessMessage::ReservationTimedOut { .. } => "reservation_timed_out",
            ProcessMessage::ExpiryDue { .. } => "expiry_due",
            ProcessMessage::RetryRelease { .. } => "retry_release",
            ProcessMessage::ForgetReservation { .. } => "forget_reservation",
        }
    }

    /// Decodes an order event record; None for other aggregate types.
    pub fn from_record(record: &EventRecord) -> Result<Option<Self>, serde_json::Error> {
        if record.aggregate_type != Order::aggregate_type() {
            return Ok(None);
        }
        let event: OrderEvent = record.decode()?;
        Ok(Some(ProcessMessage::Order {
            order_id: record.aggregate_id,
            event,
        }))
    }
}

impl From<SeatInventoryOutcome> for ProcessMessage {
    fn from(outcome: SeatInventoryOutcome) -> Self {
        ProcessMessage::Inventory(outcome)
    }
}

/// Forwards committed order events into the process inbox.
///
/// Ends when either channel closes.
pub fn forward_order_events(
    mut records: mpsc::UnboundedReceiver<EventRecord>,
    inbox: mpsc::UnboundedSender<ProcessMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(record) = records.recv().await {
            match ProcessMessage::from_record(&record) {
                Ok(Some(message)) => {
                    if inbox.send(message).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    event_id = %record.event_id,
                    event_type = %record.event_type,
                    error = %e,
                    "Skipping undecodable order event"
                ),
            }
        }
    })
}
