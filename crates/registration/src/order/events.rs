//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{AccessCode, OrderSeat, Registrant};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Registration was accepted and seats were requested.
    OrderPlaced(OrderPlacedData),

    /// The seat inventory confirmed the reservation.
    OrderBooked(OrderBookedData),

    /// The seat inventory could not satisfy the request.
    OrderRejected(OrderRejectedData),

    /// Registrant contact details were set.
    RegistrantDetailsAssigned(RegistrantDetailsAssignedData),

    /// Payment was confirmed.
    OrderPaid(OrderPaidData),

    /// The booking lapsed without payment; held seats must be released.
    OrderExpired(OrderExpiredData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderBooked(_) => "OrderBooked",
            OrderEvent::OrderRejected(_) => "OrderRejected",
            OrderEvent::RegistrantDetailsAssigned(_) => "RegistrantDetailsAssigned",
            OrderEvent::OrderPaid(_) => "OrderPaid",
            OrderEvent::OrderExpired(_) => "OrderExpired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub conference_id: ConferenceId,
    pub seats: Vec<OrderSeat>,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookedData {
    pub access_code: AccessCode,

    /// Payment deadline; None when bookings never lapse.
    pub expires_at: Option<DateTime<Utc>>,

    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRejectedData {
    pub reason: String,
    pub rejected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrantDetailsAssignedData {
    pub registrant: Registrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaidData {
    pub payment_reference: String,
    pub paid_at: DateTime<Utc>,
}

/// Carries the seats so the release can be requested without reading the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderExpiredData {
    pub conference_id: ConferenceId,
    pub seats: Vec<OrderSeat>,
    pub expired_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_placed(
        order_id: AggregateId,
        conference_id: ConferenceId,
        seats: Vec<OrderSeat>,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_id,
            conference_id,
            seats,
            placed_at: Utc::now(),
        })
    }

    pub fn order_booked(access_code: AccessCode, expires_at: Option<DateTime<Utc>>) -> Self {
        OrderEvent::OrderBooked(OrderBookedData {
            access_code,
            expires_at,
            booked_at: Utc::now(),
        })
    }

    pub fn order_rejected(reason: impl Into<String>) -> Self {
        OrderEvent::OrderRejected(OrderRejectedData {
            reason: reason.into(),
            rejected_at: Utc::now(),
        })
    }

    pub fn registrant_details_assigned(registrant: Registrant) -> Self {
        OrderEvent::RegistrantDetailsAssigned(RegistrantDetailsAssignedData { registrant })
    }

    pub fn order_paid(payment_reference: impl Into<String>) -> Self {
        OrderEvent::OrderPaid(OrderPaidData {
            payment_reference: payment_reference.into(),
            paid_at: Utc::now(),
        })
    }

    pub fn order_expired(conference_id: ConferenceId, seats: Vec<OrderSeat>) -> Self {
        OrderEvent::OrderExpired(OrderExpiredData {
            conference_id,
            seats,
            expired_at: Utc::now(),
        })
    }
}
