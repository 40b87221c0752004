//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    AccessCode, OrderError, OrderEvent, OrderSeat, OrderState, Registrant,
    events::{OrderBookedData, OrderPlacedData},
};

/// Order aggregate root.
///
/// Holds one registration from placement to payment or rejection. Each
/// command method returns at most one event; an empty list means the command
/// was a tolerated replay and nothing changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    id: Option<AggregateId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    conference_id: Option<ConferenceId>,

    state: OrderState,

    /// Seat lines in the order they were requested.
    seats: Vec<OrderSeat>,

    registrant: Registrant,

    /// Issued once at booking and never regenerated.
    access_code: Option<AccessCode>,

    booking_expires_at: Option<DateTime<Utc>>,

    payment_reference: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderBooked(data) => self.apply_order_booked(data),
            OrderEvent::OrderRejected(_) => {
                self.state = OrderState::Rejected;
            }
            OrderEvent::RegistrantDetailsAssigned(data) => {
                self.registrant = data.registrant;
            }
            OrderEvent::OrderPaid(data) => {
                self.state = OrderState::Paid;
                self.payment_reference = Some(data.payment_reference);
            }
            OrderEvent::OrderExpired(_) => {
                self.state = OrderState::Rejected;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn conference_id(&self) -> Option<ConferenceId> {
        self.conference_id
    }

    /// Returns the current state.
    pub fn state(&self) -> OrderState {
        self.state
    }

    /// Returns the seat lines.
    pub fn seats(&self) -> &[OrderSeat] {
        &self.seats
    }

    pub fn registrant(&self) -> &Registrant {
        &self.registrant
    }

    /// Returns the access code while the order holds seats.
    ///
    /// An expired booking keeps its code in history but no longer exposes it.
    pub fn access_code(&self) -> Option<&AccessCode> {
        if self.state.has_access_code() {
            self.access_code.as_ref()
        } else {
            None
        }
    }

    /// Payment deadline set at booking.
    pub fn booking_expires_at(&self) -> Option<DateTime<Utc>> {
        self.booking_expires_at
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Places the order, or accepts an identical replay while still `Created`.
    pub fn register(
        &self,
        order_id: AggregateId,
        conference_id: ConferenceId,
        seats: Vec<OrderSeat>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_none() {
            return Ok(vec![OrderEvent::order_placed(order_id, conference_id, seats)]);
        }

        if !self.state.awaits_reservation() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.state,
                action: "register",
            });
        }

        if self.conference_id == Some(conference_id) && self.seats == seats {
            Ok(vec![])
        } else {
            Err(OrderError::SeatsMismatch)
        }
    }

    /// Books the order and issues its access code.
    pub fn mark_seats_reserved(
        &self,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self.state {
            OrderState::Created => Ok(vec![OrderEvent::order_booked(
                AccessCode::generate(),
                expires_at,
            )]),
            OrderState::Booked => Ok(vec![]),
            state => Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "mark seats reserved",
            }),
        }
    }

    /// Rejects the order because seats could not be reserved.
    pub fn mark_seats_unavailable(&self) -> Result<Vec<OrderEvent>, OrderError> {
        match self.state {
            OrderState::Created => Ok(vec![OrderEvent::order_rejected("seats unavailable")]),
            OrderState::Rejected => Ok(vec![]),
            state => Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "mark seats unavailable",
            }),
        }
    }

    /// Overwrites the registrant contact details in any state.
    pub fn assign_registrant_details(
        &self,
        registrant: Registrant,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !registrant.has_email() {
            return Err(OrderError::RegistrantEmailRequired);
        }

        if self.registrant == registrant {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::registrant_details_assigned(registrant)])
    }

    /// Records payment for a booked order.
    pub fn confirm_payment(&self, payment_reference: &str) -> Result<Vec<OrderEvent>, OrderError> {
        match self.state {
            OrderState::Booked => {
                if !self.registrant.has_email() {
                    return Err(OrderError::RegistrantDetailsMissing);
                }
                Ok(vec![OrderEvent::order_paid(payment_reference)])
            }
            OrderState::Paid => match self.payment_reference.as_deref() {
                Some(existing) if existing == payment_reference => Ok(vec![]),
                existing => Err(OrderError::PaymentAlreadyConfirmed {
                    payment_reference: existing.unwrap_or_default().to_string(),
                }),
            },
            state => Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "confirm payment",
            }),
        }
    }

    /// Lapses an unpaid booking once its deadline has passed.
    pub fn expire(&self, as_of: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        match self.state {
            OrderState::Booked => {
                let expires_at = self
                    .booking_expires_at
                    .ok_or(OrderError::NoExpiryDeadline)?;
                if as_of < expires_at {
                    return Err(OrderError::ExpiryNotReached { expires_at });
                }
                let conference_id = self.conference_id.ok_or(OrderError::NotPlaced)?;
                Ok(vec![OrderEvent::order_expired(
                    conference_id,
                    self.seats.clone(),
                )])
            }
            OrderState::Rejected => Ok(vec![]),
            state => Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "expire",
            }),
        }
    }
}

// Event application helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.conference_id = Some(data.conference_id);
        self.seats = data.seats;
        self.state = OrderState::Created;
    }

    fn apply_order_booked(&mut self, data: OrderBookedData) {
        self.state = OrderState::Booked;
        if self.access_code.is_none() {
            self.access_code = Some(data.access_code);
        }
        self.booking_expires_at = data.expires_at;
    }
}
