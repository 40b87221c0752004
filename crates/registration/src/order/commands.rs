//! Registration commands.

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use serde::{Deserialize, Serialize};

use crate::command::Command;

use super::{Order, OrderError, OrderSeat, Registrant, SeatQuantity};

/// Request seats at a conference for a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterToConference {
    pub conference_id: ConferenceId,
    pub order_id: AggregateId,
    pub seats: Vec<SeatQuantity>,
}

impl RegisterToConference {
    pub fn new(conference_id: ConferenceId, order_id: AggregateId, seats: Vec<SeatQuantity>) -> Self {
        Self {
            conference_id,
            order_id,
            seats,
        }
    }

    /// Checks the seat lines and converts them to order seats.
    ///
    /// Fails if the list is empty, a quantity is not positive, or a seat type
    /// appears twice.
    pub fn validated_seats(&self) -> Result<Vec<OrderSeat>, OrderError> {
        if self.seats.is_empty() {
            return Err(OrderError::NoSeats);
        }

        let mut seats: Vec<OrderSeat> = Vec::with_capacity(self.seats.len());
        for line in &self.seats {
            let seat = OrderSeat::try_from_request(*line).ok_or(OrderError::InvalidQuantity {
                seat_type_id: line.seat_type_id,
                quantity: line.quantity,
            })?;
            if seats.iter().any(|s| s.seat_type_id == seat.seat_type_id) {
                return Err(OrderError::DuplicateSeatType {
                    seat_type_id: seat.seat_type_id,
                });
            }
            seats.push(seat);
        }
        Ok(seats)
    }
}

impl Command for RegisterToConference {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Set the registrant contact details of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRegistrantDetails {
    pub order_id: AggregateId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl AssignRegistrantDetails {
    pub fn new(
        order_id: AggregateId,
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            order_id,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    pub fn registrant(&self) -> Registrant {
        Registrant::new(
            self.email.trim(),
            self.first_name.trim(),
            self.last_name.trim(),
        )
    }

    /// The email is the only required field.
    pub fn validate(&self) -> Result<(), OrderError> {
        if self.email.trim().is_empty() {
            return Err(OrderError::RegistrantEmailRequired);
        }
        Ok(())
    }
}

impl Command for AssignRegistrantDetails {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Confirm payment for a booked order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRegistration {
    pub order_id: AggregateId,
    pub payment_reference: String,
}

impl ConfirmRegistration {
    pub fn new(order_id: AggregateId, payment_reference: impl Into<String>) -> Self {
        Self {
            order_id,
            payment_reference: payment_reference.into(),
        }
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.payment_reference.trim().is_empty() {
            return Err(OrderError::PaymentReferenceRequired);
        }
        Ok(())
    }
}

impl Command for ConfirmRegistration {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Seat inventory confirmed the reservation. Sent by the registration process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSeatsReserved {
    pub order_id: AggregateId,

    /// Payment deadline for the booking.
    pub expires_at: Option<DateTime<Utc>>,
}

impl MarkSeatsReserved {
    pub fn new(order_id: AggregateId, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            order_id,
            expires_at,
        }
    }
}

impl Command for MarkSeatsReserved {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Seat inventory could not reserve the seats. Sent by the registration process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSeatsUnavailable {
    pub order_id: AggregateId,
}

impl MarkSeatsUnavailable {
    pub fn new(order_id: AggregateId) -> Self {
        Self { order_id }
    }
}

impl Command for MarkSeatsUnavailable {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// The payment window of a booked order has lapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpireOrder {
    pub order_id: AggregateId,

    /// Time the expiry is evaluated at.
    pub as_of: DateTime<Utc>,
}

impl ExpireOrder {
    pub fn new(order_id: AggregateId, as_of: DateTime<Utc>) -> Self {
        Self { order_id, as_of }
    }
}

impl Command for ExpireOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Every command the order aggregate accepts, as one closed set.
///
/// The command bus routes on `order_id()` and dispatches by matching on the
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RegistrationCommand {
    RegisterToConference(RegisterToConference),
    AssignRegistrantDetails(AssignRegistrantDetails),
    ConfirmRegistration(ConfirmRegistration),
    MarkSeatsReserved(MarkSeatsReserved),
    MarkSeatsUnavailable(MarkSeatsUnavailable),
    ExpireOrder(ExpireOrder),
}

impl RegistrationCommand {
    /// The order this command is addressed to.
    pub fn order_id(&self) -> AggregateId {
        match self {
            RegistrationCommand::RegisterToConference(cmd) => cmd.aggregate_id(),
            RegistrationCommand::AssignRegistrantDetails(cmd) => cmd.aggregate_id(),
            RegistrationCommand::ConfirmRegistration(cmd) => cmd.aggregate_id(),
            RegistrationCommand::MarkSeatsReserved(cmd) => cmd.aggregate_id(),
            RegistrationCommand::MarkSeatsUnavailable(cmd) => cmd.aggregate_id(),
            RegistrationCommand::ExpireOrder(cmd) => cmd.aggregate_id(),
        }
    }

    /// Command name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            RegistrationCommand::RegisterToConference(_) => "RegisterToConference",
            RegistrationCommand::AssignRegistrantDetails(_) => "AssignRegistrantDetails",
            RegistrationCommand::ConfirmRegistration(_) => "ConfirmRegistration",
            RegistrationCommand::MarkSeatsReserved(_) => "MarkSeatsReserved",
            RegistrationCommand::MarkSeatsUnavailable(_) => "MarkSeatsUnavailable",
            RegistrationCommand::ExpireOrder(_) => "ExpireOrder",
        }
    }

    /// Structural checks that need no order state.
    pub fn validate(&self) -> Result<(), OrderError> {
        match self {
            RegistrationCommand::RegisterToConference(cmd) => cmd.validated_seats().map(|_| ()),
            RegistrationCommand::AssignRegistrantDetails(cmd) => cmd.validate(),
            RegistrationCommand::ConfirmRegistration(cmd) => cmd.validate(),
            RegistrationCommand::MarkSeatsReserved(_)
            | RegistrationCommand::MarkSeatsUnavailable(_)
            | RegistrationCommand::ExpireOrder(_) => Ok(()),
        }
    }
}

macro_rules! impl_from_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for RegistrationCommand {
                fn from(cmd: $variant) -> Self {
                    RegistrationCommand::$variant(cmd)
                }
            }
        )*
    };
}

impl_from_command!(
    RegisterToConference,
    AssignRegistrantDetails,
    ConfirmRegistration,
    MarkSeatsReserved,
    MarkSeatsUnavailable,
    ExpireOrder,
);
