//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

use chrono::{DateTime, Utc};
use common::SeatTypeId;
use thiserror::Error;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    OrderBookedData, OrderEvent, OrderExpiredData, OrderPaidData, OrderPlacedData,
    OrderRejectedData, RegistrantDetailsAssignedData,
};
pub use service::OrderService;
pub use state::OrderState;
pub use value_objects::{AccessCode, OrderSeat, Registrant, SeatQuantity};

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A seat line has a non-positive quantity.
    #[error("Invalid quantity for seat type {seat_type_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity {
        seat_type_id: SeatTypeId,
        quantity: i32,
    },

    /// The registration asks for no seats.
    #[error("At least one seat line is required")]
    NoSeats,

    /// The same seat type appears on two lines.
    #[error("Seat type {seat_type_id} appears more than once")]
    DuplicateSeatType { seat_type_id: SeatTypeId },

    /// Registrant email is required.
    #[error("Registrant email is required")]
    RegistrantEmailRequired,

    /// Payment reference is required.
    #[error("Payment reference is required")]
    PaymentReferenceRequired,

    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    /// A registration replay asked for a different seat list.
    #[error("Order already placed with a different seat selection")]
    SeatsMismatch,

    /// Payment requires registrant details to be assigned first.
    #[error("Registrant details must be assigned before payment")]
    RegistrantDetailsMissing,

    /// The order was already paid under another reference.
    #[error("Order already paid with reference {payment_reference}")]
    PaymentAlreadyConfirmed { payment_reference: String },

    /// The booking deadline is still ahead.
    #[error("Booking does not expire until {expires_at}")]
    ExpiryNotReached { expires_at: DateTime<Utc> },

    /// The booking was made without a payment deadline.
    #[error("Booking has no expiry deadline")]
    NoExpiryDeadline,

    /// The stream has no placement event to take the conference from.
    #[error("Order was never placed")]
    NotPlaced,
}

impl OrderError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidQuantity { .. }
            | OrderError::NoSeats
            | OrderError::DuplicateSeatType { .. }
            | OrderError::RegistrantEmailRequired
            | OrderError::PaymentReferenceRequired => ErrorKind::InvalidRequest,
            OrderError::InvalidStateTransition { .. }
            | OrderError::SeatsMismatch
            | OrderError::RegistrantDetailsMissing
            | OrderError::PaymentAlreadyConfirmed { .. }
            | OrderError::ExpiryNotReached { .. }
            | OrderError::NoExpiryDeadline
            | OrderError::NotPlaced => ErrorKind::InvalidTransition,
        }
    }
}
