//! Write side of conference registration.
//!
//! This crate provides:
//! - The Order aggregate and its state machine
//! - The closed set of registration commands and their envelopes
//! - CommandHandler for load, decide and version-checked append
//! - An in-process command bus that serializes commands per order

pub mod aggregate;
pub mod bus;
pub mod command;
pub mod conference;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use bus::{
    BusConfig, BusError, CommandBus, CommandEnvelope, CommandOutcome, InProcessCommandBus,
};
pub use command::{Command, CommandHandler, CommandResult};
pub use conference::{Conference, Money, SeatType};
pub use error::{DomainError, ErrorKind};
pub use order::{
    AccessCode, AssignRegistrantDetails, ConfirmRegistration, ExpireOrder, MarkSeatsReserved,
    MarkSeatsUnavailable, Order, OrderError, OrderEvent, OrderSeat, OrderService, OrderState,
    RegisterToConference, Registrant, RegistrationCommand, SeatQuantity,
};
