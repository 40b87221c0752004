//! Registration process for conference orders.
//!
//! The process coordinates an order with the conference's seat inventory
//! without either side knowing about the other:
//! 1. An order is placed; the process asks the inventory to reserve seats
//! 2. The inventory answers; the process books or rejects the order
//! 3. No answer in time rejects the order and releases whatever was held
//! 4. An unpaid booking expires; the process releases its seats
//!
//! Seat releases are retried with exponential backoff and never change the
//! order's own state.

pub mod config;
pub mod error;
pub mod inventory;
pub mod messages;
pub mod process;
pub mod reservation;

pub use config::{MAX_ORDER_EXPIRY, ProcessConfig, RetryPolicy};
pub use error::ProcessError;
pub use inventory::InMemorySeatInventory;
pub use messages::{
    ProcessMessage, SeatInventoryOutcome, SeatInventoryRequest, forward_order_events,
};
pub use process::RegistrationProcess;
pub use reservation::{PendingRelease, ReservationStatus, SeatReservation};
