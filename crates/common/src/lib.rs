//! Shared identifier types for the conference registration system.

mod types;

pub use types::{AggregateId, ConferenceId, MessageId, SeatTypeId};
