//! Seat reservation tracking owned by the registration process.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use registration::OrderSeat;

/// Outcome of one reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// One reservation attempt for an order.
#[derive(Debug, Clone)]
pub struct SeatReservation {
    pub order_id: AggregateId,
    pub conference_id: ConferenceId,
    pub seats: Vec<OrderSeat>,

    /// Distinguishes this attempt's timeout from stale ones.
    pub attempt: u64,

    pub status: ReservationStatus,
    pub requested_at: DateTime<Utc>,

    /// Payment deadline handed to the order on confirmation.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SeatReservation {
    pub fn new(
        order_id: AggregateId,
        conference_id: ConferenceId,
        seats: Vec<OrderSeat>,
        attempt: u64,
    ) -> Self {
        Self {
            order_id,
            conference_id,
            seats,
            attempt,
            status: ReservationStatus::Pending,
            requested_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Time since the reservation was requested.
    pub fn waited(&self, now: DateTime<Utc>) -> Duration {
        (now - self.requested_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// Marks the reservation confirmed with the given payment deadline.
    pub fn confirm(&mut self, expires_at: DateTime<Utc>) {
        self.status = ReservationStatus::Confirmed;
        self.expires_at = Some(expires_at);
    }

    pub fn reject(&mut self) {
        self.status = ReservationStatus::Rejected;
    }
}

/// A seat release that has not been acknowledged yet.
#[derive(Debug, Clone)]
pub struct PendingRelease {
    pub conference_id: ConferenceId,
    pub seats: Vec<OrderSeat>,

    /// Failed attempts so far.
    pub failures: u32,
}

impl PendingRelease {
    pub fn new(conference_id: ConferenceId, seats: Vec<OrderSeat>) -> Self {
        Self {
            conference_id,
            seats,
            failures: 0,
        }
    }
}
