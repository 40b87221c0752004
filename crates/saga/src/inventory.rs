//! In-memory seat inventory.
//!
//! Stands in for the conference side: it holds remaining capacity per seat
//! type and answers reservation and release requests with outcomes.

use std::collections::HashMap;
use std::sync::Arc;

use common::{AggregateId, ConferenceId, SeatTypeId};
use registration::{Conference, OrderSeat};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::messages::{ProcessMessage, SeatInventoryOutcome, SeatInventoryRequest};

#[derive(Debug, Default)]
struct InventoryState {
    remaining: HashMap<(ConferenceId, SeatTypeId), u32>,
    reservations: HashMap<AggregateId, (ConferenceId, Vec<OrderSeat>)>,
    drop_outcomes: bool,
    failing_releases: u32,
}

/// In-memory seat inventory for tests and the demo host.
///
/// Reservations are all-or-nothing and idempotent per order, so seats are
/// never overbooked. Releases are idempotent too.
#[derive(Debug, Clone, Default)]
pub struct InMemorySeatInventory {
    state: Arc<Mutex<InventoryState>>,
}

impl InMemorySeatInventory {
    /// Creates a new, empty inventory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds capacity for a seat type.
    pub async fn add_seats(
        &self,
        conference_id: ConferenceId,
        seat_type_id: SeatTypeId,
        quantity: u32,
    ) {
        let mut state = self.state.lock().await;
        *state
            .remaining
            .entry((conference_id, seat_type_id))
            .or_default() += quantity;
    }

    /// Adds `quantity` seats for every seat type of the conference.
    pub async fn add_conference(&self, conference: &Conference, quantity: u32) {
        for seat_type in &conference.seat_types {
            self.add_seats(conference.id, seat_type.id, quantity).await;
        }
    }

    /// Remaining capacity for a seat type.
    pub async fn available(&self, conference_id: ConferenceId, seat_type_id: SeatTypeId) -> u32 {
        let state = self.state.lock().await;
        state
            .remaining
            .get(&(conference_id, seat_type_id))
            .copied()
            .unwrap_or(0)
    }

    /// Returns true if the order currently holds seats.
    pub async fn holds(&self, order_id: AggregateId) -> bool {
        self.state.lock().await.reservations.contains_key(&order_id)
    }

    /// Makes the inventory swallow outcomes instead of replying.
    pub async fn set_drop_outcomes(&self, drop: bool) {
        self.state.lock().await.drop_outcomes = drop;
    }

    /// Makes the next `count` releases fail.
    pub async fn fail_next_releases(&self, count: u32) {
        self.state.lock().await.failing_releases = count;
    }

    /// Applies one request and returns the outcome to report, if any.
    pub async fn handle(&self, request: SeatInventoryRequest) -> Option<SeatInventoryOutcome> {
        let mut state = self.state.lock().await;

        let outcome = match request {
            SeatInventoryRequest::Reserve {
                conference_id,
                order_id,
                seats,
            } => state.reserve(conference_id, order_id, seats),
            SeatInventoryRequest::Release { order_id, .. } => state.release(order_id),
        };

        if state.drop_outcomes {
            tracing::debug!(order_id = %outcome.order_id(), "Dropping inventory outcome");
            None
        } else {
            Some(outcome)
        }
    }

    /// Serves requests from `requests` and posts outcomes to `outcomes`.
    ///
    /// Ends when either channel closes.
    pub fn spawn(
        self,
        mut requests: mpsc::UnboundedReceiver<SeatInventoryRequest>,
        outcomes: mpsc::UnboundedSender<ProcessMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let Some(outcome) = self.handle(request).await
                    && outcomes.send(outcome.into()).is_err()
                {
                    break;
                }
            }
        })
    }
}

impl InventoryState {
    fn reserve(
        &mut self,
        conference_id: ConferenceId,
        order_id: AggregateId,
        seats: Vec<OrderSeat>,
    ) -> SeatInventoryOutcome {
        if self.reservations.contains_key(&order_id) {
            return SeatInventoryOutcome::SeatsReserved { order_id };
        }

        let enough = seats.iter().all(|seat| {
            self.remaining
                .get(&(conference_id, seat.seat_type_id))
                .is_some_and(|remaining| *remaining >= seat.quantity)
        });
        if !enough {
            tracing::debug!(%order_id, "Not enough seats");
            return SeatInventoryOutcome::SeatsNotAvailable { order_id };
        }

        for seat in &seats {
            if let Some(remaining) = self.remaining.get_mut(&(conference_id, seat.seat_type_id)) {
                *remaining -= seat.quantity;
            }
        }
        self.reservations.insert(order_id, (conference_id, seats));
        SeatInventoryOutcome::SeatsReserved { order_id }
    }

    fn release(&mut self, order_id: AggregateId) -> SeatInventoryOutcome {
        if self.failing_releases > 0 {
            self.failing_releases -= 1;
            return SeatInventoryOutcome::SeatReleaseFailed {
                order_id,
                reason: "seat inventory unavailable".to_string(),
            };
        }

        if let Some((conference_id, seats)) = self.reservations.remove(&order_id) {
            for seat in seats {
                *self
                    .remaining
                    .entry((conference_id, seat.seat_type_id))
                    .or_default() += seat.quantity;
            }
        }
        SeatInventoryOutcome::SeatsReleased { order_id }
    }
}
