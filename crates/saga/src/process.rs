//! The registration process.
//!
//! Bridges orders and the seat inventory through messages only. It reads
//! order events and inventory outcomes from its inbox and answers with
//! commands on the bus and requests to the inventory. It never looks at
//! either side's state.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{AggregateId, ConferenceId};
use registration::{
    CommandBus, CommandEnvelope, ExpireOrder, MarkSeatsReserved, MarkSeatsUnavailable, OrderEvent,
    OrderSeat, RegistrationCommand,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{MAX_ORDER_EXPIRY, ProcessConfig};
use crate::error::{ProcessError, Result};
use crate::messages::{ProcessMessage, SeatInventoryOutcome, SeatInventoryRequest};
use crate::reservation::{PendingRelease, ReservationStatus, SeatReservation};

/// Process manager for conference registrations.
///
/// A reservation stays in `reservations` after it resolves so that duplicate
/// or late outcomes for the order can still be answered. Paid orders drop it
/// at once. Rejected and expired orders drop it after `settled_retention`,
/// or once their seat release resolves if that comes later.
pub struct RegistrationProcess<B: CommandBus> {
    bus: B,
    config: ProcessConfig,
    inventory: mpsc::UnboundedSender<SeatInventoryRequest>,

    /// Sender side of the process's own inbox, used by timers.
    inbox: mpsc::UnboundedSender<ProcessMessage>,

    reservations: HashMap<AggregateId, SeatReservation>,
    releases: HashMap<AggregateId, PendingRelease>,
    expiry_timers: HashMap<AggregateId, JoinHandle<()>>,

    /// Settled orders whose reservation waits on a pending release.
    settled: HashSet<AggregateId>,
    next_attempt: u64,
}

impl<B: CommandBus + 'static> RegistrationProcess<B> {
    pub fn new(
        bus: B,
        config: ProcessConfig,
        inventory: mpsc::UnboundedSender<SeatInventoryRequest>,
        inbox: mpsc::UnboundedSender<ProcessMessage>,
    ) -> Self {
        Self {
            bus,
            config,
            inventory,
            inbox,
            reservations: HashMap::new(),
            releases: HashMap::new(),
            expiry_timers: HashMap::new(),
            settled: HashSet::new(),
            next_attempt: 0,
        }
    }

    /// Handles messages until the inbox closes.
    pub async fn run(mut self, mut messages: mpsc::UnboundedReceiver<ProcessMessage>) {
        tracing::info!("Registration process started");

        while let Some(message) = messages.recv().await {
            let order_id = message.order_id();
            let kind = message.name();
            if let Err(e) = self.handle(message).await {
                tracing::error!(%order_id, message = kind, error = %e, "Failed to handle message");
            }
        }

        for (_, timer) in self.expiry_timers.drain() {
            timer.abort();
        }
        tracing::info!("Registration process stopped");
    }

    /// Returns the tracked reservation for an order.
    pub fn reservation(&self, order_id: AggregateId) -> Option<&SeatReservation> {
        self.reservations.get(&order_id)
    }

    /// Returns true while a seat release for the order is unacknowledged.
    pub fn has_pending_release(&self, order_id: AggregateId) -> bool {
        self.releases.contains_key(&order_id)
    }

    /// Returns true while an expiry timer is armed for the order.
    pub fn has_expiry_timer(&self, order_id: AggregateId) -> bool {
        self.expiry_timers.contains_key(&order_id)
    }

    /// Reacts to one message.
    #[tracing::instrument(skip(self, message), fields(order_id = %message.order_id(), message = message.name()))]
    pub async fn handle(&mut self, message: ProcessMessage) -> Result<()> {
        match message {
            ProcessMessage::Order { order_id, event } => self.on_order_event(order_id, event).await,
            ProcessMessage::Inventory(outcome) => self.on_inventory_outcome(outcome).await,
            ProcessMessage::ReservationTimedOut { order_id, attempt } => {
                self.on_reservation_timeout(order_id, attempt).await
            }
            ProcessMessage::ExpiryDue {
                order_id,
                expires_at,
            } => {
                self.expiry_timers.remove(&order_id);
                let as_of = Utc::now().max(expires_at);
                self.send(ExpireOrder::new(order_id, as_of)).await
            }
            ProcessMessage::RetryRelease { order_id } => {
                let Some(release) = self.releases.get(&order_id) else {
                    return Ok(());
                };
                let request = SeatInventoryRequest::Release {
                    conference_id: release.conference_id,
                    order_id,
                    seats: release.seats.clone(),
                };
                self.request(request)
            }
            ProcessMessage::ForgetReservation { order_id } => {
                if self.releases.contains_key(&order_id) {
                    self.settled.insert(order_id);
                } else {
                    self.settled.remove(&order_id);
                    self.reservations.remove(&order_id);
                }
                Ok(())
            }
        }
    }

    async fn on_order_event(&mut self, order_id: AggregateId, event: OrderEvent) -> Result<()> {
        match event {
            OrderEvent::OrderPlaced(data) => {
                if self.reservations.contains_key(&order_id) {
                    tracing::debug!("Reservation already requested");
                    return Ok(());
                }
                self.request_reservation(order_id, data.conference_id, data.seats)
            }
            OrderEvent::OrderBooked(data) => {
                metrics::counter!("orders_booked_total").increment(1);
                if let Some(expires_at) = data.expires_at {
                    self.arm_expiry(order_id, expires_at);
                }
                Ok(())
            }
            OrderEvent::OrderRejected(data) => {
                metrics::counter!("orders_rejected_total", "reason" => "seats_unavailable")
                    .increment(1);
                tracing::info!(reason = %data.reason, "Order rejected");
                self.retire_reservation(order_id);
                Ok(())
            }
            OrderEvent::OrderPaid(_) => {
                if let Some(timer) = self.expiry_timers.remove(&order_id) {
                    timer.abort();
                }
                self.reservations.remove(&order_id);
                Ok(())
            }
            OrderEvent::OrderExpired(data) => {
                metrics::counter!("orders_rejected_total", "reason" => "expired").increment(1);
                if let Some(timer) = self.expiry_timers.remove(&order_id) {
                    timer.abort();
                }
                tracing::info!("Booking expired, releasing seats");
                self.retire_reservation(order_id);
                self.start_release(order_id, data.conference_id, data.seats)
            }
            OrderEvent::RegistrantDetailsAssigned(_) => Ok(()),
        }
    }

    async fn on_inventory_outcome(&mut self, outcome: SeatInventoryOutcome) -> Result<()> {
        match outcome {
            SeatInventoryOutcome::SeatsReserved { order_id } => {
                self.on_seats_reserved(order_id).await
            }
            SeatInventoryOutcome::SeatsNotAvailable { order_id } => {
                let Some(reservation) = self.reservations.get_mut(&order_id) else {
                    tracing::warn!("Outcome for unknown reservation");
                    return Ok(());
                };
                match reservation.status {
                    ReservationStatus::Pending => {
                        record_wait(reservation);
                        reservation.reject();
                    }
                    ReservationStatus::Rejected => {}
                    ReservationStatus::Confirmed => {
                        tracing::warn!("Ignoring unavailability for a confirmed reservation");
                        return Ok(());
                    }
                }
                self.send(MarkSeatsUnavailable::new(order_id)).await
            }
            SeatInventoryOutcome::SeatsReleased { order_id } => {
                if self.releases.remove(&order_id).is_some() {
                    tracing::info!(%order_id, "Seats released");
                    self.release_resolved(order_id);
                }
                Ok(())
            }
            SeatInventoryOutcome::SeatReleaseFailed { order_id, reason } => {
                self.on_release_failed(order_id, reason);
                Ok(())
            }
        }
    }

    async fn on_seats_reserved(&mut self, order_id: AggregateId) -> Result<()> {
        let Some(reservation) = self.reservations.get_mut(&order_id) else {
            tracing::warn!("Outcome for unknown reservation");
            return Ok(());
        };

        match reservation.status {
            ReservationStatus::Pending => {
                record_wait(reservation);
                let expires_at = payment_deadline(Utc::now(), self.config.order_expiry);
                reservation.confirm(expires_at);
                self.send(MarkSeatsReserved::new(order_id, Some(expires_at)))
                    .await
            }
            ReservationStatus::Confirmed => {
                let expires_at = reservation.expires_at;
                self.send(MarkSeatsReserved::new(order_id, expires_at)).await
            }
            ReservationStatus::Rejected => {
                // Seats were held after the order was already rejected.
                tracing::warn!("Late reservation for a rejected order, releasing seats");
                let conference_id = reservation.conference_id;
                let seats = reservation.seats.clone();
                self.start_release(order_id, conference_id, seats)
            }
        }
    }

    async fn on_reservation_timeout(&mut self, order_id: AggregateId, attempt: u64) -> Result<()> {
        let Some(reservation) = self.reservations.get_mut(&order_id) else {
            return Ok(());
        };
        if !reservation.is_pending() || reservation.attempt != attempt {
            return Ok(());
        }

        metrics::counter!("seat_reservations_timed_out_total").increment(1);
        tracing::warn!(attempt, "Seat reservation timed out, rejecting order");

        reservation.reject();
        let conference_id = reservation.conference_id;
        let seats = reservation.seats.clone();

        self.send(MarkSeatsUnavailable::new(order_id)).await?;
        // The inventory may have held seats without telling us.
        self.start_release(order_id, conference_id, seats)
    }

    fn on_release_failed(&mut self, order_id: AggregateId, reason: String) {
        let Some(release) = self.releases.get_mut(&order_id) else {
            return;
        };

        release.failures += 1;
        let policy = &self.config.release_retry;
        if release.failures > policy.max_retries {
            tracing::error!(
                %order_id,
                failures = release.failures,
                %reason,
                "Giving up on seat release"
            );
            self.releases.remove(&order_id);
            self.release_resolved(order_id);
            return;
        }

        let delay = policy.delay_for_retry(release.failures - 1);
        metrics::counter!("seat_release_retries_total").increment(1);
        tracing::warn!(
            %order_id,
            failures = release.failures,
            delay_ms = delay.as_millis() as u64,
            %reason,
            "Seat release failed, retrying"
        );
        self.schedule(delay, ProcessMessage::RetryRelease { order_id });
    }

    fn request_reservation(
        &mut self,
        order_id: AggregateId,
        conference_id: ConferenceId,
        seats: Vec<OrderSeat>,
    ) -> Result<()> {
        self.next_attempt += 1;
        let attempt = self.next_attempt;

        let reservation = SeatReservation::new(order_id, conference_id, seats.clone(), attempt);
        self.reservations.insert(order_id, reservation);

        tracing::info!(attempt, "Requesting seat reservation");
        self.request(SeatInventoryRequest::Reserve {
            conference_id,
            order_id,
            seats,
        })?;

        self.schedule(
            self.config.reservation_timeout,
            ProcessMessage::ReservationTimedOut { order_id, attempt },
        );
        Ok(())
    }

    fn start_release(
        &mut self,
        order_id: AggregateId,
        conference_id: ConferenceId,
        seats: Vec<OrderSeat>,
    ) -> Result<()> {
        if self.releases.contains_key(&order_id) {
            return Ok(());
        }
        self.releases
            .insert(order_id, PendingRelease::new(conference_id, seats.clone()));
        self.request(SeatInventoryRequest::Release {
            conference_id,
            order_id,
            seats,
        })
    }

    /// Schedules the reservation of a rejected or expired order to be forgotten.
    fn retire_reservation(&self, order_id: AggregateId) {
        self.schedule(
            self.config.settled_retention,
            ProcessMessage::ForgetReservation { order_id },
        );
    }

    fn release_resolved(&mut self, order_id: AggregateId) {
        if self.settled.remove(&order_id) {
            self.reservations.remove(&order_id);
        }
    }

    fn arm_expiry(&mut self, order_id: AggregateId, expires_at: DateTime<Utc>) {
        let delay = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let timer = self.schedule(
            delay,
            ProcessMessage::ExpiryDue {
                order_id,
                expires_at,
            },
        );
        if let Some(previous) = self.expiry_timers.insert(order_id, timer) {
            previous.abort();
        }
    }

    /// Posts `message` to the inbox after `delay`.
    fn schedule(&self, delay: Duration, message: ProcessMessage) -> JoinHandle<()> {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The process may have stopped.
            let _ = inbox.send(message);
        })
    }

    fn request(&self, request: SeatInventoryRequest) -> Result<()> {
        self.inventory
            .send(request)
            .map_err(|_| ProcessError::InventoryUnavailable)
    }

    async fn send(&self, command: impl Into<RegistrationCommand>) -> Result<()> {
        let envelope = CommandEnvelope::new(command);
        tracing::debug!(command = envelope.command.name(), "Sending command");
        self.bus.send(envelope).await?;
        Ok(())
    }
}

/// Deadline `window` after `now`, with the window capped at `MAX_ORDER_EXPIRY`.
fn payment_deadline(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(window.min(MAX_ORDER_EXPIRY))
        .ok()
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn record_wait(reservation: &SeatReservation) {
    metrics::histogram!("seat_reservation_wait_seconds")
        .record(reservation.waited(Utc::now()).as_secs_f64());
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use async_trait::async_trait;
    use common::SeatTypeId;
    use registration::{AccessCode, BusError};
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingBus {
        sent: Arc<Mutex<Vec<RegistrationCommand>>>,
    }

    impl RecordingBus {
        async fn sent(&self) -> Vec<RegistrationCommand> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl CommandBus for RecordingBus {
        async fn send(&self, envelope: CommandEnvelope) -> std::result::Result<(), BusError> {
            self.sent.lock().await.push(envelope.command);
            Ok(())
        }
    }

    struct Harness {
        process: RegistrationProcess<RecordingBus>,
        bus: RecordingBus,
        requests: mpsc::UnboundedReceiver<SeatInventoryRequest>,
        inbox: mpsc::UnboundedReceiver<ProcessMessage>,
    }

    fn harness(config: ProcessConfig) -> Harness {
        let bus = RecordingBus::default();
        let (inventory_tx, requests) = mpsc::unbounded_channel();
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        let process = RegistrationProcess::new(bus.clone(), config, inventory_tx, inbox_tx);
        Harness {
            process,
            bus,
            requests,
            inbox,
        }
    }

    fn seats() -> Vec<OrderSeat> {
        vec![OrderSeat {
            seat_type_id: SeatTypeId::new(),
            quantity: 10,
        }]
    }

    fn placed(order_id: AggregateId) -> ProcessMessage {
        ProcessMessage::Order {
            order_id,
            event: OrderEvent::order_placed(order_id, ConferenceId::new(), seats()),
        }
    }

    #[tokio::test]
    async fn placed_order_requests_reservation_once() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();

        h.process.handle(placed(order_id)).await.unwrap();
        h.process.handle(placed(order_id)).await.unwrap();

        assert!(matches!(
            h.requests.try_recv(),
            Ok(SeatInventoryRequest::Reserve { order_id: id, .. }) if id == order_id
        ));
        assert!(h.requests.try_recv().is_err());
        assert!(h.process.reservation(order_id).unwrap().is_pending());
    }

    #[tokio::test]
    async fn reserved_outcome_marks_order_reserved_with_deadline() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();

        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();

        let sent = h.bus.sent().await;
        let [RegistrationCommand::MarkSeatsReserved(cmd)] = sent.as_slice() else {
            panic!("expected MarkSeatsReserved, got {sent:?}");
        };
        assert_eq!(cmd.order_id, order_id);
        assert!(cmd.expires_at.unwrap() > Utc::now());
        assert_eq!(
            h.process.reservation(order_id).unwrap().status,
            ReservationStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn duplicate_outcomes_resend_the_same_command() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();

        for _ in 0..2 {
            h.process
                .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
                .await
                .unwrap();
        }

        let sent = h.bus.sent().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
    }

    #[tokio::test]
    async fn unavailable_outcome_rejects_order() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();

        h.process
            .handle(SeatInventoryOutcome::SeatsNotAvailable { order_id }.into())
            .await
            .unwrap();

        assert_eq!(
            h.bus.sent().await,
            vec![RegistrationCommand::MarkSeatsUnavailable(
                MarkSeatsUnavailable::new(order_id)
            )]
        );
    }

    #[tokio::test]
    async fn timeout_rejects_and_releases() {
        let mut h = harness(ProcessConfig {
            reservation_timeout: Duration::from_millis(10),
            ..ProcessConfig::default()
        });
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        let _reserve = h.requests.recv().await.unwrap();

        let timeout = h.inbox.recv().await.unwrap();
        assert!(matches!(timeout, ProcessMessage::ReservationTimedOut { .. }));
        h.process.handle(timeout).await.unwrap();

        assert_eq!(
            h.bus.sent().await,
            vec![RegistrationCommand::MarkSeatsUnavailable(
                MarkSeatsUnavailable::new(order_id)
            )]
        );
        assert!(matches!(
            h.requests.try_recv(),
            Ok(SeatInventoryRequest::Release { .. })
        ));
        assert!(h.process.has_pending_release(order_id));
    }

    #[tokio::test]
    async fn stale_timeout_is_ignored() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();

        h.process
            .handle(ProcessMessage::ReservationTimedOut {
                order_id,
                attempt: 1,
            })
            .await
            .unwrap();

        // Only the MarkSeatsReserved from the outcome.
        assert_eq!(h.bus.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn late_reservation_after_timeout_releases_seats() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        let attempt = h.process.reservation(order_id).unwrap().attempt;
        h.process
            .handle(ProcessMessage::ReservationTimedOut { order_id, attempt })
            .await
            .unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsReleased { order_id }.into())
            .await
            .unwrap();

        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();

        let requests: Vec<_> = std::iter::from_fn(|| h.requests.try_recv().ok()).collect();
        let releases = requests
            .iter()
            .filter(|r| matches!(r, SeatInventoryRequest::Release { .. }))
            .count();
        assert_eq!(releases, 2);
        assert!(
            !h.bus
                .sent()
                .await
                .iter()
                .any(|c| matches!(c, RegistrationCommand::MarkSeatsReserved(_)))
        );
    }

    #[tokio::test]
    async fn booking_arms_expiry_and_payment_cancels_it() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();

        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_booked(
                    AccessCode::generate(),
                    Some(Utc::now() + chrono::Duration::minutes(15)),
                ),
            })
            .await
            .unwrap();
        assert!(h.process.has_expiry_timer(order_id));

        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_paid("PAY-1"),
            })
            .await
            .unwrap();
        assert!(!h.process.has_expiry_timer(order_id));
    }

    #[tokio::test]
    async fn due_expiry_sends_expire_order() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        let expires_at = Utc::now() + chrono::Duration::milliseconds(20);

        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_booked(AccessCode::generate(), Some(expires_at)),
            })
            .await
            .unwrap();

        let due = h.inbox.recv().await.unwrap();
        h.process.handle(due).await.unwrap();

        let sent = h.bus.sent().await;
        let [RegistrationCommand::ExpireOrder(cmd)] = sent.as_slice() else {
            panic!("expected ExpireOrder, got {sent:?}");
        };
        assert!(cmd.as_of >= expires_at);
        assert!(!h.process.has_expiry_timer(order_id));
    }

    #[tokio::test]
    async fn expired_order_releases_seats() {
        let mut h = harness(ProcessConfig::default());
        let order_id = AggregateId::new();
        let conference_id = ConferenceId::new();

        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_expired(conference_id, seats()),
            })
            .await
            .unwrap();

        assert!(matches!(
            h.requests.try_recv(),
            Ok(SeatInventoryRequest::Release { conference_id: c, .. }) if c == conference_id
        ));
        assert!(h.process.has_pending_release(order_id));
    }

    #[tokio::test]
    async fn failed_release_is_retried_then_abandoned() {
        let mut h = harness(ProcessConfig {
            release_retry: crate::config::RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
            ..ProcessConfig::default()
        });
        let order_id = AggregateId::new();
        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_expired(ConferenceId::new(), seats()),
            })
            .await
            .unwrap();
        let _first = h.requests.recv().await.unwrap();

        for _ in 0..2 {
            h.process
                .handle(
                    SeatInventoryOutcome::SeatReleaseFailed {
                        order_id,
                        reason: "offline".to_string(),
                    }
                    .into(),
                )
                .await
                .unwrap();
            let retry = h.inbox.recv().await.unwrap();
            assert!(matches!(retry, ProcessMessage::RetryRelease { .. }));
            h.process.handle(retry).await.unwrap();
            assert!(matches!(
                h.requests.recv().await,
                Some(SeatInventoryRequest::Release { .. })
            ));
        }

        h.process
            .handle(
                SeatInventoryOutcome::SeatReleaseFailed {
                    order_id,
                    reason: "offline".to_string(),
                }
                .into(),
            )
            .await
            .unwrap();
        assert!(!h.process.has_pending_release(order_id));
        // The order itself is never touched by release handling.
        assert!(h.bus.sent().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_orders_forget_their_reservations() {
        let mut h = harness(ProcessConfig {
            settled_retention: Duration::from_millis(1),
            ..ProcessConfig::default()
        });
        let order_ids: Vec<_> = (0..200).map(|_| AggregateId::new()).collect();

        for &order_id in &order_ids {
            h.process.handle(placed(order_id)).await.unwrap();
            h.process
                .handle(SeatInventoryOutcome::SeatsNotAvailable { order_id }.into())
                .await
                .unwrap();
            h.process
                .handle(ProcessMessage::Order {
                    order_id,
                    event: OrderEvent::order_rejected("seats unavailable"),
                })
                .await
                .unwrap();
        }

        for _ in &order_ids {
            let forget = h.inbox.recv().await.unwrap();
            assert!(matches!(forget, ProcessMessage::ForgetReservation { .. }));
            h.process.handle(forget).await.unwrap();
        }
        for &order_id in &order_ids {
            assert!(h.process.reservation(order_id).is_none());
        }
    }

    #[tokio::test]
    async fn rejected_reservation_answers_late_outcomes_until_retention_ends() {
        let mut h = harness(ProcessConfig {
            settled_retention: Duration::from_millis(20),
            ..ProcessConfig::default()
        });
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsNotAvailable { order_id }.into())
            .await
            .unwrap();
        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_rejected("seats unavailable"),
            })
            .await
            .unwrap();
        let _reserve = h.requests.recv().await.unwrap();

        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();
        assert!(matches!(
            h.requests.try_recv(),
            Ok(SeatInventoryRequest::Release { .. })
        ));

        // The release is still unacknowledged when the window closes.
        let forget = h.inbox.recv().await.unwrap();
        h.process.handle(forget).await.unwrap();
        assert!(h.process.reservation(order_id).is_some());

        h.process
            .handle(SeatInventoryOutcome::SeatsReleased { order_id }.into())
            .await
            .unwrap();
        assert!(h.process.reservation(order_id).is_none());
        assert!(!h.process.has_pending_release(order_id));
    }

    #[tokio::test]
    async fn expired_order_forgets_reservation_after_release() {
        let mut h = harness(ProcessConfig {
            settled_retention: Duration::from_millis(1),
            ..ProcessConfig::default()
        });
        let order_id = AggregateId::new();
        let conference_id = ConferenceId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();

        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_expired(conference_id, seats()),
            })
            .await
            .unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsReleased { order_id }.into())
            .await
            .unwrap();
        assert!(h.process.reservation(order_id).is_some());

        let forget = h.inbox.recv().await.unwrap();
        h.process.handle(forget).await.unwrap();
        assert!(h.process.reservation(order_id).is_none());
    }

    #[tokio::test]
    async fn abandoned_release_still_forgets_the_reservation() {
        let mut h = harness(ProcessConfig {
            settled_retention: Duration::from_millis(1),
            release_retry: crate::config::RetryPolicy {
                max_retries: 0,
                ..crate::config::RetryPolicy::default()
            },
            ..ProcessConfig::default()
        });
        let order_id = AggregateId::new();
        h.process.handle(placed(order_id)).await.unwrap();
        h.process
            .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
            .await
            .unwrap();
        h.process
            .handle(ProcessMessage::Order {
                order_id,
                event: OrderEvent::order_expired(ConferenceId::new(), seats()),
            })
            .await
            .unwrap();

        let forget = h.inbox.recv().await.unwrap();
        h.process.handle(forget).await.unwrap();
        assert!(h.process.reservation(order_id).is_some());

        h.process
            .handle(
                SeatInventoryOutcome::SeatReleaseFailed {
                    order_id,
                    reason: "offline".to_string(),
                }
                .into(),
            )
            .await
            .unwrap();
        assert!(!h.process.has_pending_release(order_id));
        assert!(h.process.reservation(order_id).is_none());
    }

    #[tokio::test]
    async fn oversized_payment_window_is_capped() {
        let mut h = harness(ProcessConfig {
            order_expiry: Duration::from_secs(10_000_000_000_000),
            ..ProcessConfig::default()
        });
        let first = AggregateId::new();
        let second = AggregateId::new();

        for order_id in [first, second] {
            h.process.handle(placed(order_id)).await.unwrap();
            h.process
                .handle(SeatInventoryOutcome::SeatsReserved { order_id }.into())
                .await
                .unwrap();
        }

        let sent = h.bus.sent().await;
        assert_eq!(sent.len(), 2);
        let RegistrationCommand::MarkSeatsReserved(cmd) = &sent[0] else {
            panic!("expected MarkSeatsReserved, got {sent:?}");
        };
        let expires_at = cmd.expires_at.unwrap();
        let cap = chrono::Duration::from_std(MAX_ORDER_EXPIRY).unwrap();
        assert!(expires_at > Utc::now());
        assert!(expires_at <= Utc::now() + cap);
    }

    #[test]
    fn payment_deadline_never_overflows() {
        let now = Utc::now();
        assert_eq!(
            payment_deadline(now, Duration::from_secs(60)),
            now + chrono::Duration::seconds(60)
        );
        assert_eq!(
            payment_deadline(now, Duration::MAX),
            now + chrono::Duration::from_std(MAX_ORDER_EXPIRY).unwrap()
        );
        assert_eq!(
            payment_deadline(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)),
            DateTime::<Utc>::MAX_UTC
        );
    }
}
