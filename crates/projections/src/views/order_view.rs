//! Order view projection.
//!
//! Folds order events into [`OrderSnapshot`]s and publishes every change to
//! the view repository.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::EventRecord;
use registration::{OrderEvent, OrderState};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::view_repository::{OrderSnapshot, ViewRepository};

const ORDER_AGGREGATE: &str = "Order";

/// Projects order streams into order snapshots.
///
/// Events at or below a snapshot's version are skipped, so replaying the
/// log over live delivery never regresses a view.
pub struct OrderViewProjection<R: ViewRepository> {
    repository: R,
    snapshots: Arc<RwLock<HashMap<AggregateId, OrderSnapshot>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl<R: ViewRepository> OrderViewProjection<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            snapshots: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Returns the projection's current snapshot of an order.
    pub async fn snapshot(&self, order_id: AggregateId) -> Option<OrderSnapshot> {
        self.snapshots.read().await.get(&order_id).cloned()
    }

    async fn advance(&self, position: u64) {
        let mut pos = self.position.write().await;
        *pos = pos.advance_to(position);
    }
}

/// Applies one event to a snapshot. Returns None for an event that cannot
/// start a snapshot.
fn fold(
    current: Option<OrderSnapshot>,
    order_id: AggregateId,
    version: u64,
    event: OrderEvent,
) -> Option<OrderSnapshot> {
    let mut snapshot = match (current, event) {
        (None, OrderEvent::OrderPlaced(data)) => OrderSnapshot {
            order_id,
            conference_id: data.conference_id,
            state: OrderState::Created,
            registrant_email: String::new(),
            access_code: None,
            seats: data.seats,
            version,
        },
        (None, _) => return None,
        (Some(snapshot), OrderEvent::OrderPlaced(_)) => snapshot,
        (Some(mut snapshot), OrderEvent::OrderBooked(data)) => {
            snapshot.state = OrderState::Booked;
            snapshot.access_code = Some(data.access_code.as_str().to_string());
            snapshot
        }
        (Some(mut snapshot), OrderEvent::OrderRejected(_) | OrderEvent::OrderExpired(_)) => {
            snapshot.state = OrderState::Rejected;
            snapshot.access_code = None;
            snapshot
        }
        (Some(mut snapshot), OrderEvent::RegistrantDetailsAssigned(data)) => {
            snapshot.registrant_email = data.registrant.email;
            snapshot
        }
        (Some(mut snapshot), OrderEvent::OrderPaid(_)) => {
            snapshot.state = OrderState::Paid;
            snapshot
        }
    };
    snapshot.version = version;
    Some(snapshot)
}

#[async_trait]
impl<R: ViewRepository> Projection for OrderViewProjection<R> {
    fn name(&self) -> &'static str {
        "OrderViewProjection"
    }

    async fn handle(&self, record: &EventRecord) -> Result<()> {
        if record.aggregate_type != ORDER_AGGREGATE {
            self.advance(record.position).await;
            return Ok(());
        }

        let order_id = record.aggregate_id;
        let version = record.version.as_u64();
        let event: OrderEvent = record.decode()?;

        let snapshot = {
            let mut snapshots = self.snapshots.write().await;
            let current = snapshots.get(&order_id).cloned();
            if current.as_ref().is_some_and(|s| version <= s.version) {
                tracing::trace!(%order_id, version, "Skipping already projected event");
                drop(snapshots);
                self.advance(record.position).await;
                return Ok(());
            }

            let Some(snapshot) = fold(current, order_id, version, event) else {
                tracing::warn!(
                    %order_id,
                    event_type = %record.event_type,
                    "Event for an order that was never placed"
                );
                drop(snapshots);
                self.advance(record.position).await;
                return Ok(());
            };
            snapshots.insert(order_id, snapshot.clone());
            snapshot
        };

        self.repository.publish_order(snapshot).await?;
        self.advance(record.position).await;
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.snapshots.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}
