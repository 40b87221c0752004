//! Denormalized view storage.
//!
//! The write side only ever publishes into a [`ViewRepository`]. Lookups
//! live on the concrete store and serve the presentation layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, ConferenceId};
use registration::{Conference, OrderSeat, OrderState, SeatType};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::Result;

/// Denormalized view of one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: AggregateId,
    pub conference_id: ConferenceId,
    pub state: OrderState,

    /// Empty until registrant details are assigned.
    pub registrant_email: String,

    /// Present only while the order is booked or paid.
    pub access_code: Option<String>,

    pub seats: Vec<OrderSeat>,

    /// Version of the last event folded into this snapshot.
    pub version: u64,
}

/// Denormalized view of a conference and its seat types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceSnapshot {
    pub conference_id: ConferenceId,
    pub code: String,
    pub name: String,
    pub seat_types: Vec<SeatType>,
}

impl From<&Conference> for ConferenceSnapshot {
    fn from(conference: &Conference) -> Self {
        Self {
            conference_id: conference.id,
            code: conference.code.clone(),
            name: conference.name.clone(),
            seat_types: conference.seat_types.clone(),
        }
    }
}

/// Write contract of the read side.
#[async_trait]
pub trait ViewRepository: Send + Sync {
    /// Replaces the stored view of the order.
    async fn publish_order(&self, snapshot: OrderSnapshot) -> Result<()>;

    /// Replaces the stored view of the conference.
    async fn publish_conference(&self, snapshot: ConferenceSnapshot) -> Result<()>;
}

#[async_trait]
impl<R: ViewRepository + ?Sized> ViewRepository for Arc<R> {
    async fn publish_order(&self, snapshot: OrderSnapshot) -> Result<()> {
        (**self).publish_order(snapshot).await
    }

    async fn publish_conference(&self, snapshot: ConferenceSnapshot) -> Result<()> {
        (**self).publish_conference(snapshot).await
    }
}

#[derive(Debug, Default)]
struct Views {
    orders: HashMap<AggregateId, OrderSnapshot>,
    conferences: HashMap<ConferenceId, ConferenceSnapshot>,
}

/// In-memory view store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryViewRepository {
    views: Arc<RwLock<Views>>,
}

impl InMemoryViewRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn find_order(&self, order_id: AggregateId) -> Option<OrderSnapshot> {
        self.views.read().await.orders.get(&order_id).cloned()
    }

    pub async fn orders(&self) -> Vec<OrderSnapshot> {
        self.views.read().await.orders.values().cloned().collect()
    }

    /// Finds an order by registrant email and access code.
    ///
    /// The email comparison ignores case; the access code must match exactly.
    pub async fn find_order_by_locator(
        &self,
        email: &str,
        access_code: &str,
    ) -> Option<OrderSnapshot> {
        let email = email.trim();
        if email.is_empty() || access_code.is_empty() {
            return None;
        }

        self.views
            .read()
            .await
            .orders
            .values()
            .find(|order| {
                order.registrant_email.eq_ignore_ascii_case(email)
                    && order.access_code.as_deref() == Some(access_code)
            })
            .cloned()
    }

    pub async fn find_conference_by_code(&self, code: &str) -> Option<ConferenceSnapshot> {
        self.views
            .read()
            .await
            .conferences
            .values()
            .find(|conference| conference.code == code)
            .cloned()
    }

    /// Drops every stored order view.
    pub async fn clear_orders(&self) {
        self.views.write().await.orders.clear();
    }
}

#[async_trait]
impl ViewRepository for InMemoryViewRepository {
    async fn publish_order(&self, snapshot: OrderSnapshot) -> Result<()> {
        tracing::trace!(order_id = %snapshot.order_id, state = %snapshot.state, "Publishing order view");
        self.views
            .write()
            .await
            .orders
            .insert(snapshot.order_id, snapshot);
        Ok(())
    }

    async fn publish_conference(&self, snapshot: ConferenceSnapshot) -> Result<()> {
        self.views
            .write()
            .await
            .conferences
            .insert(snapshot.conference_id, snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SeatTypeId;
    use registration::Money;

    fn booked(email: &str, code: &str) -> OrderSnapshot {
        OrderSnapshot {
            order_id: AggregateId::new(),
            conference_id: ConferenceId::new(),
            state: OrderState::Booked,
            registrant_email: email.to_string(),
            access_code: Some(code.to_string()),
            seats: vec![],
            version: 2,
        }
    }

    #[tokio::test]
    async fn publish_replaces_previous_snapshot() {
        let repo = InMemoryViewRepository::new();
        let mut snapshot = booked("", "ABC123");
        repo.publish_order(snapshot.clone()).await.unwrap();

        snapshot.state = OrderState::Paid;
        snapshot.version = 4;
        repo.publish_order(snapshot.clone()).await.unwrap();

        assert_eq!(repo.orders().await.len(), 1);
        assert_eq!(repo.find_order(snapshot.order_id).await, Some(snapshot));
    }

    #[tokio::test]
    async fn locator_matches_email_and_access_code() {
        let repo = InMemoryViewRepository::new();
        let snapshot = booked("info@contoso.com", "asdf12");
        repo.publish_order(snapshot.clone()).await.unwrap();

        let found = repo
            .find_order_by_locator("Info@Contoso.com", "asdf12")
            .await;
        assert_eq!(found.map(|o| o.order_id), Some(snapshot.order_id));

        assert!(
            repo.find_order_by_locator("info@contoso.com", "wrong1")
                .await
                .is_none()
        );
        assert!(
            repo.find_order_by_locator("other@contoso.com", "asdf12")
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn locator_never_matches_blank_fields() {
        let repo = InMemoryViewRepository::new();
        let mut snapshot = booked("", "asdf12");
        snapshot.access_code = None;
        repo.publish_order(snapshot).await.unwrap();

        assert!(repo.find_order_by_locator("", "").await.is_none());
        assert!(repo.find_order_by_locator("  ", "asdf12").await.is_none());
    }

    #[tokio::test]
    async fn conferences_are_found_by_code() {
        let repo = InMemoryViewRepository::new();
        let conference = Conference::new(ConferenceId::new(), "rustconf", "RustConf").with_seat_type(
            SeatType::new(SeatTypeId::new(), "General admission", Money::from_dollars(199)),
        );
        repo.publish_conference(ConferenceSnapshot::from(&conference))
            .await
            .unwrap();

        let found = repo.find_conference_by_code("rustconf").await.unwrap();
        assert_eq!(found.conference_id, conference.id);
        assert_eq!(found.seat_types.len(), 1);
        assert!(repo.find_conference_by_code("missing").await.is_none());
    }
}
