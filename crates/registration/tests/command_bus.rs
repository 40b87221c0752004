//! Integration tests for the in-process command bus.

use std::time::Duration;

use common::{AggregateId, ConferenceId, SeatTypeId};
use event_store::{InMemoryEventStore, Version};
use registration::{
    AssignRegistrantDetails, BusConfig, CommandBus, CommandEnvelope, ErrorKind,
    InProcessCommandBus, MarkSeatsReserved, OrderState, RegisterToConference, SeatQuantity,
};

fn create_bus() -> InProcessCommandBus<InMemoryEventStore> {
    InProcessCommandBus::new(InMemoryEventStore::new(), BusConfig::default())
}

fn register(order_id: AggregateId) -> RegisterToConference {
    RegisterToConference::new(
        ConferenceId::new(),
        order_id,
        vec![SeatQuantity::new(SeatTypeId::new(), 1)],
    )
}

/// Polls until the order reaches `version` or the deadline passes.
async fn wait_for_version(
    bus: &InProcessCommandBus<InMemoryEventStore>,
    order_id: AggregateId,
    version: Version,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if let Ok(Some(order)) = bus.service().get_order(order_id).await
            && registration::Aggregate::version(&order) == version
        {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn send_only_acknowledges() {
    let bus = create_bus();
    let order_id = AggregateId::new();

    bus.send(CommandEnvelope::new(register(order_id)))
        .await
        .unwrap();

    assert!(wait_for_version(&bus, order_id, Version::first()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commands_for_one_order_are_serialized() {
    let bus = create_bus();
    let order_id = AggregateId::new();

    bus.send_and_confirm(CommandEnvelope::new(register(order_id)))
        .await
        .unwrap();

    // Every command changes the registrant, so each must commit exactly once.
    let mut sends = Vec::new();
    for i in 0..20 {
        let bus = bus.clone();
        sends.push(tokio::spawn(async move {
            bus.send(CommandEnvelope::new(AssignRegistrantDetails::new(
                order_id,
                format!("user{i}@contoso.com"),
                "First",
                "Last",
            )))
            .await
        }));
    }
    for send in sends {
        send.await.unwrap().unwrap();
    }

    assert!(wait_for_version(&bus, order_id, Version::new(21)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_orders_proceed_in_parallel() {
    let bus = create_bus();
    let order_ids: Vec<_> = (0..10).map(|_| AggregateId::new()).collect();

    let mut handles = Vec::new();
    for order_id in order_ids.clone() {
        let bus = bus.clone();
        handles.push(tokio::spawn(async move {
            bus.send_and_confirm(CommandEnvelope::new(register(order_id)))
                .await?;
            bus.send_and_confirm(CommandEnvelope::new(MarkSeatsReserved::new(order_id, None)))
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state, OrderState::Booked);
    }
    assert_eq!(bus.active_workers().await, order_ids.len());
}

#[tokio::test]
async fn duplicate_delivery_is_tolerated() {
    let bus = create_bus();
    let order_id = AggregateId::new();
    let envelope = CommandEnvelope::new(register(order_id));

    let first = bus.send_and_confirm(envelope.clone()).await.unwrap();
    let second = bus.send_and_confirm(envelope).await.unwrap();

    assert_eq!(first.version, Version::first());
    assert_eq!(second.version, Version::first());
    assert!(second.events.is_empty());
}

#[tokio::test]
async fn rejected_commands_report_their_kind() {
    let bus = create_bus();
    let order_id = AggregateId::new();

    let err = bus
        .send_and_confirm(CommandEnvelope::new(MarkSeatsReserved::new(order_id, None)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = bus
        .send(CommandEnvelope::new(AssignRegistrantDetails::new(
            order_id, "", "First", "Last",
        )))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
