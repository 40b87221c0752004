//! In-process composition of the registration workflow.
//!
//! Wires the command bus, the registration process, the seat inventory
//! stand-in and the order views together over channels.

pub mod config;

use common::{ConferenceId, SeatTypeId};
use event_store::InMemoryEventStore;
use projections::{
    ConferenceSnapshot, InMemoryViewRepository, OrderViewProjection, ProjectionError,
    ProjectionProcessor, ViewRepository,
};
use registration::{Conference, InProcessCommandBus, Money, SeatType};
use saga::{InMemorySeatInventory, RegistrationProcess, forward_order_events};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use config::{Config, LogFormat};

/// Seats offered per seat type of the demo conference.
pub const DEMO_SEATS_PER_TYPE: u32 = 100;

/// Errors that stop the host from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Projection catch-up failed: {0}")]
    Projection(#[from] ProjectionError),
}

/// A running registration system.
pub struct Runtime {
    bus: InProcessCommandBus<InMemoryEventStore>,
    views: InMemoryViewRepository,
    inventory: InMemorySeatInventory,
    tasks: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Builds and starts every component.
    ///
    /// Views are caught up from the log before live delivery starts.
    #[tracing::instrument(skip(config))]
    pub async fn start(config: &Config) -> Result<Self, StartupError> {
        let store = InMemoryEventStore::new();
        let bus = InProcessCommandBus::new(store.clone(), config.bus_config());
        let views = InMemoryViewRepository::new();
        let inventory = InMemorySeatInventory::new();
        let mut tasks = Vec::new();

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(OrderViewProjection::new(views.clone())));
        let live = bus.subscribe().await;
        let replayed = processor.run_catch_up().await?;
        tracing::info!(
            projections = processor.projection_count(),
            replayed,
            "Views caught up"
        );
        tasks.push(tokio::spawn(async move { processor.run_live(live).await }));

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        tasks.push(forward_order_events(bus.subscribe().await, inbox_tx.clone()));
        tasks.push(inventory.clone().spawn(requests_rx, inbox_tx.clone()));

        let process =
            RegistrationProcess::new(bus.clone(), config.process_config(), requests_tx, inbox_tx);
        tasks.push(tokio::spawn(process.run(inbox_rx)));

        let runtime = Self {
            bus,
            views,
            inventory,
            tasks,
        };
        if config.seed_demo_conference {
            runtime.seed_demo_conference().await?;
        }

        tracing::info!("Registration runtime started");
        Ok(runtime)
    }

    pub fn bus(&self) -> &InProcessCommandBus<InMemoryEventStore> {
        &self.bus
    }

    pub fn views(&self) -> &InMemoryViewRepository {
        &self.views
    }

    pub fn inventory(&self) -> &InMemorySeatInventory {
        &self.inventory
    }

    /// Makes a conference bookable and visible.
    pub async fn publish_conference(
        &self,
        conference: &Conference,
        seats_per_type: u32,
    ) -> Result<(), ProjectionError> {
        self.inventory
            .add_conference(conference, seats_per_type)
            .await;
        self.views
            .publish_conference(ConferenceSnapshot::from(conference))
            .await
    }

    async fn seed_demo_conference(&self) -> Result<(), ProjectionError> {
        let conference = demo_conference();
        tracing::info!(code = %conference.code, conference_id = %conference.id, "Seeding demo conference");
        self.publish_conference(&conference, DEMO_SEATS_PER_TYPE)
            .await
    }

    /// Stops every background task.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Aborted tasks finish with a cancellation error.
            let _ = task.await;
        }
        tracing::info!("Registration runtime stopped");
    }
}

/// The conference published when `SEED_DEMO_CONFERENCE` is set.
pub fn demo_conference() -> Conference {
    Conference::new(ConferenceId::new(), "demo", "Demo Conference")
        .with_seat_type(SeatType::new(
            SeatTypeId::new(),
            "General admission",
            Money::from_dollars(199),
        ))
        .with_seat_type(SeatType::new(
            SeatTypeId::new(),
            "Workshop",
            Money::from_dollars(99),
        ))
}
