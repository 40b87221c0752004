//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{EventRecord, EventStore, ExpectedVersion, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The committed records, with their store positions.
    pub records: Vec<EventRecord>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Returns true if the command was a no-op.
    pub fn is_noop(&self) -> bool {
        self.events.is_empty()
    }
}

/// Trait for commands that can be executed against an aggregate.
///
/// Commands represent an intention to perform an action. They may be rejected
/// if the aggregate's current state doesn't allow the action.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Handler for executing commands against aggregates.
///
/// Every execution reads the stream, decides on the current state, and
/// appends with the version it read as the precondition. A concurrent writer
/// makes the append fail with `ConcurrencyConflict` and nothing is written.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let records = self.store.load_stream(aggregate_id).await?;

        let mut aggregate = A::default();
        for record in records {
            let event: A::Event = record.decode()?;
            aggregate.apply(event);
            aggregate.set_version(record.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Executes a command that may create the aggregate.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.decide_and_append(aggregate_id, aggregate, command_fn)
            .await
    }

    /// Executes a command against an aggregate that must already exist.
    ///
    /// Fails with `AggregateNotFound` before deciding anything otherwise.
    pub async fn execute_existing<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let Some(aggregate) = self.load_existing(aggregate_id).await? else {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: aggregate_id.to_string(),
            });
        };
        self.decide_and_append(aggregate_id, aggregate, command_fn)
            .await
    }

    async fn decide_and_append<F>(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let current_version = aggregate.version();

        // Execute command to get events
        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                records: vec![],
                new_version: current_version,
            });
        }

        let records = self.build_records(aggregate_id, current_version, &events)?;

        // Persist events with optimistic concurrency
        let committed = self
            .store
            .append(records, ExpectedVersion::from_read(current_version))
            .await?;

        let mut new_version = current_version;
        for (event, record) in events.iter().zip(&committed) {
            aggregate.apply(event.clone());
            new_version = record.version;
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            records: committed,
            new_version,
        })
    }

    fn build_records(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventRecord>, DomainError> {
        let mut records = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let record = EventRecord::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            records.push(record);
        }

        Ok(records)
    }
}
