//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate, named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name recorded in the store.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced consistency boundary.
///
/// Command methods inspect the current state and return the events to
/// record; `apply` folds an event into the state and must never fail.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors this aggregate's command methods return.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name used as the stream category.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's id, or None before its first event.
    fn id(&self) -> Option<AggregateId>;

    /// Returns the stream version the state was rebuilt at.
    fn version(&self) -> Version;

    /// Sets the version after replaying or committing events.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Opened { id: AggregateId },
        Incremented,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Opened { .. } => "CounterOpened",
                CounterEvent::Incremented => "CounterIncremented",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Counter {
        id: Option<AggregateId>,
        value: u32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("counter error")]
    struct CounterError;

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Error = CounterError;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                CounterEvent::Opened { id } => self.id = Some(id),
                CounterEvent::Incremented => self.value += 1,
            }
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let id = AggregateId::new();
        let mut counter = Counter::default();
        counter.apply_events(vec![
            CounterEvent::Opened { id },
            CounterEvent::Incremented,
            CounterEvent::Incremented,
        ]);

        assert_eq!(counter.id(), Some(id));
        assert_eq!(counter.value, 2);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            CounterEvent::Opened {
                id: AggregateId::new()
            }
            .event_type(),
            "CounterOpened"
        );
        assert_eq!(CounterEvent::Incremented.event_type(), "CounterIncremented");
    }
}
