use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventRecord, EventStoreError, Result, Version};

/// Version precondition for an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpectedVersion {
    /// No check. Only for tooling and tests.
    #[default]
    Any,

    /// The stream must not exist yet.
    NoStream,

    /// The stream must be exactly at this version.
    Exact(Version),
}

impl ExpectedVersion {
    /// Precondition for a writer that read the stream at `version`.
    pub fn from_read(version: Version) -> Self {
        if version == Version::initial() {
            ExpectedVersion::NoStream
        } else {
            ExpectedVersion::Exact(version)
        }
    }

    /// Returns true if a stream at `actual` satisfies this precondition.
    pub fn matches(&self, actual: Version) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => actual == Version::initial(),
            ExpectedVersion::Exact(expected) => *expected == actual,
        }
    }

    fn as_version(&self, actual: Version) -> Version {
        match self {
            ExpectedVersion::Any => actual,
            ExpectedVersion::NoStream => Version::initial(),
            ExpectedVersion::Exact(expected) => *expected,
        }
    }
}

/// A stream of recorded events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord>> + Send>>;

/// Storage for per-aggregate event streams.
///
/// Appends to one stream are atomic and version-checked. Appends to different
/// streams never contend with each other.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch to a single stream.
    ///
    /// Fails with `ConcurrencyConflict` when `expected` does not hold for the
    /// stream's current version. Returns the committed records with their
    /// store positions filled in.
    async fn append(
        &self,
        records: Vec<EventRecord>,
        expected: ExpectedVersion,
    ) -> Result<Vec<EventRecord>>;

    /// Returns all events of one stream, oldest first.
    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>>;

    /// Current version of a stream; `Version::initial()` when it does not exist.
    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Version>;

    /// Streams every committed event with `position > after`, in commit order.
    async fn stream_all(&self, after: u64) -> Result<EventStream>;
}

/// Checks that a batch targets one stream with consecutive versions.
pub(crate) fn validate_append(records: &[EventRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for record in records.iter().skip(1) {
        if record.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events must belong to the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if record.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be consecutive: expected {expected_version}, got {}",
                record.version
            )));
        }
    }

    Ok(())
}

/// Builds the conflict error for a failed precondition.
pub(crate) fn conflict(
    aggregate_id: AggregateId,
    expected: ExpectedVersion,
    actual: Version,
) -> EventStoreError {
    EventStoreError::ConcurrencyConflict {
        aggregate_id,
        expected: expected.as_version(actual),
        actual,
    }
}
