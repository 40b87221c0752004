use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::store::{EventStore, EventStream, ExpectedVersion, conflict, validate_append};
use crate::{AggregateId, EventRecord, Result, Version};

type StreamHandle = Arc<Mutex<Vec<EventRecord>>>;

/// In-memory event store.
///
/// Every stream sits behind its own mutex, so the version check and the write
/// for one order happen atomically while other orders proceed untouched. The
/// commit log only records order of commits for `stream_all`.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, StreamHandle>>>,
    log: Arc<RwLock<Vec<EventRecord>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of committed events.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.len()
    }

    async fn stream_handle(&self, aggregate_id: AggregateId) -> StreamHandle {
        if let Some(handle) = self.streams.read().await.get(&aggregate_id) {
            return Arc::clone(handle);
        }

        let mut streams = self.streams.write().await;
        Arc::clone(streams.entry(aggregate_id).or_default())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut records: Vec<EventRecord>,
        expected: ExpectedVersion,
    ) -> Result<Vec<EventRecord>> {
        validate_append(&records)?;
        let aggregate_id = records[0].aggregate_id;

        let handle = self.stream_handle(aggregate_id).await;
        let mut stream = handle.lock().await;

        let current = stream
            .last()
            .map(|record| record.version)
            .unwrap_or(Version::initial());

        if !expected.matches(current) || records[0].version != current.next() {
            metrics::counter!("event_store_conflicts_total").increment(1);
            tracing::debug!(%aggregate_id, %current, ?expected, "append rejected");
            return Err(conflict(aggregate_id, expected, current));
        }

        let mut log = self.log.write().await;
        for record in &mut records {
            record.position = log.len() as u64 + 1;
            log.push(record.clone());
        }
        stream.extend(records.iter().cloned());

        metrics::counter!("event_store_appends_total").increment(1);
        Ok(records)
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventRecord>> {
        let handle = match self.streams.read().await.get(&aggregate_id) {
            Some(handle) => Arc::clone(handle),
            None => return Ok(Vec::new()),
        };
        let stream = handle.lock().await;
        Ok(stream.clone())
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        let events = self.load_stream(aggregate_id).await?;
        Ok(events
            .last()
            .map(|record| record.version)
            .unwrap_or(Version::initial()))
    }

    async fn stream_all(&self, after: u64) -> Result<EventStream> {
        use futures_util::stream;

        let log = self.log.read().await;
        let events: Vec<_> = log
            .iter()
            .filter(|record| record.position > after)
            .cloned()
            .collect();

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
