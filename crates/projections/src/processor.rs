//! Projection processor for feeding events to projections.

use event_store::{EventRecord, EventStore};
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};

/// Delivers committed events to projections.
///
/// The processor supports:
/// - Catch-up: replays the log from the lowest projection checkpoint
/// - Live delivery: forwards records from a bus subscription as they commit
/// - Rebuild: resets all projections and replays from scratch
///
/// Subscribe to live records before catching up. Records committed in
/// between then arrive twice, which projections tolerate.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Replays every stored event that some projection has not seen yet.
    ///
    /// Returns the number of records read from the store.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut from = None::<ProjectionPosition>;
        for projection in &self.projections {
            let pos = projection.position().await;
            from = Some(from.map_or(pos, |f| f.min(pos)));
        }
        let Some(from) = from else {
            return Ok(0);
        };

        let mut stream = self.store.stream_all(from.as_u64()).await?;
        let mut replayed: u64 = 0;

        while let Some(result) = stream.next().await {
            let record = result?;
            replayed += 1;

            for projection in &self.projections {
                if !projection.position().await.covers(record.position) {
                    projection.handle(&record).await?;
                    metrics::counter!("projection_events_processed_total", "projection" => projection.name())
                        .increment(1);
                }
            }
        }

        tracing::info!(from = %from, replayed, "Catch-up complete");
        Ok(replayed)
    }

    /// Delivers a single record to all registered projections.
    #[tracing::instrument(skip(self, record), fields(event_type = %record.event_type, order_id = %record.aggregate_id))]
    pub async fn process_event(&self, record: &EventRecord) -> Result<()> {
        for projection in &self.projections {
            projection.handle(record).await?;
            metrics::counter!("projection_events_processed_total", "projection" => projection.name())
                .increment(1);
        }
        Ok(())
    }

    /// Delivers live records until the subscription closes.
    ///
    /// A record that fails to project is logged and skipped.
    pub async fn run_live(&self, mut records: mpsc::UnboundedReceiver<EventRecord>) {
        while let Some(record) = records.recv().await {
            if let Err(e) = self.process_event(&record).await {
                metrics::counter!("projection_failures_total").increment(1);
                tracing::error!(
                    event_type = %record.event_type,
                    position = record.position,
                    error = %e,
                    "Failed to project event"
                );
            }
        }
        tracing::info!("Live projection stopped");
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
