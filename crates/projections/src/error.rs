//! Projection error types.

use thiserror::Error;

/// Errors that can occur while projecting events into views.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// An event payload did not match the event type it was recorded as.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The view repository refused a snapshot.
    #[error("View repository error: {0}")]
    Repository(String),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
