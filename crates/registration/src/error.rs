//! Domain error types.

use event_store::EventStoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::order::OrderError;

/// How a failed command should be treated by whoever sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed command. Rejected at the boundary, never retried.
    InvalidRequest,

    /// Command does not apply to the order's current state.
    InvalidTransition,

    /// The command references an unknown order.
    NotFound,

    /// The order changed between read and write; retry with a fresh read.
    ConcurrencyConflict,

    /// Infrastructure failure.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// An error occurred in the order aggregate.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Order(e) => e.kind(),
            DomainError::AggregateNotFound { .. } => ErrorKind::NotFound,
            DomainError::EventStore(e) if e.is_conflict() => ErrorKind::ConcurrencyConflict,
            DomainError::EventStore(_) | DomainError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if the command can be retried after a fresh read.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ConcurrencyConflict
    }
}
