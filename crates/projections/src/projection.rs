//! Core projection trait and checkpoint tracking.

use async_trait::async_trait;
use event_store::EventRecord;

use crate::Result;

/// The furthest store position a projection has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProjectionPosition(u64);

impl ProjectionPosition {
    /// Position before the first event.
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Moves the checkpoint to `position` unless it is already past it.
    pub fn advance_to(&self, position: u64) -> Self {
        Self(self.0.max(position))
    }

    /// Returns true if the record at `position` was already seen.
    pub fn covers(&self, position: u64) -> bool {
        position != 0 && position <= self.0
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.0)
    }
}

/// Turns committed events into a read model.
///
/// Delivery is at least once. `handle` must tolerate seeing the same record
/// twice, which happens when catch-up and live delivery overlap.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies one committed record.
    async fn handle(&self, record: &EventRecord) -> Result<()>;

    /// Checkpoint used to resume catch-up.
    async fn position(&self) -> ProjectionPosition;

    /// Forgets all projected state.
    async fn reset(&self) -> Result<()>;
}
