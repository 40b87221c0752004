//! Registration process error types.

use registration::BusError;
use thiserror::Error;

/// Errors that can occur while the registration process handles a message.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The command bus refused a command.
    #[error("Command bus error: {0}")]
    Bus(#[from] BusError),

    /// The seat inventory request channel is closed.
    #[error("Seat inventory channel closed")]
    InventoryUnavailable,
}

/// Convenience type alias for process results.
pub type Result<T> = std::result::Result<T, ProcessError>;
