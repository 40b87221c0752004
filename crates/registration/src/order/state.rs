//! Order state machine.

use serde::{Deserialize, Serialize};

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Booked ──► Paid
///    │          │
///    └──────────┴──► Rejected
/// ```
///
/// `Booked ──► Rejected` is the expiry path for orders left unpaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Seats requested, reservation outcome pending.
    #[default]
    Created,

    /// Seats held for the order and an access code issued.
    Booked,

    /// Payment confirmed (terminal state).
    Paid,

    /// Seats unavailable or booking expired (terminal state).
    Rejected,
}

impl OrderState {
    /// Returns true if a seat reservation outcome can still be applied.
    pub fn awaits_reservation(&self) -> bool {
        matches!(self, OrderState::Created)
    }

    /// Returns true if the order can be paid in this state.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderState::Booked)
    }

    /// Returns true if the order can expire in this state.
    pub fn can_expire(&self) -> bool {
        matches!(self, OrderState::Booked)
    }

    /// Returns true if the order holds an access code in this state.
    pub fn has_access_code(&self) -> bool {
        matches!(self, OrderState::Booked | OrderState::Paid)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Paid | OrderState::Rejected)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "Created",
            OrderState::Booked => "Booked",
            OrderState::Paid => "Paid",
            OrderState::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
