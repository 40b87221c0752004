//! Conference reference data.
//!
//! Conferences are owned by the seat inventory side; registration only reads
//! them to describe what an order is for.

use common::{ConferenceId, SeatTypeId};
use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Price of `quantity` seats at this unit price.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents * i64::from(quantity),
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

/// A kind of seat sold for a conference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatType {
    pub id: SeatTypeId,
    pub description: String,
    pub price: Money,
}

impl SeatType {
    pub fn new(id: SeatTypeId, description: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            description: description.into(),
            price,
        }
    }
}

/// A conference and the seat types it offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    pub id: ConferenceId,

    /// Stable human-readable slug.
    pub code: String,

    pub name: String,
    pub seat_types: Vec<SeatType>,
}

impl Conference {
    pub fn new(id: ConferenceId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            name: name.into(),
            seat_types: Vec::new(),
        }
    }

    /// Adds a seat type.
    pub fn with_seat_type(mut self, seat_type: SeatType) -> Self {
        self.seat_types.push(seat_type);
        self
    }

    pub fn seat_type(&self, id: SeatTypeId) -> Option<&SeatType> {
        self.seat_types.iter().find(|s| s.id == id)
    }
}
