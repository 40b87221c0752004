//! Value objects for the order domain.

use common::SeatTypeId;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

/// A requested `(seat type, quantity)` line as submitted by a registrant.
///
/// The quantity is signed so malformed requests can be represented and
/// rejected instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatQuantity {
    pub seat_type_id: SeatTypeId,
    pub quantity: i32,
}

impl SeatQuantity {
    pub fn new(seat_type_id: SeatTypeId, quantity: i32) -> Self {
        Self {
            seat_type_id,
            quantity,
        }
    }
}

/// A validated seat line owned by an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSeat {
    pub seat_type_id: SeatTypeId,
    pub quantity: u32,
}

impl OrderSeat {
    /// Validates a requested line. Returns None when the quantity is not positive.
    pub fn try_from_request(request: SeatQuantity) -> Option<Self> {
        let quantity = u32::try_from(request.quantity).ok().filter(|q| *q > 0)?;
        Some(Self {
            seat_type_id: request.seat_type_id,
            quantity,
        })
    }
}

impl From<OrderSeat> for SeatQuantity {
    fn from(seat: OrderSeat) -> Self {
        // Order seats are bounded by the i32 they were validated from.
        SeatQuantity::new(seat.seat_type_id, seat.quantity as i32)
    }
}

/// Opaque token that lets a registrant find their order again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessCode(String);

impl AccessCode {
    /// Length of generated codes.
    pub const LENGTH: usize = 6;

    /// Generates a fresh random code.
    pub fn generate() -> Self {
        let code = Alphanumeric.sample_string(&mut rand::rng(), Self::LENGTH);
        Self(code.to_ascii_uppercase())
    }

    /// Wraps an existing code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Contact details of the person attending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrant {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Registrant {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Returns true if an email has been recorded.
    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_seat_accepts_positive_quantity() {
        let seat_type_id = SeatTypeId::new();
        let seat = OrderSeat::try_from_request(SeatQuantity::new(seat_type_id, 10)).unwrap();
        assert_eq!(seat.seat_type_id, seat_type_id);
        assert_eq!(seat.quantity, 10);
    }

    #[test]
    fn order_seat_rejects_zero_and_negative() {
        let seat_type_id = SeatTypeId::new();
        assert!(OrderSeat::try_from_request(SeatQuantity::new(seat_type_id, 0)).is_none());
        assert!(OrderSeat::try_from_request(SeatQuantity::new(seat_type_id, -3)).is_none());
    }

    #[test]
    fn order_seat_converts_back_to_request() {
        let seat_type_id = SeatTypeId::new();
        let request = SeatQuantity::new(seat_type_id, 4);
        let seat = OrderSeat::try_from_request(request).unwrap();
        assert_eq!(SeatQuantity::from(seat), request);
    }

    #[test]
    fn generated_access_codes_are_uppercase_alphanumeric() {
        let code = AccessCode::generate();
        assert_eq!(code.as_str().len(), AccessCode::LENGTH);
        assert!(
            code.as_str()
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn registrant_email_presence() {
        assert!(!Registrant::default().has_email());
        assert!(!Registrant::new("  ", "First", "Last").has_email());
        assert!(Registrant::new("info@contoso.com", "First", "Last").has_email());
    }
}
