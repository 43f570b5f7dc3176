//! Unit price representation using decimal arithmetic.
//!
//! Prices are always strictly positive and are never stored as floats. A
//! single store-wide currency is assumed; amounts are in the currency's
//! standard unit (dollars, not cents).
//!
//! Bounds match the `NUMERIC(12, 2)` price columns: at most two decimal
//! places and at most [`Price::MAX`]. Every valid price therefore round-trips
//! through `PostgreSQL` unchanged.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::Quantity;

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// Price was zero or negative.
    #[error("price must be greater than zero (got {0})")]
    NotPositive(Decimal),
    /// More decimal places than the currency has.
    #[error("price {0} has more than {max} decimal places", max = Price::MAX_SCALE)]
    TooPrecise(Decimal),
    /// Price is above [`Price::MAX`].
    #[error("price {0} exceeds the maximum of {max}", max = Price::MAX)]
    TooLarge(Decimal),
}

/// A strictly positive unit price.
///
/// ```
/// use cartwright_core::Price;
/// use rust_decimal::Decimal;
///
/// let price = Price::new(Decimal::new(1999, 2)).unwrap();
/// assert_eq!(price.amount(), Decimal::new(1999, 2));
///
/// assert!(Price::new(Decimal::ZERO).is_err());
/// assert!(Price::new(Decimal::new(1, 3)).is_err()); // 0.001
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Decimal places allowed in a price.
    pub const MAX_SCALE: u32 = 2;

    /// Largest accepted price, `9999999999.99`.
    pub const MAX: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

    /// Create a price.
    ///
    /// Trailing zeros beyond two places are accepted (`1.500` is `1.50`).
    ///
    /// # Errors
    ///
    /// Returns `PriceError::NotPositive` if `amount <= 0`,
    /// `PriceError::TooPrecise` if it has fractional cents, and
    /// `PriceError::TooLarge` if it exceeds [`Price::MAX`].
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive(amount));
        }
        if amount.normalize().scale() > Self::MAX_SCALE {
            return Err(PriceError::TooPrecise(amount));
        }
        if amount > Self::MAX {
            return Err(PriceError::TooLarge(amount));
        }
        Ok(Self(amount.round_dp(Self::MAX_SCALE)))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Extended amount for `quantity` units, or `None` on overflow.
    #[must_use]
    pub fn checked_times(&self, quantity: Quantity) -> Option<Decimal> {
        self.0.checked_mul(Decimal::from(quantity.get()))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert_eq!(
            Price::new(Decimal::ZERO),
            Err(PriceError::NotPositive(Decimal::ZERO))
        );
        assert!(Price::new(Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn test_rejects_fractional_cents() {
        let tenth_of_a_cent = Decimal::new(1, 3);
        assert_eq!(
            Price::new(tenth_of_a_cent),
            Err(PriceError::TooPrecise(tenth_of_a_cent))
        );
        assert!(Price::new(Decimal::new(10_005, 3)).is_err());

        // Trailing zeros are not extra precision.
        let price = Price::new(Decimal::new(1_500, 3)).unwrap();
        assert_eq!(price.amount(), Decimal::new(150, 2));
        assert_eq!(price.amount().scale(), 2);
    }

    #[test]
    fn test_upper_bound_matches_column() {
        assert_eq!(Price::MAX, Decimal::new(999_999_999_999, 2));
        assert!(Price::new(Price::MAX).is_ok());

        let over = Price::MAX + Decimal::new(1, 2);
        assert_eq!(Price::new(over), Err(PriceError::TooLarge(over)));
        assert!(Price::new(Decimal::MAX).is_err());
    }

    #[test]
    fn test_checked_times_is_exact() {
        let price = Price::new(Decimal::new(10, 1)).unwrap(); // 1.0
        let three = Quantity::new(3).unwrap();
        assert_eq!(price.checked_times(three), Some(Decimal::new(3, 0)));

        let price = Price::new(Decimal::new(333, 2)).unwrap();
        assert_eq!(price.checked_times(three), Some(Decimal::new(999, 2)));
    }

    #[test]
    fn test_checked_times_at_bounds_does_not_panic() {
        let most = Price::new(Price::MAX).unwrap();
        let extended = most.checked_times(Quantity::new(i64::from(i32::MAX)).unwrap());
        assert!(extended.is_some_and(|total| total > Price::MAX));
    }

    #[test]
    fn test_serializes_as_string() {
        let price = Price::new(Decimal::new(1000, 2)).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "\"10.00\"");
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        assert!(serde_json::from_str::<Price>("\"0.001\"").is_err());
        let price: Price = serde_json::from_str("\"4.50\"").unwrap();
        assert_eq!(price.amount(), Decimal::new(450, 2));
    }

    #[test]
    fn test_display_two_places() {
        let price = Price::new(Decimal::new(5, 0)).unwrap();
        assert_eq!(price.to_string(), "5.00");
    }
}
