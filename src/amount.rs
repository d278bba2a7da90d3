use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fixed-point money value with 4 decimal places, stored as a scaled integer.
///
/// Persisted as a plain JSON number so snapshots stay readable by other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 10_000;

    pub const ZERO: Amount = Amount(0);

    /// Saturating conversion; `NaN` becomes zero. Use [`Amount::try_from_float`]
    /// for untrusted input.
    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    /// `None` for non-finite values and values outside the representable range.
    pub fn try_from_float(value: f64) -> Option<Self> {
        let scaled = (value * Self::SCALE as f64).round();
        // i64::MAX as f64 rounds up to 2^63, which is already out of range
        (scaled.is_finite() && scaled.abs() < i64::MAX as f64).then(|| Amount(scaled as i64))
    }

    pub const fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    /// Whole cents, e.g. `Amount::from_cents(2797)` is 27.97.
    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents * (Self::SCALE / 100))
    }

    pub fn to_float(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Amount)
    }
}

impl fmt::Display for Amount {
    /// Rounded to cents, half away from zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let per_cent = Self::SCALE / 100;
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = (self.0.abs() + per_cent / 2) / per_cent;
        write!(f, "{sign}{}.{:02}", cents / 100, cents % 100)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    /// Saturates at the representable bounds.
    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Mul<u32> for Amount {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self::Output {
        Amount(self.0.saturating_mul(i64::from(quantity)))
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_float())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::try_from_float(value)
            .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(10.0), Amount::from_scaled(100_000));
        assert_eq!(Amount::from_float(1.5), Amount::from_scaled(15_000));
        assert_eq!(Amount::from_float(0.0001), Amount::from_scaled(1));
    }

    #[test]
    fn from_float_rounds_correctly() {
        assert_eq!(Amount::from_float(1.23456), Amount::from_scaled(12346));
        assert_eq!(Amount::from_float(1.23454), Amount::from_scaled(12345));
    }

    #[test]
    fn from_cents_matches_float() {
        assert_eq!(Amount::from_cents(2797), Amount::from_float(27.97));
        assert_eq!(Amount::from_cents(-50), Amount::from_float(-0.5));
    }

    #[test]
    fn display_rounds_to_cents() {
        assert_eq!(Amount::from_float(27.97).to_string(), "27.97");
        assert_eq!(Amount::from_float(20.0).to_string(), "20.00");
        assert_eq!(Amount::from_scaled(12_350).to_string(), "1.24");
        assert_eq!(Amount::from_scaled(12_349).to_string(), "1.23");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_float(-50.25).to_string(), "-50.25");
    }

    #[test]
    fn multiply_by_quantity() {
        assert_eq!(Amount::from_float(9.99) * 3, Amount::from_float(29.97));
        assert_eq!(Amount::from_float(9.99) * 0, Amount::ZERO);
    }

    #[test]
    fn try_from_float_rejects_unrepresentable() {
        assert_eq!(Amount::try_from_float(12.5), Some(Amount::from_scaled(125_000)));
        assert_eq!(Amount::try_from_float(-0.5), Some(Amount::from_cents(-50)));
        assert_eq!(Amount::try_from_float(f64::NAN), None);
        assert_eq!(Amount::try_from_float(f64::INFINITY), None);
        assert_eq!(Amount::try_from_float(f64::NEG_INFINITY), None);
        assert_eq!(Amount::try_from_float(1e300), None);
    }

    #[test]
    fn arithmetic_saturates_instead_of_overflowing() {
        let huge = Amount::from_scaled(i64::MAX / 2);
        assert_eq!(huge * 3, Amount::from_scaled(i64::MAX));
        assert_eq!(huge + huge + huge, Amount::from_scaled(i64::MAX));
        assert_eq!(huge.checked_mul(3), None);
        assert_eq!(huge.checked_add(huge), Some(Amount::from_scaled(i64::MAX / 2 * 2)));
        assert_eq!(Amount::from_cents(100).checked_mul(3), Some(Amount::from_cents(300)));
    }

    #[test]
    fn rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Amount>("1e300").is_err());
    }

    #[test]
    fn sum_of_amounts() {
        let total: Amount = [1.0, 2.5, 0.25].into_iter().map(Amount::from_float).sum();
        assert_eq!(total, Amount::from_float(3.75));
    }

    #[test]
    fn negative_detection() {
        assert!(Amount::from_float(-0.01).is_negative());
        assert!(!Amount::ZERO.is_negative());
    }

    #[test]
    fn serializes_as_json_number() {
        let json = serde_json::to_string(&Amount::from_float(12.5)).unwrap();
        assert_eq!(json, "12.5");

        let back: Amount = serde_json::from_str("7.99").unwrap();
        assert_eq!(back, Amount::from_float(7.99));
    }
}
