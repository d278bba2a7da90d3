//! Core domain types shared by the state machines.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Catalog product identifier.
pub type ProductId = String;

/// Catalog vendor identifier.
pub type VendorId = String;

/// Order identifier.
pub type OrderId = u64;

/// Saved address identifier.
pub type AddressId = u64;

/// Notification identifier.
pub type NotificationId = u64;

/// Variant selection for a product (size, toppings, ...).
///
/// Kept sorted so two option sets compare equal regardless of insertion order.
pub type Options = BTreeMap<String, String>;

/// A catalog product as presented to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    pub vendor_id: VendorId,
    pub vendor_name: String,
}

impl Product {
    pub fn new(
        id: impl Into<ProductId>,
        name: impl Into<String>,
        price: Amount,
        vendor_id: impl Into<VendorId>,
        vendor_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            vendor_id: vendor_id.into(),
            vendor_name: vendor_name.into(),
        }
    }
}

/// The vendor a cart or order is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
}

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Hands out strictly increasing ids derived from the millisecond clock.
///
/// Two ids generated in the same millisecond still differ, and ids seen on
/// reload are never handed out again.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_at(Timestamp::now())
    }

    pub fn next_at(&mut self, now: Timestamp) -> u64 {
        let millis = u64::try_from(now.as_millisecond()).unwrap_or(0);
        self.last = millis.max(self.last + 1);
        self.last
    }

    /// Make sure future ids are greater than `id`.
    pub fn observe(&mut self, id: u64) {
        self.last = self.last.max(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_follow_the_clock() {
        let mut ids = IdGenerator::new();
        let now = Timestamp::from_millisecond(1_700_000_000_000).unwrap();
        assert_eq!(ids.next_at(now), 1_700_000_000_000);
    }

    #[test]
    fn ids_are_unique_within_one_millisecond() {
        let mut ids = IdGenerator::new();
        let now = Timestamp::from_millisecond(1_700_000_000_000).unwrap();
        let first = ids.next_at(now);
        let second = ids.next_at(now);
        assert!(second > first);
    }

    #[test]
    fn observed_ids_are_skipped() {
        let mut ids = IdGenerator::new();
        ids.observe(u64::MAX / 2);
        let now = Timestamp::from_millisecond(1_700_000_000_000).unwrap();
        assert_eq!(ids.next_at(now), u64::MAX / 2 + 1);
    }

    #[test]
    fn options_compare_structurally() {
        let mut a = Options::new();
        a.insert("size".into(), "large".into());
        a.insert("sauce".into(), "bbq".into());

        let mut b = Options::new();
        b.insert("sauce".into(), "bbq".into());
        b.insert("size".into(), "large".into());

        assert_eq!(a, b);
    }
}
