use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::Amount;
use crate::model::{Options, ProductId, Vendor, VendorId};

/// One line of the cart: a product variant and how many of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub quantity: u32,
    #[serde(default)]
    pub options: Options,
    pub added_at: Timestamp,
}

impl CartItem {
    pub fn line_total(&self) -> Amount {
        self.unit_price * self.quantity
    }

    /// Line identity: same product with the same options.
    pub fn matches(&self, product_id: &str, options: &Options) -> bool {
        self.product_id == product_id && &self.options == options
    }
}

/// Fees charged on top of the item subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fees {
    #[serde(default)]
    pub delivery_fee: Amount,
    #[serde(default)]
    pub service_fee: Amount,
    #[serde(default)]
    pub tax: Amount,
}

impl Fees {
    pub fn total(&self) -> Amount {
        self.delivery_fee + self.service_fee + self.tax
    }
}

/// Persisted form of the cart, stored under `cartData`.
///
/// Also the immutable value handed to order creation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub selected_vendor: Option<Vendor>,
    #[serde(flatten)]
    pub fees: Fees,
}

impl CartSnapshot {
    pub fn subtotal(&self) -> Amount {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn total(&self) -> Amount {
        self.subtotal() + self.fees.total()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: f64, quantity: u32) -> CartItem {
        CartItem {
            product_id: "p1".into(),
            name: "Margherita".into(),
            unit_price: Amount::from_float(price),
            vendor_id: "v1".into(),
            vendor_name: "Pizza Palace".into(),
            quantity,
            options: Options::new(),
            added_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn line_total_multiplies_quantity() {
        assert_eq!(item(4.5, 3).line_total(), Amount::from_float(13.5));
    }

    #[test]
    fn fees_default_to_zero() {
        let fees = Fees::default();
        assert_eq!(fees.total(), Amount::ZERO);
    }

    #[test]
    fn snapshot_uses_storage_field_names() {
        let snapshot = CartSnapshot {
            items: vec![item(10.0, 2)],
            selected_vendor: Some(Vendor {
                id: "v1".into(),
                name: "Pizza Palace".into(),
            }),
            fees: Fees {
                delivery_fee: Amount::from_float(2.99),
                ..Fees::default()
            },
        };

        let json: serde_json::Value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["selectedVendor"]["id"], "v1");
        assert_eq!(json["deliveryFee"], 2.99);
        assert_eq!(json["serviceFee"], 0.0);
        assert_eq!(json["items"][0]["unitPrice"], 10.0);
        assert_eq!(json["items"][0]["productId"], "p1");
    }

    #[test]
    fn snapshot_tolerates_missing_fields() {
        let snapshot: CartSnapshot = serde_json::from_str(r#"{"items":[]}"#).unwrap();
        assert_eq!(snapshot, CartSnapshot::default());
    }
}
