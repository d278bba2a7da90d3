use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::OrderStatus;
use crate::Amount;
use crate::cart::{CartItem, Fees};
use crate::location::DeliveryAddress;
use crate::model::{OrderId, Vendor};

/// Price breakdown frozen at order time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: Amount,
    #[serde(flatten)]
    pub fees: Fees,
}

impl Pricing {
    pub fn total(&self) -> Amount {
        self.subtotal + self.fees.total()
    }
}

/// A placed order. Items, vendor and address are copies, never shared with
/// the live cart or address book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub items: Vec<CartItem>,
    pub vendor: Vendor,
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    #[serde(flatten)]
    pub pricing: Pricing,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub estimated_delivery_time: Timestamp,
}

impl Order {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn total(&self) -> Amount {
        self.pricing.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_total_adds_fees() {
        let pricing = Pricing {
            subtotal: Amount::from_float(23.47),
            fees: Fees {
                delivery_fee: Amount::from_float(2.99),
                service_fee: Amount::from_float(1.0),
                tax: Amount::from_float(0.51),
            },
        };
        assert_eq!(pricing.total(), Amount::from_float(27.97));
    }

    #[test]
    fn pricing_is_flat_in_storage() {
        let json = serde_json::to_value(Pricing {
            subtotal: Amount::from_float(10.0),
            fees: Fees::default(),
        })
        .unwrap();
        assert_eq!(json["subtotal"], 10.0);
        assert_eq!(json["deliveryFee"], 0.0);
        assert!(json.get("fees").is_none());
    }
}
