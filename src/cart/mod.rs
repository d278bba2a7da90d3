//! Shopping cart state machine.
//!
//! The cart holds line items for a single vendor. Every mutation updates the
//! in-memory state synchronously and queues the full snapshot for storage.

use jiff::Timestamp;
use tracing::{info, warn};

use crate::Amount;
use crate::model::{Options, Product, Vendor};
use crate::store::{self, KeyValueStore, Persister, StoreError, keys};

mod error;
pub use error::CartError;

/// Largest quantity a single cart line can hold.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Largest accepted unit price or fee.
pub const MAX_AMOUNT: Amount = Amount::from_cents(10_000_000);

mod state;
pub use state::{CartItem, CartSnapshot, Fees};

/// The cart state machine.
///
/// Invariants: all items share one vendor, and `vendor` is set iff there is
/// at least one item.
#[derive(Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    vendor: Option<Vendor>,
    fees: Fees,
    persister: Persister,
    /// Set by the first mutation; a late storage load must not clobber it.
    mutated: bool,
}

/// Public API
impl Cart {
    pub fn new(persister: Persister) -> Self {
        Self {
            items: Vec::new(),
            vendor: None,
            fees: Fees::default(),
            persister,
            mutated: false,
        }
    }

    /// Load the last persisted cart, unless the cart already changed.
    ///
    /// Returns whether the stored snapshot was applied.
    pub async fn init(&mut self, store: &dyn KeyValueStore) -> Result<bool, StoreError> {
        match store::load::<CartSnapshot>(store, keys::CART).await? {
            Some(snapshot) => Ok(self.restore(snapshot)),
            None => Ok(false),
        }
    }

    /// Seed the cart from a stored snapshot if nothing mutated it since start.
    pub fn restore(&mut self, snapshot: CartSnapshot) -> bool {
        if self.mutated {
            info!("cart changed before stored snapshot loaded, keeping live state");
            return false;
        }

        let CartSnapshot {
            mut items,
            selected_vendor,
            fees,
        } = snapshot;
        let loaded = items.len();
        items.retain(|item| {
            item.quantity > 0 && !item.unit_price.is_negative() && item.unit_price <= MAX_AMOUNT
        });
        // a cart only ever holds one vendor's items
        if let Some(vendor_id) = items.first().map(|item| item.vendor_id.clone()) {
            items.retain(|item| item.vendor_id == vendor_id);
        }
        for item in &mut items {
            item.quantity = item.quantity.min(MAX_LINE_QUANTITY);
        }
        if items.len() < loaded {
            warn!(dropped = loaded - items.len(), "invalid cart lines dropped on restore");
        }

        // re-derive the vendor rather than trusting the stored field
        self.vendor = match items.first() {
            Some(first) => selected_vendor
                .filter(|vendor| vendor.id == first.vendor_id)
                .or_else(|| {
                    Some(Vendor {
                        id: first.vendor_id.clone(),
                        name: first.vendor_name.clone(),
                    })
                }),
            None => None,
        };
        self.items = items;
        self.fees = fees;

        info!(items = self.items.len(), "cart restored");
        true
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn vendor(&self) -> Option<&Vendor> {
        self.vendor.as_ref()
    }

    pub fn fees(&self) -> Fees {
        self.fees
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of a product variant.
    ///
    /// Merges into an existing line with the same product and options,
    /// otherwise appends a new line.
    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: u32,
        options: Options,
    ) -> Result<(), CartError> {
        let result = self.apply_add(product, quantity, options);
        Self::log_result("add item", &product.id, &result);
        result?;
        self.touch();
        Ok(())
    }

    /// Drop the line for this product variant. Unknown lines are ignored.
    pub fn remove_item(&mut self, product_id: &str, options: &Options) {
        let before = self.items.len();
        self.items.retain(|item| !item.matches(product_id, options));
        if self.items.is_empty() {
            self.vendor = None;
        }
        info!(
            product = product_id,
            removed = before - self.items.len(),
            "remove item applied"
        );
        self.touch();
    }

    /// Set the quantity of a line; zero or less removes it. Quantities above
    /// [`MAX_LINE_QUANTITY`] are capped. Unknown lines are ignored.
    pub fn update_quantity(&mut self, product_id: &str, options: &Options, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(product_id, options);
            return;
        }

        let quantity = u32::try_from(quantity)
            .unwrap_or(u32::MAX)
            .min(MAX_LINE_QUANTITY);
        let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.matches(product_id, options))
        else {
            info!(product = product_id, reason = "not in cart", "update quantity skipped");
            return;
        };

        item.quantity = quantity;
        info!(product = product_id, quantity, "update quantity applied");
        self.touch();
    }

    /// Empty the cart and erase its stored snapshot.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.vendor = None;
        self.fees = Fees::default();
        self.mutated = true;
        self.persister.remove(&[keys::CART]);
        info!("cart cleared");
    }

    /// Overwrite all three fees; a missing value resets that fee to zero.
    pub fn update_fees(
        &mut self,
        delivery_fee: Option<Amount>,
        service_fee: Option<Amount>,
        tax: Option<Amount>,
    ) -> Result<(), CartError> {
        let fees = Fees {
            delivery_fee: delivery_fee.unwrap_or_default(),
            service_fee: service_fee.unwrap_or_default(),
            tax: tax.unwrap_or_default(),
        };

        for (field, amount) in [
            ("delivery fee", fees.delivery_fee),
            ("service fee", fees.service_fee),
            ("tax", fees.tax),
        ] {
            if amount.is_negative() {
                return Err(CartError::NegativeAmount { field, amount });
            }
            if amount > MAX_AMOUNT {
                return Err(CartError::AmountTooLarge { field, amount });
            }
        }

        self.fees = fees;
        info!(total_fees = %fees.total(), "fees updated");
        self.touch();
        Ok(())
    }

    /// Sum of line totals, without fees.
    pub fn subtotal(&self) -> Amount {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Subtotal plus delivery fee, service fee and tax.
    pub fn total(&self) -> Amount {
        self.subtotal() + self.fees.total()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn contains(&self, product_id: &str, options: &Options) -> bool {
        self.items
            .iter()
            .any(|item| item.matches(product_id, options))
    }

    /// Quantity of this variant in the cart, zero if absent.
    pub fn quantity_of(&self, product_id: &str, options: &Options) -> u32 {
        self.items
            .iter()
            .find(|item| item.matches(product_id, options))
            .map_or(0, |item| item.quantity)
    }

    /// Deep copy of the current state, as persisted.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            items: self.items.clone(),
            selected_vendor: self.vendor.clone(),
            fees: self.fees,
        }
    }
}

/// Private API
impl Cart {
    fn log_result(op: &str, product: &str, result: &Result<(), CartError>) {
        match result {
            Ok(()) => info!(product, "{op} applied"),
            Err(e) => info!(product, reason = %e, "{op} skipped"),
        }
    }

    /// Validate and apply an add:
    /// - Quantity is within 1..=MAX_LINE_QUANTITY, also after merging
    /// - The price is within 0..=MAX_AMOUNT
    /// - The product's vendor matches the cart vendor, if any
    /// - Merge into a matching line or append a new one
    fn apply_add(
        &mut self,
        product: &Product,
        quantity: u32,
        options: Options,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::QuantityTooLarge(u64::from(quantity)));
        }

        if product.price.is_negative() {
            return Err(CartError::NegativeAmount {
                field: "unit price",
                amount: product.price,
            });
        }
        if product.price > MAX_AMOUNT {
            return Err(CartError::AmountTooLarge {
                field: "unit price",
                amount: product.price,
            });
        }

        if let Some(vendor) = &self.vendor
            && vendor.id != product.vendor_id
        {
            return Err(CartError::VendorConflict {
                cart_vendor: vendor.id.clone(),
                product_vendor: product.vendor_id.clone(),
            });
        }

        match self
            .items
            .iter_mut()
            .find(|item| item.matches(&product.id, &options))
        {
            Some(item) => {
                let merged = item.quantity + quantity;
                if merged > MAX_LINE_QUANTITY {
                    return Err(CartError::QuantityTooLarge(u64::from(merged)));
                }
                item.quantity = merged;
            }
            None => self.items.push(CartItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                vendor_id: product.vendor_id.clone(),
                vendor_name: product.vendor_name.clone(),
                quantity,
                options,
                added_at: Timestamp::now(),
            }),
        }

        if self.vendor.is_none() {
            self.vendor = Some(Vendor {
                id: product.vendor_id.clone(),
                name: product.vendor_name.clone(),
            });
        }

        Ok(())
    }

    /// Mark the cart as changed and queue its snapshot.
    fn touch(&mut self) {
        self.mutated = true;
        self.persister.save(keys::CART, &self.snapshot());
    }
}
