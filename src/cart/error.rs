//! Error types for cart operations.

use thiserror::Error;

use super::{MAX_AMOUNT, MAX_LINE_QUANTITY};
use crate::Amount;
use crate::model::VendorId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart holds items from vendor {cart_vendor}, not {product_vendor}; clear it first")]
    VendorConflict {
        cart_vendor: VendorId,
        product_vendor: VendorId,
    },

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("quantity {0} exceeds the per-line limit of {max}", max = MAX_LINE_QUANTITY)]
    QuantityTooLarge(u64),

    #[error("{field} cannot be negative (got {amount})")]
    NegativeAmount { field: &'static str, amount: Amount },

    #[error("{field} {amount} exceeds the limit of {max}", max = MAX_AMOUNT)]
    AmountTooLarge { field: &'static str, amount: Amount },
}
