//! Error types for order operations.

use thiserror::Error;

use super::OrderStatus;
use crate::model::OrderId;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("cannot place an order from an empty cart")]
    EmptyCart,

    #[error("failed to compute delivery estimate: {0}")]
    Schedule(#[from] jiff::Error),
}
