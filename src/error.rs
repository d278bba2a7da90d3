//! Crate-level error type.

use thiserror::Error;

use crate::cart::CartError;
use crate::config::ConfigError;
use crate::location::LocationError;
use crate::model::OrderId;
use crate::notification::NotificationError;
use crate::order::{OrderError, OrderStatus};
use crate::store::StoreError;

/// Top-level error returned by [`Session`](crate::Session) operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cart: {0}")]
    Cart(#[from] CartError),

    #[error("order: {0}")]
    Order(#[from] OrderError),

    #[error("location: {0}")]
    Location(#[from] LocationError),

    #[error("notification: {0}")]
    Notification(#[from] NotificationError),

    #[error("storage: {0}")]
    Store(#[from] StoreError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("no delivery address selected")]
    MissingDeliveryAddress,

    #[error("no current order")]
    NoCurrentOrder,

    #[error("order {0} is already {1}")]
    OrderFinished(OrderId, OrderStatus),
}
