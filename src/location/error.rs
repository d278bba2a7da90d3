//! Error types for location and address operations.

use thiserror::Error;

use crate::model::AddressId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location unavailable: {0}")]
    Unavailable(String),

    #[error("location permission denied")]
    PermissionDenied,

    #[error("no coordinates found for address '{0}'")]
    AddressNotGeocoded(String),

    #[error("saved address {0} not found")]
    AddressNotFound(AddressId),
}
