use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::model::AddressId;

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub label: String,
    /// Street line, shown to the courier.
    pub address: String,
    pub city: String,
    pub zip_code: String,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: Timestamp,
}

/// Input for a new saved address; id, timestamp and default flag are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewAddress {
    pub label: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

impl NewAddress {
    pub fn new(
        label: impl Into<String>,
        address: impl Into<String>,
        city: impl Into<String>,
        zip_code: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            address: address.into(),
            city: city.into(),
            zip_code: zip_code.into(),
        }
    }
}

/// Partial update of a saved address. The default flag is only changed
/// through `set_default_address`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddressPatch {
    pub label: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip_code: Option<String>,
}

impl AddressPatch {
    pub(super) fn apply(self, target: &mut Address) {
        if let Some(label) = self.label {
            target.label = label;
        }
        if let Some(address) = self.address {
            target.address = address;
        }
        if let Some(city) = self.city {
            target.city = city;
        }
        if let Some(zip_code) = self.zip_code {
            target.zip_code = zip_code;
        }
    }
}

/// Where the next order goes: a saved address or free text.
///
/// Stored under `deliveryAddress` as either a JSON object or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryAddress {
    Saved(Address),
    Text(String),
}

impl DeliveryAddress {
    /// The street line handed to the courier.
    pub fn text(&self) -> &str {
        match self {
            DeliveryAddress::Saved(address) => &address.address,
            DeliveryAddress::Text(text) => text,
        }
    }
}

impl From<Address> for DeliveryAddress {
    fn from(address: Address) -> Self {
        DeliveryAddress::Saved(address)
    }
}

impl From<&str> for DeliveryAddress {
    fn from(text: &str) -> Self {
        DeliveryAddress::Text(text.to_string())
    }
}
