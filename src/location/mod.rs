//! Delivery location and saved address book.
//!
//! Holds the device's last position, the address the next order goes to and
//! the user's saved addresses, at most one of which is the default.

use jiff::Timestamp;
use tracing::info;

use crate::model::{AddressId, Coordinates, IdGenerator};
use crate::store::{self, KeyValueStore, Persister, StoreError, keys};

mod address;
pub use address::{Address, AddressPatch, DeliveryAddress, NewAddress};

mod error;
pub use error::LocationError;

mod provider;
pub use provider::{CurrentLocation, LocationProvider, PermissionStatus, calculate_distance};

#[derive(Debug)]
pub struct AddressBook {
    current_location: Option<CurrentLocation>,
    delivery_address: Option<DeliveryAddress>,
    saved: Vec<Address>,
    permission: Option<PermissionStatus>,
    ids: IdGenerator,
    persister: Persister,
    saved_mutated: bool,
    delivery_mutated: bool,
}

/// Public API
impl AddressBook {
    pub fn new(persister: Persister) -> Self {
        Self {
            current_location: None,
            delivery_address: None,
            saved: Vec::new(),
            permission: None,
            ids: IdGenerator::new(),
            persister,
            saved_mutated: false,
            delivery_mutated: false,
        }
    }

    /// Load saved addresses and the delivery address from storage.
    ///
    /// Each part is only seeded if it was not changed since start.
    pub async fn init(&mut self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        let saved = store::load::<Vec<Address>>(store, keys::SAVED_ADDRESSES).await?;
        let delivery = store::load::<DeliveryAddress>(store, keys::DELIVERY_ADDRESS).await?;
        self.restore(saved, delivery);
        Ok(())
    }

    pub fn restore(&mut self, saved: Option<Vec<Address>>, delivery: Option<DeliveryAddress>) {
        if let Some(saved) = saved {
            // ids must stay unique even for addresses changed elsewhere
            for address in &saved {
                self.ids.observe(address.id);
            }
            if !self.saved_mutated {
                info!(addresses = saved.len(), "saved addresses restored");
                self.saved = saved;
            }
        }
        if let Some(delivery) = delivery
            && !self.delivery_mutated
        {
            self.delivery_address = Some(delivery);
        }
    }

    pub fn saved_addresses(&self) -> &[Address] {
        &self.saved
    }

    pub fn default_address(&self) -> Option<&Address> {
        self.saved.iter().find(|address| address.is_default)
    }

    pub fn delivery_address(&self) -> Option<&DeliveryAddress> {
        self.delivery_address.as_ref()
    }

    pub fn current_location(&self) -> Option<&CurrentLocation> {
        self.current_location.as_ref()
    }

    pub fn permission(&self) -> Option<PermissionStatus> {
        self.permission
    }

    /// Replace the address used at checkout.
    pub fn set_delivery_address(&mut self, address: impl Into<DeliveryAddress>) {
        let address = address.into();
        info!(address = address.text(), "delivery address set");
        self.delivery_address = Some(address);
        self.delivery_mutated = true;
        self.persist_delivery();
    }

    pub fn add_saved_address(&mut self, data: NewAddress) -> Address {
        let address = Address {
            id: self.ids.next_id(),
            label: data.label,
            address: data.address,
            city: data.city,
            zip_code: data.zip_code,
            is_default: false,
            created_at: Timestamp::now(),
        };
        info!(id = address.id, label = %address.label, "saved address added");
        self.saved.push(address.clone());
        self.touch_saved();
        address
    }

    pub fn update_saved_address(
        &mut self,
        id: AddressId,
        patch: AddressPatch,
    ) -> Result<&Address, LocationError> {
        let index = self
            .saved
            .iter()
            .position(|address| address.id == id)
            .ok_or(LocationError::AddressNotFound(id))?;

        patch.apply(&mut self.saved[index]);
        info!(id, "saved address updated");
        self.touch_saved();
        Ok(&self.saved[index])
    }

    /// Make `id` the only default address and deliver there.
    pub fn set_default_address(&mut self, id: AddressId) -> Result<(), LocationError> {
        let Some(chosen) = self.saved.iter().find(|address| address.id == id).cloned() else {
            info!(id, "set default address skipped: not found");
            return Err(LocationError::AddressNotFound(id));
        };

        for address in &mut self.saved {
            address.is_default = address.id == id;
        }
        self.touch_saved();

        info!(id, "default address set");
        self.set_delivery_address(Address {
            is_default: true,
            ..chosen
        });
        Ok(())
    }

    /// Delete a saved address. Removing the default leaves no default.
    pub fn remove_saved_address(&mut self, id: AddressId) {
        let before = self.saved.len();
        self.saved.retain(|address| address.id != id);
        info!(id, removed = before - self.saved.len(), "saved address removed");
        self.touch_saved();
    }

    pub async fn request_permission(
        &mut self,
        provider: &dyn LocationProvider,
    ) -> Result<bool, LocationError> {
        let status = provider.request_permission().await?;
        self.permission = Some(status);
        Ok(status == PermissionStatus::Granted)
    }

    /// Ask the device where it is.
    ///
    /// Requests permission first if needed. On failure the previous location
    /// is kept and the error is reported as unavailable.
    pub async fn get_current_position(
        &mut self,
        provider: &dyn LocationProvider,
    ) -> Result<&CurrentLocation, LocationError> {
        match self.locate(provider).await {
            Ok(location) => {
                info!(
                    latitude = location.coordinates.latitude,
                    longitude = location.coordinates.longitude,
                    "current location updated"
                );
                Ok(self.current_location.insert(location))
            }
            Err(e) => {
                info!(reason = %e, "current location skipped");
                Err(match e {
                    LocationError::Unavailable(reason) => LocationError::Unavailable(reason),
                    other => LocationError::Unavailable(other.to_string()),
                })
            }
        }
    }

    /// Resolve free text to coordinates.
    pub async fn geocode_address(
        &self,
        provider: &dyn LocationProvider,
        text: &str,
    ) -> Result<Coordinates, LocationError> {
        provider
            .geocode(text)
            .await?
            .ok_or_else(|| LocationError::AddressNotGeocoded(text.to_string()))
    }
}

/// Private API
impl AddressBook {
    async fn locate(
        &mut self,
        provider: &dyn LocationProvider,
    ) -> Result<CurrentLocation, LocationError> {
        let status = match self.permission {
            Some(status) => status,
            None => provider.permission_status().await?,
        };
        self.permission = Some(status);

        if status != PermissionStatus::Granted && !self.request_permission(provider).await? {
            return Err(LocationError::PermissionDenied);
        }

        let coordinates = provider.current_position().await?;
        let address = provider.reverse_geocode(coordinates).await?;

        Ok(CurrentLocation {
            coordinates,
            address,
            timestamp: Timestamp::now(),
        })
    }

    fn touch_saved(&mut self) {
        self.saved_mutated = true;
        self.persister.save(keys::SAVED_ADDRESSES, &self.saved);
    }

    fn persist_delivery(&self) {
        if let Some(address) = &self.delivery_address {
            self.persister.save(keys::DELIVERY_ADDRESS, address);
        }
    }
}
