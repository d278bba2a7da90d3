//! Durable key-value storage and the write-behind queue feeding it.
//!
//! Each state machine owns one or two keys and always writes its full
//! snapshot, so a failed write is repaired by the next successful one.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

mod error;
pub use error::StoreError;

mod file;
pub use file::FileStore;

mod memory;
pub use memory::MemoryStore;

mod writer;
pub use writer::Persister;

/// Storage keys, one entry per persisted structure.
pub mod keys {
    pub const CART: &str = "cartData";
    pub const ORDERS: &str = "orders";
    pub const SAVED_ADDRESSES: &str = "savedAddresses";
    pub const DELIVERY_ADDRESS: &str = "deliveryAddress";

    // Profile entries share the store but are not managed by this crate.
    pub const USER_DATA: &str = "userData";
    pub const FAVORITES: &str = "favorites";
    pub const LOYALTY_POINTS: &str = "loyaltyPoints";
    pub const BADGES: &str = "badges";
    pub const PREFERENCES: &str = "preferences";

    /// Every key written by a session, for a full local reset.
    pub const ALL: [&str; 9] = [
        CART,
        ORDERS,
        SAVED_ADDRESSES,
        DELIVERY_ADDRESS,
        USER_DATA,
        FAVORITES,
        LOYALTY_POINTS,
        BADGES,
        PREFERENCES,
    ];
}

/// String-keyed durable storage. No transactions, no atomicity across keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removing a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key).await?;
        }
        Ok(())
    }
}

/// Read and decode the JSON value stored under `key`.
pub async fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &'static str,
) -> Result<Option<T>, StoreError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).map_err(|source| StoreError::Decode { key, source })?;
    Ok(Some(value))
}
