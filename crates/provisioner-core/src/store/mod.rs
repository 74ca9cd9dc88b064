//! Persistence adapter for provisioning requests and their keys.
//!
//! The pipeline only talks to storage through [`RequestStore`]. Each call
//! commits on its own: there is no transaction around the key-persist loop,
//! so keys written before a failed insert stay attached to their request.
//!
//! ## Structure
//!
//! - [`memory`] - In-process [`MemoryStore`], the server default and the
//!   base of the test doubles.
//! - [`sled_store`] - On-disk [`SledStore`] for deployments that keep
//!   requests across restarts.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::{NewKey, NewRequest, ProvisionedKey, ProvisioningRequest, Result};
use async_trait::async_trait;

/// Record store holding requests and their child keys.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Inserts a new request in the `started` state and returns it with its
    /// store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Persistence`] if the write fails, including a
    /// duplicate public id.
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest>;

    /// Writes the header fields (status and timestamps) of an existing
    /// request. Keys are not touched.
    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()>;

    /// Inserts one key under its owning request.
    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey>;

    /// Loads a request by public id with its keys attached in insertion
    /// order. Returns `Ok(None)` if no such request exists.
    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;
}
