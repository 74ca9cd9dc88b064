use super::RequestStore;
use crate::{Error, NewKey, NewRequest, ProvisionedKey, ProvisioningRequest, RequestStatus, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

/// An in-process [`RequestStore`] backed by hash maps behind a single
/// [`RwLock`].
///
/// Ids are assigned from per-table counters starting at 1. Requests are
/// stored without keys; keys are kept per owning request in insertion order
/// and attached on read.
#[derive(Default, Debug)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default, Debug)]
struct Tables {
    last_request_id: u64,
    last_key_id: u64,
    requests: HashMap<u64, ProvisioningRequest>,
    by_public_id: HashMap<String, u64>,
    keys: HashMap<u64, Vec<ProvisionedKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored requests.
    pub fn request_count(&self) -> usize {
        self.inner.read().requests.len()
    }

    /// Number of stored keys across all requests.
    pub fn key_count(&self) -> usize {
        self.inner.read().keys.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        let mut tables = self.inner.write();

        if tables.by_public_id.contains_key(&request.public_id) {
            return Err(Error::persistence(format!(
                "duplicate public id {}",
                request.public_id
            )));
        }

        tables.last_request_id += 1;
        let id = tables.last_request_id;
        let now = SystemTime::now();
        let record = ProvisioningRequest {
            id,
            public_id: request.public_id,
            requested_count: request.requested_count,
            fee_recipient: request.fee_recipient,
            status: RequestStatus::Started,
            keys: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        tables.by_public_id.insert(record.public_id.clone(), id);
        tables.requests.insert(id, record.clone());
        Ok(record)
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        let mut tables = self.inner.write();
        let stored = tables
            .requests
            .get_mut(&request.id)
            .ok_or_else(|| Error::persistence(format!("request {} does not exist", request.id)))?;

        stored.status = request.status;
        stored.updated_at = SystemTime::now();
        Ok(())
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        let mut tables = self.inner.write();

        if !tables.requests.contains_key(&key.request_id) {
            return Err(Error::persistence(format!(
                "key references missing request {}",
                key.request_id
            )));
        }

        tables.last_key_id += 1;
        let record = ProvisionedKey {
            id: tables.last_key_id,
            request_id: key.request_id,
            value: key.value,
            fee_recipient: key.fee_recipient,
            created_at: SystemTime::now(),
        };

        tables
            .keys
            .entry(key.request_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        let tables = self.inner.read();
        let Some(id) = tables.by_public_id.get(public_id) else {
            return Ok(None);
        };

        Ok(tables.requests.get(id).map(|request| {
            let mut request = request.clone();
            request.keys = tables.keys.get(id).cloned().unwrap_or_default();
            request
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
