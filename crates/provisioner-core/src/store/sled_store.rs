use super::RequestStore;
use crate::{
    Error, NewKey, NewRequest, ProvisionedKey, ProvisioningRequest, RequestStatus, Result,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::Path;
use std::time::SystemTime;

/// A [`RequestStore`] persisted to disk with `sled`.
///
/// Three trees hold the data:
///
/// - `requests`: big-endian request id to a JSON request row
/// - `public_ids`: public id to big-endian request id
/// - `keys`: big-endian request id followed by big-endian key id to a JSON
///   key row
///
/// Key ids grow monotonically, so a prefix scan over a request id returns
/// its keys in insertion order. Ids start at 1.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
    requests: sled::Tree,
    public_ids: sled::Tree,
    keys: sled::Tree,
}

#[derive(Serialize, Deserialize)]
struct RequestRow {
    public_id: String,
    requested_count: u64,
    fee_recipient: String,
    status: RequestStatus,
    created_at: SystemTime,
    updated_at: SystemTime,
}

#[derive(Serialize, Deserialize)]
struct KeyRow {
    value: String,
    fee_recipient: String,
    created_at: SystemTime,
}

impl SledStore {
    /// Opens or creates the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).map_err(storage)?;
        Self::from_db(db)
    }

    /// Opens a database that is deleted when the last handle is dropped.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(storage)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        Ok(Self {
            requests: db.open_tree("requests").map_err(storage)?,
            public_ids: db.open_tree("public_ids").map_err(storage)?,
            keys: db.open_tree("keys").map_err(storage)?,
            db,
        })
    }

    /// Writes all dirty buffers to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(storage)?;
        Ok(())
    }

    fn next_id(&self) -> Result<u64> {
        Ok(self.db.generate_id().map_err(storage)? + 1)
    }

    fn load_request(&self, id: u64) -> Result<Option<RequestRow>> {
        self.requests
            .get(id.to_be_bytes())
            .map_err(storage)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn load_keys(&self, request_id: u64) -> Result<Vec<ProvisionedKey>> {
        self.keys
            .scan_prefix(request_id.to_be_bytes())
            .map(|entry| {
                let (tree_key, bytes) = entry.map_err(storage)?;
                let row: KeyRow = decode(&bytes)?;
                Ok(ProvisionedKey {
                    id: read_id(&tree_key[8..])?,
                    request_id,
                    value: row.value,
                    fee_recipient: row.fee_recipient,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RequestStore for SledStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        let id = self.next_id()?;

        // Claims the public id; a second writer with the same id loses here.
        let claimed = self
            .public_ids
            .compare_and_swap(
                request.public_id.as_bytes(),
                None as Option<&[u8]>,
                Some(&id.to_be_bytes()[..]),
            )
            .map_err(storage)?;
        if claimed.is_err() {
            return Err(Error::persistence(format!(
                "duplicate public id {}",
                request.public_id
            )));
        }

        let now = SystemTime::now();
        let row = RequestRow {
            public_id: request.public_id,
            requested_count: request.requested_count,
            fee_recipient: request.fee_recipient,
            status: RequestStatus::Started,
            created_at: now,
            updated_at: now,
        };
        self.requests
            .insert(id.to_be_bytes(), encode(&row)?)
            .map_err(storage)?;

        Ok(ProvisioningRequest {
            id,
            public_id: row.public_id,
            requested_count: row.requested_count,
            fee_recipient: row.fee_recipient,
            status: row.status,
            keys: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        let mut row = self
            .load_request(request.id)?
            .ok_or_else(|| Error::persistence(format!("request {} does not exist", request.id)))?;

        row.status = request.status;
        row.updated_at = SystemTime::now();
        self.requests
            .insert(request.id.to_be_bytes(), encode(&row)?)
            .map_err(storage)?;
        Ok(())
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        if !self
            .requests
            .contains_key(key.request_id.to_be_bytes())
            .map_err(storage)?
        {
            return Err(Error::persistence(format!(
                "key references missing request {}",
                key.request_id
            )));
        }

        let id = self.next_id()?;
        let row = KeyRow {
            value: key.value,
            fee_recipient: key.fee_recipient,
            created_at: SystemTime::now(),
        };

        let mut tree_key = [0_u8; 16];
        tree_key[..8].copy_from_slice(&key.request_id.to_be_bytes());
        tree_key[8..].copy_from_slice(&id.to_be_bytes());
        self.keys
            .insert(tree_key, encode(&row)?)
            .map_err(storage)?;

        Ok(ProvisionedKey {
            id,
            request_id: key.request_id,
            value: row.value,
            fee_recipient: row.fee_recipient,
            created_at: row.created_at,
        })
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        let Some(id) = self.public_ids.get(public_id.as_bytes()).map_err(storage)? else {
            return Ok(None);
        };
        let id = read_id(&id)?;
        let Some(row) = self.load_request(id)? else {
            return Ok(None);
        };

        Ok(Some(ProvisioningRequest {
            id,
            public_id: row.public_id,
            requested_count: row.requested_count,
            fee_recipient: row.fee_recipient,
            status: row.status,
            keys: self.load_keys(id)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.db.size_on_disk().map_err(storage)?;
        Ok(())
    }
}

fn storage(e: sled::Error) -> Error {
    Error::persistence(format!("sled: {e}"))
}

fn encode<T: Serialize>(row: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(row).map_err(|e| Error::persistence(format!("encode row: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::persistence(format!("decode row: {e}")))
}

fn read_id(bytes: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::persistence(format!("malformed id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(bytes))
}
