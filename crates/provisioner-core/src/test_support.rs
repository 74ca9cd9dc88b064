//! Test doubles for the generator and store seams.

use crate::{
    Error, KeyGenerator, MemoryStore, NewKey, NewRequest, ProvisionedKey, ProvisioningRequest,
    RequestStore, Result,
};
use async_trait::async_trait;
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

/// Generates `k` repeated, except for the `fail_on`-th call (1-based).
pub struct FlakyGenerator {
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyGenerator {
    pub fn failing_on(fail_on: usize) -> Self {
        Self {
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeyGenerator for FlakyGenerator {
    fn generate(&self, length: usize) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(Error::Generation {
                reason: format!("injected failure on call {call}"),
            });
        }
        Ok("k".repeat(length))
    }
}

pub struct PanickingGenerator;

impl KeyGenerator for PanickingGenerator {
    fn generate(&self, _length: usize) -> Result<String> {
        panic!("generator exploded");
    }
}

/// Counts overlapping `update_request` calls, each taking `delay`.
pub struct SlowUpdateStore {
    inner: MemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowUpdateStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak_overlap(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestStore for SlowUpdateStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = self.inner.update_request(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        self.inner.create_key(key).await
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Rejects every `update_request`.
#[derive(Default)]
pub struct UpdateFailingStore {
    inner: MemoryStore,
}

#[async_trait]
impl RequestStore for UpdateFailingStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, _request: &ProvisioningRequest) -> Result<()> {
        Err(Error::Persistence {
            context: "injected update failure".to_string(),
        })
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        self.inner.create_key(key).await
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Accepts `accept` key inserts, then rejects every further one. Can also be
/// made unreachable.
pub struct KeyFailingStore {
    inner: MemoryStore,
    accept: usize,
    written: AtomicUsize,
    reachable: bool,
}

impl KeyFailingStore {
    pub fn accepting(accept: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            accept,
            written: AtomicUsize::new(0),
            reachable: true,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::accepting(usize::MAX)
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl RequestStore for KeyFailingStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        if !self.reachable {
            return Err(Error::Persistence {
                context: "connection refused".to_string(),
            });
        }
        self.inner.create_request(request).await
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        self.inner.update_request(request).await
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        if self.written.fetch_add(1, Ordering::SeqCst) >= self.accept {
            return Err(Error::Persistence {
                context: "injected key failure".to_string(),
            });
        }
        self.inner.create_key(key).await
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(Error::Persistence {
                context: "connection refused".to_string(),
            })
        }
    }
}

/// Sleeps `delay` before every `create_key`.
pub struct SlowKeyStore {
    inner: MemoryStore,
    delay: Duration,
}

impl SlowKeyStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            delay,
        }
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl RequestStore for SlowKeyStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        self.inner.update_request(request).await
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_key(key).await
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Panics inside `create_key`, on the round task itself.
#[derive(Default)]
pub struct PanickingKeyStore {
    inner: MemoryStore,
}

#[async_trait]
impl RequestStore for PanickingKeyStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        self.inner.create_request(request).await
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        self.inner.update_request(request).await
    }

    async fn create_key(&self, _key: NewKey) -> Result<ProvisionedKey> {
        panic!("key insert exploded");
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Holds `create_request` open until [`GatedStore::release`] is called.
#[derive(Default)]
pub struct GatedStore {
    inner: MemoryStore,
    entered: Notify,
    gate: Notify,
    public_ids: Mutex<Vec<String>>,
}

impl GatedStore {
    /// Resolves once a `create_request` call is waiting on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    /// Public ids of every request that passed the gate.
    pub fn public_ids(&self) -> Vec<String> {
        self.public_ids.lock().clone()
    }
}

#[async_trait]
impl RequestStore for GatedStore {
    async fn create_request(&self, request: NewRequest) -> Result<ProvisioningRequest> {
        self.entered.notify_one();
        self.gate.notified().await;
        self.public_ids.lock().push(request.public_id.clone());
        self.inner.create_request(request).await
    }

    async fn update_request(&self, request: &ProvisioningRequest) -> Result<()> {
        self.inner.update_request(request).await
    }

    async fn create_key(&self, key: NewKey) -> Result<ProvisionedKey> {
        self.inner.create_key(key).await
    }

    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<ProvisioningRequest>> {
        self.inner.find_by_public_id(public_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}

/// Polls `store` until the request is terminal. Panics after five seconds.
pub async fn wait_for_terminal(store: &dyn RequestStore, public_id: &str) -> ProvisioningRequest {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let request = store
            .find_by_public_id(public_id)
            .await
            .unwrap()
            .expect("request should exist");
        if request.status.is_terminal() {
            return request;
        }
        assert!(
            Instant::now() < deadline,
            "request {public_id} still {} after 5s",
            request.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
