//! Validator provisioning service.
//!
//! [`Provisioner`] is the entry point used by the transport layer. It is
//! constructed once at startup, cloned into every handler, and owns every
//! piece of shared state: the store handle, the round coordinator, the
//! status locks and the background dispatcher.
//!
//! ## Request pipeline
//!
//! 1. [`Provisioner::create_request`] validates input, stores a `started`
//!    request and hands the round to the dispatcher.
//! 2. The round spawns one worker per validator and waits for all of them.
//! 3. Any worker error (or a round timeout) marks the request `failed`.
//! 4. Otherwise keys are written one by one. A failed write marks the request
//!    `failed` and leaves the keys already written in place.
//! 5. When every key is written the request is marked `successful`.
//!
//! Errors from steps 2-5 never reach the caller. They are logged
//! and visible only through [`Provisioner::get_status`]. A panic anywhere in
//! steps 2-5 marks the request `failed` as well.

use crate::{
    Coordinator, Error, IN_PROGRESS_MESSAGE, KeyGenerator, LifecycleManager, NewKey, NewRequest,
    ProvisionerConfig, ProvisioningRequest, RandomKeyGenerator, RequestStatus, RequestStore,
    Result, RoundDispatcher, RoundOutcome, RoundSettings, ShutdownReport, TaskLimiter,
    is_hex_address,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use uuid::Uuid;

/// Returned by intake once the request is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub public_id: String,
    pub message: &'static str,
}

/// What a status query reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// Request is `started` or `successful`. Keys are empty while started,
    /// even if some have already been written.
    Active {
        status: RequestStatus,
        keys: Vec<String>,
    },
    /// Request is `failed`. Keys written before the failure are not
    /// reported.
    Failed,
}

#[derive(Clone)]
pub struct Provisioner {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn RequestStore>,
    coordinator: Coordinator,
    lifecycle: LifecycleManager,
    dispatcher: RoundDispatcher,
}

impl Provisioner {
    /// Creates a service generating keys with [`RandomKeyGenerator`].
    pub fn new(config: ProvisionerConfig, store: Arc<dyn RequestStore>) -> Self {
        Self::with_generator(config, store, Arc::new(RandomKeyGenerator))
    }

    pub fn with_generator(
        config: ProvisionerConfig,
        store: Arc<dyn RequestStore>,
        generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        let coordinator = Coordinator::new(
            generator,
            TaskLimiter::new(config.max_in_flight_tasks),
            RoundSettings {
                key_length: config.key_length,
                worker_delay: config.worker_delay,
                round_timeout: config.round_timeout,
                max_round_size: config.max_round_size,
            },
        );

        Self {
            inner: Arc::new(Inner {
                lifecycle: LifecycleManager::new(Arc::clone(&store), config.lock_granularity),
                dispatcher: RoundDispatcher::new(config.shutdown_policy),
                coordinator,
                store,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn RequestStore> {
        &self.inner.store
    }

    /// Validates and stores a request for `count` validators, then starts
    /// provisioning in the background.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCount`] if `count <= 0`.
    /// - [`Error::InvalidAddress`] if `fee_recipient` is not a hex address.
    /// - [`Error::ServiceShutdown`] if the service is shutting down.
    /// - [`Error::Persistence`] if the request could not be stored.
    ///
    /// Nothing is stored when validation fails. If shutdown begins while the
    /// request is being stored, the stored request is marked `failed` before
    /// [`Error::ServiceShutdown`] is returned.
    #[tracing::instrument(skip(self), fields(request_id))]
    pub async fn create_request(&self, count: i64, fee_recipient: &str) -> Result<Accepted> {
        let requested_count = u64::try_from(count)
            .ok()
            .filter(|&n| n > 0)
            .ok_or(Error::InvalidCount { count })?;

        if !is_hex_address(fee_recipient) {
            return Err(Error::InvalidAddress {
                address: fee_recipient.to_string(),
            });
        }

        if self.inner.dispatcher.is_shutting_down() {
            return Err(Error::ServiceShutdown);
        }

        let request = self
            .inner
            .store
            .create_request(NewRequest {
                public_id: Uuid::new_v4().to_string(),
                requested_count,
                fee_recipient: fee_recipient.to_string(),
            })
            .await?;

        let public_id = request.public_id.clone();
        tracing::Span::current().record("request_id", public_id.as_str());

        let this = self.clone();
        if let Err(e) = self
            .inner
            .dispatcher
            .submit(async move { this.run_guarded(request).await })
        {
            // Shutdown started after the intake check; the row already exists.
            tracing::error!("Stored request could not be scheduled: {e}");
            self.fail_unfinished(&public_id).await;
            return Err(e);
        }

        tracing::info!(requested_count, "Validator creation in progress");
        Ok(Accepted {
            public_id,
            message: IN_PROGRESS_MESSAGE,
        })
    }

    /// Looks up a request by public id.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no request has this id.
    /// - [`Error::Persistence`] if the store read failed.
    pub async fn get_status(&self, public_id: &str) -> Result<StatusReport> {
        let request = self
            .inner
            .store
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| Error::NotFound {
                public_id: public_id.to_string(),
            })?;

        Ok(match request.status {
            RequestStatus::Failed => StatusReport::Failed,
            RequestStatus::Started => StatusReport::Active {
                status: RequestStatus::Started,
                keys: Vec::new(),
            },
            RequestStatus::Successful => StatusReport::Active {
                status: RequestStatus::Successful,
                keys: request.key_values(),
            },
        })
    }

    /// Checks that the store is reachable.
    pub async fn health(&self) -> Result<()> {
        self.inner.store.ping().await
    }

    /// Runs the full pipeline for a stored `started` request.
    #[tracing::instrument(
        skip_all,
        fields(request_id = %request.public_id, count = request.requested_count)
    )]
    pub async fn process_request(&self, mut request: ProvisioningRequest) {
        // Anything past usize is refused by the coordinator's size limit.
        let count = usize::try_from(request.requested_count).unwrap_or(usize::MAX);

        let keys = match self.inner.coordinator.run_round(count).await {
            RoundOutcome::Completed(keys) => keys,
            RoundOutcome::Failed(errors) => {
                tracing::error!(
                    failures = errors.len(),
                    "Failed to create validator: {errors:?}"
                );
                self.finish(&mut request, RequestStatus::Failed).await;
                return;
            }
            RoundOutcome::TimedOut { elapsed, finished } => {
                tracing::error!(
                    finished,
                    "Failed to create validator: round timed out after {}ms",
                    elapsed.as_millis()
                );
                self.finish(&mut request, RequestStatus::Failed).await;
                return;
            }
        };

        // Each insert commits on its own; earlier keys survive a later failure.
        for (written, value) in keys.into_iter().enumerate() {
            let key = NewKey {
                request_id: request.id,
                value,
                fee_recipient: request.fee_recipient.clone(),
            };
            if let Err(e) = self.inner.store.create_key(key).await {
                tracing::error!(written, "Failed to create validator key: {e}");
                self.finish(&mut request, RequestStatus::Failed).await;
                return;
            }
        }

        self.finish(&mut request, RequestStatus::Successful).await;
    }

    /// Runs [`Self::process_request`] and fails the request if it panics.
    async fn run_guarded(&self, request: ProvisioningRequest) {
        let public_id = request.public_id.clone();
        let outcome = AssertUnwindSafe(self.process_request(request))
            .catch_unwind()
            .await;

        if outcome.is_err() {
            tracing::error!(request_id = %public_id, "Provisioning round panicked");
            self.fail_unfinished(&public_id).await;
        }
    }

    /// Marks a stored request `failed` unless it is already terminal.
    async fn fail_unfinished(&self, public_id: &str) {
        match self.inner.store.find_by_public_id(public_id).await {
            Ok(Some(mut request)) if !request.status.is_terminal() => {
                self.finish(&mut request, RequestStatus::Failed).await;
            }
            Ok(_) => {}
            Err(e) => tracing::error!("Could not load request {public_id} to fail it: {e}"),
        }
    }

    async fn finish(&self, request: &mut ProvisioningRequest, status: RequestStatus) {
        if let Err(e) = self.inner.lifecycle.transition(request, status).await {
            tracing::error!("Could not finish request: {e}");
        }
    }

    /// Rounds currently running in the background.
    pub fn in_flight(&self) -> usize {
        self.inner.dispatcher.in_flight()
    }

    /// Refuses new requests and applies the configured shutdown policy to
    /// in-flight rounds.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.inner.dispatcher.shutdown().await
    }
}
