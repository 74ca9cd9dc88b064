//! Error types for the provisioning pipeline.
//!
//! This module defines the central `Error` enum covering every failure the
//! pipeline can report. Validation and lookup failures are returned
//! synchronously to the caller; generation and persistence failures that
//! happen inside a background round only surface as a `failed` request status
//! and as log events.
//!
//! ## Error Cases
//! - `InvalidCount`: The requested number of validators was not positive.
//! - `InvalidAddress`: The fee recipient is not a hex address.
//! - `NotFound`: No request exists for the given public identifier.
//! - `Generation`: A worker failed to produce an identifier.
//! - `RoundTooLarge`: A request asked for more keys than one round may spawn.
//! - `Persistence`: The record store rejected a read or write.
//! - `InvalidTransition`: A status change would leave a terminal state.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use crate::RequestStatus;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the provisioning service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested validator count was zero or negative.
    #[error("Invalid number of validators: {count}")]
    InvalidCount { count: i64 },

    /// The fee recipient failed the address format check.
    #[error("Invalid fee recipient address: {address:?}")]
    InvalidAddress { address: String },

    /// No request is stored under this public identifier.
    #[error("Request not found: {public_id}")]
    NotFound { public_id: String },

    /// A worker could not produce an identifier.
    #[error("Generation error: {reason}")]
    Generation { reason: String },

    /// The round was refused before spawning any worker.
    #[error("Round of {count} workers exceeds the limit of {max}")]
    RoundTooLarge { count: u64, max: usize },

    /// The record store failed.
    #[error("Persistence error: {context}")]
    Persistence { context: String },

    /// The status machine refused a transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` for errors the caller can fix by changing its input.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidCount { .. } | Self::InvalidAddress { .. })
    }

    pub(crate) fn persistence(context: impl Into<String>) -> Self {
        Self::Persistence {
            context: context.into(),
        }
    }

    pub(crate) fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }
}
