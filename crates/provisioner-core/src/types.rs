//! # Provisioning Records
//!
//! Records exchanged between the pipeline and the record store.
//!
//! - [`ProvisioningRequest`] - one caller request and the keys it owns
//! - [`ProvisionedKey`] - one generated validator identifier
//! - [`NewRequest`] / [`NewKey`] - inserts, before the store assigns ids
//!
//! A request's `requested_count` is fixed at creation and is never checked
//! against `keys.len()`. After a key insert fails partway through a round the
//! request ends up `failed` with the keys written so far still attached.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Lifecycle state of a [`ProvisioningRequest`].
///
/// `Started` is the only non-terminal state:
///
/// ```text
/// Started ──► Successful
///    └──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Started,
    Successful,
    Failed,
}

impl RequestStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Successful => "successful",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }

    /// Returns `true` if the state machine allows moving from `self` to
    /// `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Started, Self::Successful) | (Self::Started, Self::Failed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to provision `requested_count` validators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    /// Store-assigned primary key.
    pub id: u64,
    /// Caller-visible lookup token.
    pub public_id: String,
    pub requested_count: u64,
    pub fee_recipient: String,
    pub status: RequestStatus,
    /// Keys in insertion order. Empty unless loaded with the request.
    pub keys: Vec<ProvisionedKey>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl ProvisioningRequest {
    /// Generated identifier strings, in store order.
    pub fn key_values(&self) -> Vec<String> {
        self.keys.iter().map(|key| key.value.clone()).collect()
    }
}

/// A generated identifier owned by a [`ProvisioningRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedKey {
    pub id: u64,
    /// Internal id of the owning request.
    pub request_id: u64,
    pub value: String,
    /// Copied from the owning request when the key is written.
    pub fee_recipient: String,
    pub created_at: SystemTime,
}

/// Insert for a new request. New requests always start as
/// [`RequestStatus::Started`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequest {
    pub public_id: String,
    pub requested_count: u64,
    pub fee_recipient: String,
}

/// Insert for a new key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKey {
    pub request_id: u64,
    pub value: String,
    pub fee_recipient: String,
}
